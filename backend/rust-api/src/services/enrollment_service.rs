use anyhow::Context;
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc},
    options::ReturnDocument,
    Collection,
};

use crate::errors::{AppError, AppResult};
use crate::metrics::{record_enrollment, record_payment_callback, track_db_operation};
use crate::models::course::Course;
use crate::models::enrollment::{
    EnrolledCourseView, Enrollment, LedgerOp, PendingCheckout, QuizAnswerResult,
};
use crate::models::membership::PriceQuote;
use crate::models::now_millis;
use crate::models::published::PublishedCourse;
use crate::models::user::User;
use crate::services::course_service::CourseService;
use crate::services::stripe_client::CheckoutRequest;
use crate::services::user_service::UserService;
use crate::services::{AppState, COURSES, USERS};

/// Line item label shown on the checkout page.
pub fn checkout_product_name(course_name: &str, quote: &PriceQuote) -> String {
    format!(
        "{} | {:.0} VND | ${:.2}",
        course_name, quote.price_vnd, quote.price_usd
    )
}

pub struct EnrollmentService<'a> {
    state: &'a AppState,
    users: Collection<User>,
}

impl<'a> EnrollmentService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self {
            users: state.mongo.collection::<User>(USERS),
            state,
        }
    }

    fn courses(&self) -> CourseService {
        CourseService::new(self.state.mongo.clone())
    }

    pub async fn is_enrolled(&self, user_id: &str, course_id: &str) -> AppResult<bool> {
        let count = self
            .users
            .count_documents(doc! { "_id": user_id, "courses.courseId": course_id })
            .await
            .context("Failed to check enrollment")?;
        Ok(count > 0)
    }

    /// Appends a ledger entry unless one exists. Returns whether it was added.
    async fn add_entry(&self, user_id: &str, course_id: &str) -> AppResult<bool> {
        let entry = bson::to_bson(&Enrollment::new(course_id)).context("Failed to encode enrollment")?;
        let result = track_db_operation(
            "update_one",
            USERS,
            self.users.update_one(
                doc! { "_id": user_id, "courses.courseId": { "$ne": course_id } },
                doc! { "$push": { "courses": entry }, "$set": { "updatedAt": now_millis() } },
            ),
        )
        .await
        .context("Failed to add enrollment")?;
        Ok(result.modified_count > 0)
    }

    fn ensure_not_instructor(snapshot: &PublishedCourse, user_id: &str) -> AppResult<()> {
        if snapshot.instructor == user_id {
            return Err(AppError::InvalidOperation(
                "You cannot enroll in your own course".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn enroll_free(&self, user_id: &str, course_id: &str) -> AppResult<Enrollment> {
        let snapshot = self.courses().load_published(course_id).await?;
        if !snapshot.is_free() {
            return Err(AppError::InvalidOperation(
                "This course is not free".to_string(),
            ));
        }
        Self::ensure_not_instructor(&snapshot, user_id)?;

        if self.add_entry(user_id, course_id).await? {
            record_enrollment("free");
            tracing::info!(user_id, course_id, "Free enrollment");
        }
        Ok(Enrollment::new(course_id))
    }

    /// Opens a checkout session and remembers it as the user's pending payment.
    pub async fn start_paid_enrollment(&self, user_id: &str, course_id: &str) -> AppResult<PendingCheckout> {
        let snapshot = self.courses().load_published(course_id).await?;
        Self::ensure_not_instructor(&snapshot, user_id)?;
        if self.is_enrolled(user_id, course_id).await? {
            return Err(AppError::InvalidOperation(
                "You are already enrolled in this course".to_string(),
            ));
        }

        let instructor = UserService::new(self.state.mongo.clone())
            .get(&snapshot.instructor)
            .await?;
        let destination = instructor.stripe_account_id.clone().ok_or_else(|| {
            AppError::InvalidOperation("The instructor cannot accept payments yet".to_string())
        })?;
        let active_plan = instructor
            .instructor_information
            .as_ref()
            .and_then(|info| info.active_plan(chrono::Utc::now()));

        let rate = self.state.exchange.usd_to_vnd().await?;
        let quote = PriceQuote::compute(
            snapshot.content.price,
            active_plan,
            rate,
            &self.state.config.pricing,
        )?;

        let session = self
            .state
            .stripe
            .create_checkout_session(&CheckoutRequest {
                product_name: checkout_product_name(&snapshot.content.name, &quote),
                unit_amount: quote.unit_amount,
                application_fee_amount: quote.application_fee_amount,
                destination_account: destination,
                course_id: course_id.to_string(),
            })
            .await?;

        let pending = PendingCheckout {
            id: session.id,
            course_id: course_id.to_string(),
            url: session.url,
        };
        let stored = bson::to_bson(&pending).context("Failed to encode checkout session")?;
        self.users
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": { "stripeSession": stored, "updatedAt": now_millis() } },
            )
            .await
            .context("Failed to store checkout session")?;

        tracing::info!(
            user_id,
            course_id,
            unit_amount = quote.unit_amount,
            fee = quote.application_fee_amount,
            "Checkout session opened"
        );
        Ok(pending)
    }

    /// Enrolls the user once the pending checkout for `course_id` has been paid.
    pub async fn confirm_paid_enrollment(&self, user_id: &str, course_id: &str) -> AppResult<Enrollment> {
        let user = UserService::new(self.state.mongo.clone()).get(user_id).await?;
        let pending = user
            .stripe_session
            .filter(|s| s.course_id == course_id)
            .ok_or_else(|| {
                AppError::InvalidState("No pending payment for this course".to_string())
            })?;

        let session = self
            .state
            .stripe
            .retrieve_checkout_session(&pending.id)
            .await?;
        if !session.is_paid() {
            record_payment_callback("stripe", "unpaid");
            return Err(AppError::PaymentNotCompleted);
        }

        self.add_entry(user_id, course_id).await?;
        self.users
            .update_one(
                doc! { "_id": user_id },
                doc! { "$unset": { "stripeSession": "" } },
            )
            .await
            .context("Failed to clear checkout session")?;

        record_payment_callback("stripe", "paid");
        record_enrollment("paid");
        tracing::info!(user_id, course_id, "Paid enrollment confirmed");
        Ok(user
            .courses
            .into_iter()
            .find(|e| e.course_id == course_id)
            .unwrap_or_else(|| Enrollment::new(course_id)))
    }

    async fn apply(&self, user_id: &str, course_id: &str, op: LedgerOp) -> AppResult<Enrollment> {
        let user = track_db_operation(
            "find_one_and_update",
            USERS,
            self.users
                .find_one_and_update(
                    doc! { "_id": user_id, "courses.courseId": course_id },
                    op.update_document(),
                )
                .return_document(ReturnDocument::After),
        )
        .await
        .context("Failed to update progress")?
        .ok_or(AppError::NotEnrolled)?;

        user.enrollment(course_id)
            .cloned()
            .ok_or(AppError::NotEnrolled)
    }

    pub async fn mark_lesson(
        &self,
        user_id: &str,
        course_id: &str,
        lesson_id: &str,
        completed: bool,
    ) -> AppResult<Enrollment> {
        let snapshot = self.courses().load_published(course_id).await?;
        if snapshot.lesson(lesson_id).is_none() {
            return Err(AppError::not_found("Lesson"));
        }
        let op = if completed {
            LedgerOp::CompleteLesson(lesson_id.to_string())
        } else {
            LedgerOp::UncompleteLesson {
                lesson_id: lesson_id.to_string(),
                quiz_id: snapshot.quiz_for_lesson(lesson_id).map(|q| q.id.clone()),
            }
        };
        self.apply(user_id, course_id, op).await
    }

    pub async fn submit_quiz_answer(
        &self,
        user_id: &str,
        course_id: &str,
        quiz_id: &str,
        answer: i32,
    ) -> AppResult<QuizAnswerResult> {
        let snapshot = self.courses().load_published(course_id).await?;
        let quiz = snapshot
            .quiz(quiz_id)
            .ok_or_else(|| AppError::not_found("Quiz"))?;

        let correct = quiz.correct_index() == Some(answer);
        let op = if correct {
            LedgerOp::CompleteQuiz(quiz_id.to_string())
        } else {
            LedgerOp::UncompleteQuiz(quiz_id.to_string())
        };
        let enrollment = self.apply(user_id, course_id, op).await?;
        Ok(QuizAnswerResult {
            correct,
            enrollment: Some(enrollment),
        })
    }

    pub async fn enrolled_courses(&self, user_id: &str) -> AppResult<Vec<EnrolledCourseView>> {
        let user = UserService::new(self.state.mongo.clone()).get(user_id).await?;
        let ids: Vec<String> = user.courses.iter().map(|e| e.course_id.clone()).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let courses: Vec<Course> = self
            .state
            .mongo
            .collection::<Course>(COURSES)
            .find(doc! { "_id": { "$in": ids }, "official_data": { "$ne": null } })
            .await
            .context("Failed to load enrolled courses")?
            .try_collect()
            .await
            .context("Failed to read enrolled courses")?;

        let instructor_ids: Vec<String> = courses.iter().map(|c| c.instructor.clone()).collect();
        let instructors = UserService::new(self.state.mongo.clone())
            .summaries(&instructor_ids)
            .await?;

        Ok(courses
            .into_iter()
            .filter_map(|course| {
                let snapshot = course.official_data?;
                let progress = user.enrollment(&course.id)?.clone();
                Some(EnrolledCourseView {
                    id: course.id,
                    instructor: instructors.get(&snapshot.instructor).cloned(),
                    progress,
                    content: snapshot.content.project(),
                })
            })
            .collect())
    }

    pub async fn enrolled_course_by_slug(&self, user_id: &str, slug: &str) -> AppResult<EnrolledCourseView> {
        let course = self
            .state
            .mongo
            .collection::<Course>(COURSES)
            .find_one(doc! { "official_data.content.slug": slug })
            .await
            .context("Failed to load course")?
            .ok_or_else(|| AppError::not_found("Course"))?;
        let snapshot = course
            .official_data
            .ok_or_else(|| AppError::not_found("Course"))?;

        let user = UserService::new(self.state.mongo.clone()).get(user_id).await?;
        let progress = user
            .enrollment(&course.id)
            .cloned()
            .ok_or(AppError::NotEnrolled)?;
        let instructor = UserService::new(self.state.mongo.clone())
            .summaries(std::slice::from_ref(&snapshot.instructor))
            .await?
            .remove(&snapshot.instructor);

        Ok(EnrolledCourseView {
            id: course.id,
            instructor,
            progress,
            content: snapshot.content.project(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PricingSettings;

    #[test]
    fn product_name_shows_both_currencies() {
        let quote = PriceQuote::compute(240_000.0, None, 24_000.0, &PricingSettings::default()).unwrap();
        assert_eq!(
            checkout_product_name("Rust basics", &quote),
            "Rust basics | 240000 VND | $10.00"
        );
    }
}
