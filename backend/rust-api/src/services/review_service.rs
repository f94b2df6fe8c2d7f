use std::collections::HashMap;

use anyhow::Context;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document, Regex},
    options::ReturnDocument,
    Collection, Database,
};

use crate::errors::{AppError, AppResult};
use crate::metrics::track_db_operation;
use crate::models::course::Course;
use crate::models::published::truncate_rating;
use crate::models::review::{CourseReviews, Review, ReviewListQuery, ReviewRequest, ReviewView};
use crate::models::{new_id, now_millis, regex_literal};
use crate::services::user_service::UserService;
use crate::services::{COURSES, REVIEWS};

pub struct ReviewService {
    mongo: Database,
    reviews: Collection<Review>,
}

impl ReviewService {
    pub fn new(mongo: Database) -> Self {
        Self {
            reviews: mongo.collection::<Review>(REVIEWS),
            mongo,
        }
    }

    async fn ensure_course(&self, course_id: &str) -> AppResult<Course> {
        self.mongo
            .collection::<Course>(COURSES)
            .find_one(doc! { "_id": course_id })
            .await
            .context("Failed to load course")?
            .ok_or_else(|| AppError::not_found("Course"))
    }

    pub async fn add(&self, course_id: &str, user_id: &str, req: ReviewRequest) -> AppResult<Review> {
        let course = self.ensure_course(course_id).await?;
        if course.official_data.is_none() {
            return Err(AppError::InvalidOperation(
                "Only published courses can be reviewed".to_string(),
            ));
        }
        if course.instructor == user_id {
            return Err(AppError::InvalidOperation(
                "Instructors cannot review their own course".to_string(),
            ));
        }

        let now = now_millis();
        let review = Review {
            id: new_id(),
            course_id: course_id.to_string(),
            user_id: user_id.to_string(),
            star: req.star,
            content: req.content.trim().to_string(),
            created_at: now,
            updated_at: now,
        };
        track_db_operation("insert_one", REVIEWS, self.reviews.insert_one(&review))
            .await
            .context("Failed to insert review")?;
        tracing::info!(review_id = %review.id, course_id, "Review added");
        Ok(review)
    }

    async fn load_own(&self, course_id: &str, review_id: &str, user_id: &str) -> AppResult<Review> {
        let review = self
            .reviews
            .find_one(doc! { "_id": review_id, "courseId": course_id })
            .await
            .context("Failed to load review")?
            .ok_or_else(|| AppError::not_found("Review"))?;
        if review.user_id != user_id {
            return Err(AppError::Forbidden(
                "You can only change your own review".to_string(),
            ));
        }
        Ok(review)
    }

    pub async fn update(
        &self,
        course_id: &str,
        review_id: &str,
        user_id: &str,
        req: ReviewRequest,
    ) -> AppResult<Review> {
        let review = self.load_own(course_id, review_id, user_id).await?;
        let content = req.content.trim();
        if review.star == req.star && review.content == content {
            return Err(AppError::NoChange);
        }
        self.reviews
            .find_one_and_update(
                doc! { "_id": review_id },
                doc! { "$set": { "star": req.star as i32, "content": content, "updatedAt": now_millis() } },
            )
            .return_document(ReturnDocument::After)
            .await
            .context("Failed to update review")?
            .ok_or_else(|| AppError::not_found("Review"))
    }

    pub async fn delete(&self, course_id: &str, review_id: &str, user_id: &str) -> AppResult<()> {
        self.load_own(course_id, review_id, user_id).await?;
        self.reviews
            .delete_one(doc! { "_id": review_id })
            .await
            .context("Failed to delete review")?;
        tracing::info!(review_id, "Review deleted");
        Ok(())
    }

    async fn with_authors(&self, reviews: Vec<Review>) -> AppResult<Vec<ReviewView>> {
        let user_ids: Vec<String> = reviews.iter().map(|r| r.user_id.clone()).collect();
        let course_ids: Vec<String> = reviews.iter().map(|r| r.course_id.clone()).collect();
        let users = UserService::new(self.mongo.clone())
            .summaries(&user_ids)
            .await?;

        let courses: Vec<Course> = self
            .mongo
            .collection::<Course>(COURSES)
            .find(doc! { "_id": { "$in": course_ids.clone() } })
            .await
            .context("Failed to load reviewed courses")?
            .try_collect()
            .await
            .context("Failed to read reviewed courses")?;
        let names: HashMap<String, String> = courses
            .into_iter()
            .map(|c| (c.id, c.draft.name))
            .collect();

        Ok(reviews
            .into_iter()
            .map(|review| ReviewView {
                user: users.get(&review.user_id).cloned(),
                course_name: names.get(&review.course_id).cloned(),
                review,
            })
            .collect())
    }

    pub async fn list_for_course(&self, course_id: &str, query: ReviewListQuery) -> AppResult<CourseReviews> {
        let all: Vec<Review> = track_db_operation("find", REVIEWS, async {
            self.reviews
                .find(doc! { "courseId": course_id })
                .sort(doc! { "createdAt": -1 })
                .await?
                .try_collect()
                .await
        })
        .await
        .context("Failed to list reviews")?;

        let total: Vec<u8> = all.iter().map(|r| r.star).collect();
        let average = if total.is_empty() {
            0.0
        } else {
            total.iter().map(|s| *s as f64).sum::<f64>() / total.len() as f64
        };

        let needle = query
            .content
            .as_deref()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty());
        let star = query.star.filter(|s| *s > 0);
        let filtered = all
            .into_iter()
            .filter(|r| star.map_or(true, |s| r.star == s))
            .filter(|r| {
                needle
                    .as_ref()
                    .map_or(true, |n| r.content.to_lowercase().contains(n.as_str()))
            })
            .collect();

        Ok(CourseReviews {
            total,
            average: truncate_rating(average),
            list: self.with_authors(filtered).await?,
        })
    }

    pub async fn list_all(&self, query: ReviewListQuery) -> AppResult<Vec<ReviewView>> {
        let mut filter = Document::new();
        if let Some(content) = query.content.as_deref().filter(|c| !c.trim().is_empty()) {
            filter.insert(
                "content",
                Regex {
                    pattern: regex_literal(content),
                    options: "i".to_string(),
                },
            );
        }
        if let Some(star) = query.star.filter(|s| *s > 0) {
            filter.insert("star", star as i32);
        }
        let reviews: Vec<Review> = self
            .reviews
            .find(filter)
            .sort(doc! { "createdAt": -1 })
            .await
            .context("Failed to list reviews")?
            .try_collect()
            .await
            .context("Failed to read reviews")?;
        self.with_authors(reviews).await
    }

    /// Average star and review count per course.
    pub async fn ratings(&self, course_ids: &[String]) -> AppResult<HashMap<String, (f64, u64)>> {
        if course_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let pipeline = vec![
            doc! { "$match": { "courseId": { "$in": course_ids } } },
            doc! { "$group": {
                "_id": "$courseId",
                "average": { "$avg": "$star" },
                "count": { "$sum": 1 },
            } },
        ];

        let mut cursor = track_db_operation("aggregate", REVIEWS, self.reviews.aggregate(pipeline))
            .await
            .context("Failed to aggregate ratings")?;
        let mut ratings = HashMap::new();
        while let Some(row) = cursor.try_next().await.context("Failed to read ratings")? {
            let Ok(course_id) = row.get_str("_id") else {
                continue;
            };
            let average = row.get_f64("average").unwrap_or(0.0);
            let count = row
                .get_i32("count")
                .map(i64::from)
                .or_else(|_| row.get_i64("count"))
                .unwrap_or(0);
            ratings.insert(course_id.to_string(), (average, count.max(0) as u64));
        }
        Ok(ratings)
    }
}
