use anyhow::Context;
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, Document, Regex},
    Collection, Database,
};

use crate::errors::{AppError, AppResult};
use crate::metrics::{record_transition, track_db_operation};
use crate::models::course::{
    ChangeSet, Course, CoursePatch, CourseStatus, CreateCourseRequest, InspectQuery,
    InstructorCourseQuery, ReviewDecision, ReviewKind,
};
use crate::models::published::{
    truncate_rating, DraftCourseView, PublicCourseQuery, PublicCourseView, PublishedCourse,
};
use crate::models::{now_millis, regex_literal, PageQuery, Paginated};
use crate::services::category_service::CategoryService;
use crate::services::review_service::ReviewService;
use crate::services::user_service::UserService;
use crate::services::{is_duplicate_key, COURSES};

const DEFAULT_PAGE_SIZE: u64 = 10;

fn name_regex(name: &str) -> Regex {
    Regex {
        pattern: regex_literal(name),
        options: "i".to_string(),
    }
}

fn slug_conflict() -> AppError {
    AppError::Conflict("A course with this name already exists".to_string())
}

/// Loads, persists and lists course aggregates.
pub struct CourseService {
    mongo: Database,
    courses: Collection<Course>,
}

impl CourseService {
    pub fn new(mongo: Database) -> Self {
        Self {
            courses: mongo.collection::<Course>(COURSES),
            mongo,
        }
    }

    pub async fn load(&self, course_id: &str) -> AppResult<Course> {
        track_db_operation("find_one", COURSES, self.courses.find_one(doc! { "_id": course_id }))
            .await
            .context("Failed to load course")?
            .ok_or_else(|| AppError::not_found("Course"))
    }

    /// Snapshot students and visitors see; `NotFound` until first approval.
    pub async fn load_published(&self, course_id: &str) -> AppResult<PublishedCourse> {
        self.load(course_id)
            .await?
            .official_data
            .ok_or_else(|| AppError::not_found("Course"))
    }

    async fn ensure_slug_free(&self, slug: &str, except: Option<&str>) -> AppResult<()> {
        let mut filter = doc! {
            "$or": [
                { "draft.slug": slug },
                { "official_data.content.slug": slug },
            ]
        };
        if let Some(id) = except {
            filter.insert("_id", doc! { "$ne": id });
        }
        let taken = self
            .courses
            .count_documents(filter)
            .await
            .context("Failed to check course slug")?;
        if taken > 0 {
            return Err(slug_conflict());
        }
        Ok(())
    }

    /// Compare-and-swap on `revision`; a lost race writes nothing.
    /// `course` must carry the revision it was loaded with.
    pub async fn save(&self, course: &Course) -> AppResult<()> {
        let mut fields = bson::to_document(course).context("Failed to encode course")?;
        fields.remove("_id");
        fields.remove("revision");

        let result = track_db_operation(
            "update_one",
            COURSES,
            self.courses.update_one(
                doc! { "_id": &course.id, "revision": course.revision },
                doc! { "$set": fields, "$inc": { "revision": 1 } },
            ),
        )
        .await
        .map_err(|e| {
            if is_duplicate_key(&e) {
                slug_conflict()
            } else {
                AppError::from(e)
            }
        })?;

        if result.matched_count == 0 {
            tracing::warn!(course_id = %course.id, revision = course.revision, "Lost course update race");
            return Err(AppError::Conflict(
                "Course was modified concurrently".to_string(),
            ));
        }
        Ok(())
    }

    /// Runs `change` on the caller's own course and persists it.
    pub async fn mutate<T, F>(&self, course_id: &str, user_id: &str, change: F) -> AppResult<(Course, T)>
    where
        F: FnOnce(&mut Course, i64) -> AppResult<T>,
    {
        let mut course = self.load(course_id).await?;
        course.ensure_owner(user_id)?;
        let output = change(&mut course, now_millis())?;
        self.save(&course).await?;
        course.revision += 1;
        Ok((course, output))
    }

    pub async fn create(&self, instructor: &str, req: CreateCourseRequest) -> AppResult<Course> {
        let draft = req.into_draft()?;
        self.ensure_slug_free(&draft.slug, None).await?;

        let course = Course::new(instructor, draft, now_millis());
        track_db_operation("insert_one", COURSES, self.courses.insert_one(&course))
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    slug_conflict()
                } else {
                    AppError::from(e)
                }
            })?;
        tracing::info!(course_id = %course.id, instructor, "Course created");
        Ok(course)
    }

    pub async fn update_fields(
        &self,
        course_id: &str,
        user_id: &str,
        patch: CoursePatch,
    ) -> AppResult<(Course, ChangeSet)> {
        let current = self.load(course_id).await?;
        current.ensure_owner(user_id)?;
        if let Some(name) = &patch.name {
            let slug = crate::utils::slug::slugify(name);
            if slug != current.draft.slug {
                self.ensure_slug_free(&slug, Some(course_id)).await?;
            }
        }
        let (course, changes) = self
            .mutate(course_id, user_id, |course, now| course.apply_patch(patch, now))
            .await?;
        tracing::info!(course_id, changed = ?changes.vs_draft, "Course fields updated");
        Ok((course, changes))
    }

    pub async fn submit_for_publish(&self, course_id: &str, user_id: &str) -> AppResult<Course> {
        let (course, _) = self
            .mutate(course_id, user_id, |course, now| course.submit_for_publish(now))
            .await?;
        record_transition("submit");
        tracing::info!(course_id, "Course submitted for review");
        Ok(course)
    }

    pub async fn undo_submit(&self, course_id: &str, user_id: &str) -> AppResult<Course> {
        let (course, _) = self
            .mutate(course_id, user_id, |course, now| course.undo_submit(now))
            .await?;
        record_transition("undo_submit");
        tracing::info!(course_id, "Course review request withdrawn");
        Ok(course)
    }

    pub async fn review(
        &self,
        course_id: &str,
        kind: ReviewKind,
        decision: ReviewDecision,
    ) -> AppResult<Course> {
        let mut course = self.load(course_id).await?;
        let accepted = decision == ReviewDecision::Accept;
        course.review(kind, decision, now_millis())?;
        self.save(&course).await?;
        course.revision += 1;

        let transition = match (kind, accepted) {
            (ReviewKind::New, true) => "accept_new",
            (ReviewKind::New, false) => "reject_new",
            (ReviewKind::Edit, true) => "accept_edit",
            (ReviewKind::Edit, false) => "reject_edit",
        };
        record_transition(transition);
        tracing::info!(course_id, transition, "Course reviewed");
        Ok(course)
    }

    async fn page_of_drafts(
        &self,
        filter: Document,
        paging: PageQuery,
    ) -> AppResult<Paginated<DraftCourseView>> {
        let (_, limit) = paging.resolve(DEFAULT_PAGE_SIZE);
        let total_count = self
            .courses
            .count_documents(filter.clone())
            .await
            .context("Failed to count courses")?;
        let courses: Vec<Course> = track_db_operation("find", COURSES, async {
            self.courses
                .find(filter)
                .sort(doc! { "updatedAt": -1 })
                .skip(paging.skip(DEFAULT_PAGE_SIZE))
                .limit(limit as i64)
                .await?
                .try_collect()
                .await
        })
        .await
        .context("Failed to list courses")?;

        Ok(Paginated {
            paginated_results: courses.iter().map(DraftCourseView::from).collect(),
            total_count,
        })
    }

    pub async fn list_for_instructor(
        &self,
        instructor: &str,
        query: InstructorCourseQuery,
    ) -> AppResult<Paginated<DraftCourseView>> {
        let mut filter = doc! { "instructor": instructor };
        if let Some(published) = query.published {
            filter.insert("published", published);
        }
        if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
            let status: CourseStatus = status.parse().map_err(AppError::Validation)?;
            filter.insert("status", status.as_str());
        }
        if let Some(name) = query.name.as_deref().filter(|n| !n.trim().is_empty()) {
            filter.insert("draft.name", name_regex(name));
        }
        self.page_of_drafts(filter, query.paging()).await
    }

    pub async fn get_for_instructor(&self, instructor: &str, slug: &str) -> AppResult<DraftCourseView> {
        let course = self
            .courses
            .find_one(doc! { "instructor": instructor, "draft.slug": slug })
            .await
            .context("Failed to load course")?
            .ok_or_else(|| AppError::not_found("Course"))?;
        Ok(DraftCourseView::from(&course))
    }

    pub async fn list_all(&self, name: Option<String>, paging: PageQuery) -> AppResult<Paginated<DraftCourseView>> {
        let mut filter = Document::new();
        if let Some(name) = name.as_deref().filter(|n| !n.trim().is_empty()) {
            filter.insert("draft.name", name_regex(name));
        }
        self.page_of_drafts(filter, paging).await
    }

    /// Courses waiting for an admin decision.
    pub async fn list_pending(&self, query: InspectQuery) -> AppResult<Paginated<DraftCourseView>> {
        let mut filter = doc! { "status": CourseStatus::Unaccepted.as_str() };
        match query.kind {
            Some(ReviewKind::New) => {
                filter.insert("published", false);
            }
            Some(ReviewKind::Edit) => {
                filter.insert("published", true);
            }
            None => {}
        }
        if let Some(name) = query.name.as_deref().filter(|n| !n.trim().is_empty()) {
            filter.insert("draft.name", name_regex(name));
        }
        self.page_of_drafts(filter, query.paging()).await
    }

    pub async fn get_pending(&self, course_id: &str) -> AppResult<DraftCourseView> {
        let course = self
            .courses
            .find_one(doc! { "_id": course_id, "status": CourseStatus::Unaccepted.as_str() })
            .await
            .context("Failed to load course")?
            .ok_or_else(|| AppError::not_found("Course"))?;
        Ok(DraftCourseView::from(&course))
    }

    /// Attaches instructor, category and rating to each snapshot.
    pub async fn public_views(&self, snapshots: Vec<PublishedCourse>) -> AppResult<Vec<PublicCourseView>> {
        let course_ids: Vec<String> = snapshots.iter().map(|s| s.course_id.clone()).collect();
        let instructor_ids: Vec<String> = snapshots.iter().map(|s| s.instructor.clone()).collect();
        let category_ids: Vec<String> = snapshots
            .iter()
            .map(|s| s.content.category.clone())
            .collect();

        let instructors = UserService::new(self.mongo.clone())
            .summaries(&instructor_ids)
            .await?;
        let categories = CategoryService::new(self.mongo.clone())
            .summaries(&category_ids)
            .await?;
        let ratings = ReviewService::new(self.mongo.clone())
            .ratings(&course_ids)
            .await?;

        Ok(snapshots
            .iter()
            .map(|snapshot| {
                let (average, count) = ratings
                    .get(&snapshot.course_id)
                    .copied()
                    .unwrap_or((0.0, 0));
                PublicCourseView::build(
                    snapshot,
                    instructors.get(&snapshot.instructor).cloned(),
                    categories.get(&snapshot.content.category).cloned(),
                    truncate_rating(average),
                    count,
                )
            })
            .collect())
    }

    pub async fn list_public(&self, query: PublicCourseQuery) -> AppResult<Paginated<PublicCourseView>> {
        let mut filter = doc! { "published": true, "official_data": { "$ne": null } };
        if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty()) {
            let category_id = CategoryService::new(self.mongo.clone())
                .resolve_id(category)
                .await?;
            filter.insert("official_data.content.category", category_id);
        }
        if let Some(name) = query.name.as_deref().filter(|n| !n.trim().is_empty()) {
            filter.insert("official_data.content.name", name_regex(name));
        }
        let mut price = Document::new();
        if let Some(lower) = query.lower_price {
            price.insert("$gte", lower);
        }
        if let Some(upper) = query.upper_price {
            price.insert("$lte", upper);
        }
        if !price.is_empty() {
            filter.insert("official_data.content.price", price);
        }

        let courses: Vec<Course> = track_db_operation("find", COURSES, async {
            self.courses.find(filter).await?.try_collect().await
        })
        .await
        .context("Failed to list public courses")?;

        let snapshots = courses.into_iter().filter_map(|c| c.official_data).collect();
        let mut views = self.public_views(snapshots).await?;
        if let Some(min_duration) = query.duration {
            views.retain(|v| v.content.total_duration >= min_duration);
        }
        query.sort(&mut views);

        let paging = PageQuery {
            page: query.page,
            limit: query.limit,
        };
        let (_, limit) = paging.resolve(PublicCourseQuery::DEFAULT_LIMIT);
        let total_count = views.len() as u64;
        let paginated_results = views
            .into_iter()
            .skip(paging.skip(PublicCourseQuery::DEFAULT_LIMIT) as usize)
            .take(limit as usize)
            .collect();

        Ok(Paginated {
            paginated_results,
            total_count,
        })
    }

    async fn public_one(&self, filter: Document) -> AppResult<PublicCourseView> {
        let course = self
            .courses
            .find_one(filter)
            .await
            .context("Failed to load course")?
            .and_then(|c| c.official_data)
            .ok_or_else(|| AppError::not_found("Course"))?;
        self.public_views(vec![course])
            .await?
            .pop()
            .ok_or_else(|| AppError::not_found("Course"))
    }

    pub async fn get_public_by_slug(&self, slug: &str) -> AppResult<PublicCourseView> {
        self.public_one(doc! { "published": true, "official_data.content.slug": slug })
            .await
    }

    pub async fn get_public_by_id(&self, course_id: &str) -> AppResult<PublicCourseView> {
        self.public_one(doc! { "_id": course_id, "published": true })
            .await
    }
}
