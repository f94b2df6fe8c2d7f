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
use crate::models::qa::{Qa, QaListQuery, QaRequest, QaType, QaUpdateRequest, QaView};
use crate::models::{new_id, now_millis, regex_literal};
use crate::services::course_service::CourseService;
use crate::services::user_service::UserService;
use crate::services::QAS;

const CURRENT_USER_ASKED: &str = "currentuser_asked";

pub struct QaService {
    mongo: Database,
    qas: Collection<Qa>,
}

impl QaService {
    pub fn new(mongo: Database) -> Self {
        Self {
            qas: mongo.collection::<Qa>(QAS),
            mongo,
        }
    }

    async fn views(&self, items: Vec<Qa>) -> AppResult<Vec<QaView>> {
        let user_ids: Vec<String> = items.iter().map(|q| q.user_id.clone()).collect();
        let thread_ids: Vec<String> = items
            .iter()
            .filter(|q| q.kind == QaType::New)
            .map(|q| q.id.clone())
            .collect();

        let users = UserService::new(self.mongo.clone())
            .summaries(&user_ids)
            .await?;
        let replies = self.reply_counts(&thread_ids).await?;

        Ok(items
            .into_iter()
            .map(|qa| QaView {
                user: users.get(&qa.user_id).cloned(),
                reply_count: replies.get(&qa.id).copied().unwrap_or(0),
                qa,
            })
            .collect())
    }

    async fn reply_counts(&self, thread_ids: &[String]) -> AppResult<HashMap<String, u64>> {
        if thread_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let pipeline = vec![
            doc! { "$match": { "type": "reply", "replyQAId": { "$in": thread_ids } } },
            doc! { "$group": { "_id": "$replyQAId", "count": { "$sum": 1 } } },
        ];
        let mut cursor = self
            .qas
            .aggregate(pipeline)
            .await
            .context("Failed to count replies")?;
        let mut counts = HashMap::new();
        while let Some(row) = cursor.try_next().await.context("Failed to read reply counts")? {
            if let Ok(id) = row.get_str("_id") {
                let count = row.get_i32("count").map(i64::from).unwrap_or(0);
                counts.insert(id.to_string(), count.max(0) as u64);
            }
        }
        Ok(counts)
    }

    /// Top-level questions of a course, newest activity first.
    pub async fn list_threads(&self, course_id: &str, user_id: &str, query: QaListQuery) -> AppResult<Vec<QaView>> {
        let mut filter = doc! { "courseId": course_id, "type": "new" };
        if let Some(content) = query.content.as_deref().filter(|c| !c.trim().is_empty()) {
            let regex = Regex {
                pattern: regex_literal(content),
                options: "i".to_string(),
            };
            filter.insert("$or", vec![doc! { "content": &regex }, doc! { "title": &regex }]);
        }
        if let Some(lesson_id) = query.lesson_id.as_deref().filter(|l| !l.is_empty() && *l != "all") {
            filter.insert("lessonId", lesson_id);
        }
        if query.other.as_deref() == Some(CURRENT_USER_ASKED) {
            filter.insert("userId", user_id);
        }
        let items = self.find_sorted(filter, -1).await?;
        self.views(items).await
    }

    async fn find_sorted(&self, filter: Document, direction: i32) -> AppResult<Vec<Qa>> {
        Ok(track_db_operation("find", QAS, async {
            self.qas
                .find(filter)
                .sort(doc! { "updatedAt": direction })
                .await?
                .try_collect()
                .await
        })
        .await
        .context("Failed to list Q&A")?)
    }

    /// A thread with its replies, oldest reply first.
    pub async fn get_thread(&self, course_id: &str, qa_id: &str) -> AppResult<(QaView, Vec<QaView>)> {
        let thread = self
            .qas
            .find_one(doc! { "_id": qa_id, "courseId": course_id, "type": "new" })
            .await
            .context("Failed to load question")?
            .ok_or_else(|| AppError::not_found("Question"))?;
        let replies = self
            .find_sorted(doc! { "type": "reply", "replyQAId": qa_id }, 1)
            .await?;

        let thread = self
            .views(vec![thread])
            .await?
            .pop()
            .ok_or_else(|| AppError::not_found("Question"))?;
        Ok((thread, self.views(replies).await?))
    }

    pub async fn add(&self, course_id: &str, lesson_id: &str, user_id: &str, req: QaRequest) -> AppResult<Qa> {
        let snapshot = CourseService::new(self.mongo.clone())
            .load_published(course_id)
            .await?;
        if snapshot.lesson(lesson_id).is_none() {
            return Err(AppError::not_found("Lesson"));
        }

        let title = req.title.as_deref().map(str::trim).filter(|t| !t.is_empty());
        let reply_to = match req.kind {
            QaType::New => {
                if title.is_none() {
                    return Err(AppError::Validation("Question title is required".to_string()));
                }
                None
            }
            QaType::Reply => {
                let parent_id = req
                    .reply_qa_id
                    .as_deref()
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| AppError::Validation("replyQAId is required".to_string()))?;
                let parent = self
                    .qas
                    .find_one(doc! { "_id": parent_id, "courseId": course_id, "type": "new" })
                    .await
                    .context("Failed to load question")?
                    .ok_or_else(|| AppError::not_found("Question"))?;
                Some(parent.id)
            }
        };

        let now = now_millis();
        let qa = Qa {
            id: new_id(),
            user_id: user_id.to_string(),
            course_id: course_id.to_string(),
            lesson_id: lesson_id.to_string(),
            kind: req.kind,
            title: title.map(str::to_string),
            content: req.content.trim().to_string(),
            reply_qa_id: reply_to.clone(),
            created_at: now,
            updated_at: now,
        };
        self.qas
            .insert_one(&qa)
            .await
            .context("Failed to insert Q&A")?;

        // Bump the thread so fresh answers float to the top.
        if let Some(parent_id) = reply_to {
            self.qas
                .update_one(doc! { "_id": parent_id }, doc! { "$set": { "updatedAt": now } })
                .await
                .context("Failed to touch question")?;
        }
        tracing::info!(qa_id = %qa.id, course_id, "Q&A posted");
        Ok(qa)
    }

    async fn load_own(&self, course_id: &str, lesson_id: &str, qa_id: &str, user_id: &str) -> AppResult<Qa> {
        let qa = self
            .qas
            .find_one(doc! { "_id": qa_id, "courseId": course_id, "lessonId": lesson_id })
            .await
            .context("Failed to load Q&A")?
            .ok_or_else(|| AppError::not_found("Q&A"))?;
        if qa.user_id != user_id {
            return Err(AppError::Forbidden(
                "You can only change your own posts".to_string(),
            ));
        }
        Ok(qa)
    }

    pub async fn update(
        &self,
        course_id: &str,
        lesson_id: &str,
        qa_id: &str,
        user_id: &str,
        req: QaUpdateRequest,
    ) -> AppResult<Qa> {
        let qa = self.load_own(course_id, lesson_id, qa_id, user_id).await?;
        let mut set = Document::new();
        if let Some(title) = req.title.as_deref().map(str::trim) {
            if qa.kind == QaType::New && title.is_empty() {
                return Err(AppError::Validation("Question title is required".to_string()));
            }
            if qa.title.as_deref() != Some(title) {
                set.insert("title", title);
            }
        }
        if let Some(content) = req.content.as_deref().map(str::trim) {
            if qa.content != content {
                set.insert("content", content);
            }
        }
        if set.is_empty() {
            return Err(AppError::NoChange);
        }
        set.insert("updatedAt", now_millis());

        self.qas
            .find_one_and_update(doc! { "_id": qa_id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await
            .context("Failed to update Q&A")?
            .ok_or_else(|| AppError::not_found("Q&A"))
    }

    /// Deleting a question also deletes its replies.
    pub async fn delete(&self, course_id: &str, lesson_id: &str, qa_id: &str, user_id: &str) -> AppResult<()> {
        let qa = self.load_own(course_id, lesson_id, qa_id, user_id).await?;
        if qa.kind == QaType::New {
            self.qas
                .delete_many(doc! { "type": "reply", "replyQAId": qa_id })
                .await
                .context("Failed to delete replies")?;
        }
        self.qas
            .delete_one(doc! { "_id": qa_id })
            .await
            .context("Failed to delete Q&A")?;
        tracing::info!(qa_id, "Q&A deleted");
        Ok(())
    }

    pub async fn list_all(&self) -> AppResult<Vec<QaView>> {
        let items = self.find_sorted(doc! {}, -1).await?;
        self.views(items).await
    }
}
