use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::published::UserSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QaType {
    /// Top-level question.
    New,
    Reply,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Qa {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "courseId")]
    pub course_id: String,
    #[serde(rename = "lessonId")]
    pub lesson_id: String,
    #[serde(rename = "type")]
    pub kind: QaType,
    pub title: Option<String>,
    pub content: String,
    #[serde(rename = "replyQAId")]
    pub reply_qa_id: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct QaRequest {
    #[serde(rename = "type")]
    pub kind: QaType,
    #[validate(length(max = 300))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 5000, message = "Content is required"))]
    pub content: String,
    #[serde(rename = "replyQAId")]
    pub reply_qa_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct QaUpdateRequest {
    #[validate(length(max = 300))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 5000))]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QaListQuery {
    /// Matched against title and content.
    pub content: Option<String>,
    /// `all` or a lesson id.
    pub lesson_id: Option<String>,
    /// `currentuser_asked` restricts to the caller's own questions.
    pub other: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QaView {
    #[serde(flatten)]
    pub qa: Qa,
    pub user: Option<UserSummary>,
    pub reply_count: u64,
}
