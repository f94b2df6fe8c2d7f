use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::published::UserSummary;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "courseId")]
    pub course_id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub star: u8,
    pub content: String,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewRequest {
    #[validate(range(min = 1, max = 5, message = "Star rating must be between 1 and 5"))]
    pub star: u8,
    #[validate(length(min = 1, max = 500, message = "Content must be 1-500 characters"))]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ReviewListQuery {
    pub content: Option<String>,
    pub star: Option<u8>,
}

#[derive(Debug, Serialize)]
pub struct ReviewView {
    #[serde(flatten)]
    pub review: Review,
    pub user: Option<UserSummary>,
    pub course_name: Option<String>,
}

/// Per-course listing: every star value (for the histogram) plus the filtered reviews.
#[derive(Debug, Serialize)]
pub struct CourseReviews {
    pub total: Vec<u8>,
    pub average: f64,
    pub list: Vec<ReviewView>,
}
