use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension,
};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::{
    errors::{created, ok, AppError},
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::{
        enrollment::{EnrollmentStatus, QuizAnswerRequest},
        user::{EditPasswordRequest, EditProfileRequest, UserListQuery, UserProfile},
    },
    services::{enrollment_service::EnrollmentService, user_service::UserService, AppState},
};

/// GET /api/user
pub async fn profile(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, AppError> {
    let user = UserService::new(state.mongo.clone()).get(&claims.sub).await?;
    Ok(ok("Profile", UserProfile::from(user)))
}

/// PUT /api/user/edit
pub async fn edit_profile(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<EditProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let profile = UserService::new(state.mongo.clone())
        .edit_name(&claims.sub, &req.name)
        .await?;
    Ok(ok("Profile updated", profile))
}

/// PUT /api/user/edit-password
pub async fn edit_password(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<EditPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    UserService::new(state.mongo.clone())
        .edit_password(&claims.sub, req)
        .await?;
    Ok(ok("Password changed", json!({})))
}

/// GET /api/user/ad
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = UserService::new(state.mongo.clone()).list(query).await?;
    Ok(ok("Users", page))
}

/// POST /api/user/check-enrollment/{course_id}
pub async fn check_enrollment(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let enrolled = EnrollmentService::new(&state)
        .is_enrolled(&claims.sub, &course_id)
        .await?;
    Ok(ok("Enrollment status", EnrollmentStatus { enrolled }))
}

/// POST /api/user/enrollment/free/{course_id}
pub async fn enroll_free(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let enrollment = EnrollmentService::new(&state)
        .enroll_free(&claims.sub, &course_id)
        .await?;
    Ok(created("Enrolled", enrollment))
}

/// POST /api/user/enrollment/paid/{course_id}
pub async fn enroll_paid(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let checkout = EnrollmentService::new(&state)
        .start_paid_enrollment(&claims.sub, &course_id)
        .await?;
    Ok(ok("Checkout session created", checkout))
}

/// GET /api/user/stripe-success/{course_id}
pub async fn stripe_success(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let enrollment = EnrollmentService::new(&state)
        .confirm_paid_enrollment(&claims.sub, &course_id)
        .await?;
    Ok(ok("Payment confirmed", enrollment))
}

/// GET /api/user/enrolled-courses
pub async fn enrolled_courses(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, AppError> {
    let courses = EnrollmentService::new(&state)
        .enrolled_courses(&claims.sub)
        .await?;
    Ok(ok("Enrolled courses", courses))
}

/// GET /api/user/enrolled-courses/{slug}
pub async fn enrolled_course(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let course = EnrollmentService::new(&state)
        .enrolled_course_by_slug(&claims.sub, &slug)
        .await?;
    Ok(ok("Enrolled course", course))
}

/// POST /api/user/enrolled-courses/{course_id}/lesson/{lesson_id}/mark-complete
pub async fn mark_complete(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((course_id, lesson_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let progress = EnrollmentService::new(&state)
        .mark_lesson(&claims.sub, &course_id, &lesson_id, true)
        .await?;
    Ok(ok("Lesson completed", progress))
}

/// POST /api/user/enrolled-courses/{course_id}/lesson/{lesson_id}/mark-incomplete
pub async fn mark_incomplete(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((course_id, lesson_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let progress = EnrollmentService::new(&state)
        .mark_lesson(&claims.sub, &course_id, &lesson_id, false)
        .await?;
    Ok(ok("Lesson marked incomplete", progress))
}

/// POST /api/user/quiz-answer/{course_id}/{quiz_id}
pub async fn quiz_answer(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((course_id, quiz_id)): Path<(String, String)>,
    AppJson(req): AppJson<QuizAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result = EnrollmentService::new(&state)
        .submit_quiz_answer(&claims.sub, &course_id, &quiz_id, req.answer)
        .await?;
    let message = if result.correct {
        "Correct answer"
    } else {
        "Wrong answer"
    };
    Ok(ok(message, result))
}
