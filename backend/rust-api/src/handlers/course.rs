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
        course::{
            CoursePatch, CreateCourseRequest, InspectQuery, InstructorCourseQuery,
            LessonInput, LessonUpdateRequest, QuizRequest, ReviewKind, ReviewRequest,
            SectionRequest,
        },
        published::{DraftCourseView, PublicCourseQuery},
    },
    services::{course_service::CourseService, AppState},
};

fn courses(state: &AppState) -> CourseService {
    CourseService::new(state.mongo.clone())
}

// ---------------------------------------------------------------------------
// Public
// ---------------------------------------------------------------------------

/// GET /api/course/public
pub async fn list_public(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PublicCourseQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = courses(&state).list_public(query).await?;
    Ok(ok("Courses", page))
}

/// GET /api/course/public/{slug}
pub async fn get_public_by_slug(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let course = courses(&state).get_public_by_slug(&slug).await?;
    Ok(ok("Course", course))
}

/// GET /api/course/public/id/{course_id}
pub async fn get_public_by_id(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let course = courses(&state).get_public_by_id(&course_id).await?;
    Ok(ok("Course", course))
}

// ---------------------------------------------------------------------------
// Instructor
// ---------------------------------------------------------------------------

/// POST /api/course/ins
pub async fn create_course(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<CreateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let course = courses(&state).create(&claims.sub, req).await?;
    Ok(created("Course created", DraftCourseView::from(&course)))
}

/// GET /api/course/ins
pub async fn list_own(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Query(query): Query<InstructorCourseQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = courses(&state).list_for_instructor(&claims.sub, query).await?;
    Ok(ok("Courses", page))
}

/// GET /api/course/ins/{slug}
pub async fn get_own(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let course = courses(&state).get_for_instructor(&claims.sub, &slug).await?;
    Ok(ok("Course", course))
}

/// PUT /api/course/ins/{course_id}
pub async fn update_course(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
    AppJson(patch): AppJson<CoursePatch>,
) -> Result<impl IntoResponse, AppError> {
    patch.validate()?;
    let (course, changes) = courses(&state)
        .update_fields(&course_id, &claims.sub, patch)
        .await?;
    Ok(ok(
        "Course updated",
        json!({ "course": DraftCourseView::from(&course), "changes": changes }),
    ))
}

/// PUT /api/course/ins/{course_id}/submit-publish
pub async fn submit_publish(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let course = courses(&state)
        .submit_for_publish(&course_id, &claims.sub)
        .await?;
    Ok(ok("Course submitted for review", DraftCourseView::from(&course)))
}

/// PUT /api/course/ins/{course_id}/submit-undopublish
pub async fn undo_publish(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let course = courses(&state).undo_submit(&course_id, &claims.sub).await?;
    Ok(ok("Review request withdrawn", DraftCourseView::from(&course)))
}

// -- sections ----------------------------------------------------------------

/// POST /api/course/ins/{course_id}/section
pub async fn add_section(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
    AppJson(req): AppJson<SectionRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let (course, _) = courses(&state)
        .mutate(&course_id, &claims.sub, |course, now| course.add_section(req, now))
        .await?;
    Ok(created("Section added", DraftCourseView::from(&course)))
}

/// POST /api/course/ins/{course_id}/section/{section_id}/update
pub async fn update_section(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((course_id, section_id)): Path<(String, String)>,
    AppJson(req): AppJson<SectionRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let (course, _) = courses(&state)
        .mutate(&course_id, &claims.sub, |course, now| {
            course.update_section(&section_id, req, now)
        })
        .await?;
    Ok(ok("Section updated", DraftCourseView::from(&course)))
}

/// POST /api/course/ins/{course_id}/section/{section_id}/delete
pub async fn delete_section(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((course_id, section_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let (course, _) = courses(&state)
        .mutate(&course_id, &claims.sub, |course, now| {
            course.delete_section(&section_id, now)
        })
        .await?;
    Ok(ok("Section deleted", DraftCourseView::from(&course)))
}

// -- lessons -----------------------------------------------------------------

/// POST /api/course/ins/{course_id}/lesson
pub async fn add_lesson(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
    AppJson(input): AppJson<LessonInput>,
) -> Result<impl IntoResponse, AppError> {
    input.validate()?;
    let (course, _) = courses(&state)
        .mutate(&course_id, &claims.sub, |course, now| course.add_lesson(input, now))
        .await?;
    Ok(created("Lesson added", DraftCourseView::from(&course)))
}

/// PUT /api/course/ins/{course_id}/lesson/{lesson_id}/update
pub async fn update_lesson(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((course_id, lesson_id)): Path<(String, String)>,
    AppJson(req): AppJson<LessonUpdateRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let (course, _) = courses(&state)
        .mutate(&course_id, &claims.sub, |course, now| {
            course.update_lesson(&lesson_id, req, now)
        })
        .await?;
    Ok(ok("Lesson updated", DraftCourseView::from(&course)))
}

/// PUT /api/course/ins/{course_id}/lesson/{lesson_id}/delete
pub async fn delete_lesson(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((course_id, lesson_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let (course, _) = courses(&state)
        .mutate(&course_id, &claims.sub, |course, now| {
            course.delete_lesson(&lesson_id, now)
        })
        .await?;
    Ok(ok("Lesson deleted", DraftCourseView::from(&course)))
}

// -- quizzes -----------------------------------------------------------------

/// POST /api/course/ins/{course_id}/lesson/{lesson_id}/quiz
pub async fn add_quiz(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((course_id, lesson_id)): Path<(String, String)>,
    AppJson(req): AppJson<QuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let (course, _) = courses(&state)
        .mutate(&course_id, &claims.sub, |course, now| {
            course.add_quiz(&lesson_id, req.quiz, now)
        })
        .await?;
    Ok(created("Quiz added", DraftCourseView::from(&course)))
}

/// PUT /api/course/ins/{course_id}/lesson/{lesson_id}/quiz/{quiz_id}/update
pub async fn update_quiz(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((course_id, lesson_id, quiz_id)): Path<(String, String, String)>,
    AppJson(req): AppJson<QuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let (course, _) = courses(&state)
        .mutate(&course_id, &claims.sub, |course, now| {
            course.update_quiz(&lesson_id, &quiz_id, req.quiz, now)
        })
        .await?;
    Ok(ok("Quiz updated", DraftCourseView::from(&course)))
}

/// PUT /api/course/ins/{course_id}/lesson/{lesson_id}/quiz/{quiz_id}/delete
pub async fn delete_quiz(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((course_id, lesson_id, quiz_id)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let (course, _) = courses(&state)
        .mutate(&course_id, &claims.sub, |course, now| {
            course.delete_quiz(&lesson_id, &quiz_id, now)
        })
        .await?;
    Ok(ok("Quiz deleted", DraftCourseView::from(&course)))
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

/// GET /api/course/ad
pub async fn list_all(
    State(state): State<Arc<AppState>>,
    Query(query): Query<InspectQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = courses(&state)
        .list_all(query.name.clone(), query.paging())
        .await?;
    Ok(ok("Courses", page))
}

/// GET /api/course/ad/course-inspect
pub async fn list_pending(
    State(state): State<Arc<AppState>>,
    Query(query): Query<InspectQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = courses(&state).list_pending(query).await?;
    Ok(ok("Courses waiting for review", page))
}

/// GET /api/course/ad/course-inspect/{course_id}
pub async fn get_pending(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let course = courses(&state).get_pending(&course_id).await?;
    Ok(ok("Course waiting for review", course))
}

async fn review(
    state: &AppState,
    course_id: &str,
    kind: ReviewKind,
    req: ReviewRequest,
) -> Result<DraftCourseView, AppError> {
    let decision = req.into_decision()?;
    let course = courses(state).review(course_id, kind, decision).await?;
    Ok(DraftCourseView::from(&course))
}

/// PUT /api/course/ad/course-new/{course_id}
pub async fn review_new(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<String>,
    AppJson(req): AppJson<ReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    let course = review(&state, &course_id, ReviewKind::New, req).await?;
    Ok(ok("Course reviewed", course))
}

/// PUT /api/course/ad/course-edit/{course_id}
pub async fn review_edit(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<String>,
    AppJson(req): AppJson<ReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    let course = review(&state, &course_id, ReviewKind::Edit, req).await?;
    Ok(ok("Course edits reviewed", course))
}
