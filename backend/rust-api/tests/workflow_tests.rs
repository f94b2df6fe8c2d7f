mod common;

use anyhow::Result;
use mongodb::bson::doc;
use std::collections::BTreeMap;
use uuid::Uuid;

use common::create_test_state;
use nextgoal_api::{
    errors::AppError,
    models::{
        course::{
            AnswerOption, CorrectMark, CourseStatus, CreateCourseRequest, LessonInput, QuizInput,
            ReviewDecision, ReviewKind, SectionRequest,
        },
        membership::PlanType,
        now_millis,
        payment::{OrderStatus, PaymentOrder},
        user::{User, UserRole},
    },
    services::{
        course_service::CourseService, enrollment_service::EnrollmentService,
        payment_service::PaymentService, AppState, PAYMENT_ORDERS, USERS,
    },
};

async fn seed_user(state: &AppState, roles: Vec<UserRole>) -> Result<String> {
    let now = now_millis();
    let id = Uuid::new_v4().to_string();
    let user = User {
        id: id.clone(),
        name: "Workflow User".to_string(),
        email: format!("{}@nextgoal.test", id),
        password: "not-a-real-hash".to_string(),
        picture: String::new(),
        role: roles,
        active: true,
        active_code: None,
        password_reset_code: None,
        courses: Vec::new(),
        instructor_information: None,
        stripe_account_id: None,
        stripe_seller: None,
        stripe_session: None,
        created_at: now,
        updated_at: now,
    };
    state.mongo.collection::<User>(USERS).insert_one(&user).await?;
    Ok(id)
}

async fn load_user(state: &AppState, user_id: &str) -> Result<User> {
    state
        .mongo
        .collection::<User>(USERS)
        .find_one(doc! { "_id": user_id })
        .await?
        .ok_or_else(|| anyhow::anyhow!("user {} missing", user_id))
}

fn course_request() -> CreateCourseRequest {
    CreateCourseRequest {
        name: format!("Rust Basics {}", Uuid::new_v4()),
        category: "programming".to_string(),
        summary: "short".to_string(),
        description: "Ownership and borrowing".to_string(),
        goal: Vec::new(),
        requirements: Vec::new(),
        tags: Vec::new(),
        languages: Vec::new(),
        image: None,
        price: 0.0,
        paid: false,
    }
}

/// A free course with one section, one lesson and a quiz on that lesson, approved once.
struct PublishedFixture {
    course_id: String,
    lesson_id: String,
    quiz_id: String,
}

async fn publish_free_course(courses: &CourseService, instructor: &str) -> Result<PublishedFixture> {
    let course = courses.create(instructor, course_request()).await?;

    let (_, section) = courses
        .mutate(&course.id, instructor, |course, now| {
            course.add_section(
                SectionRequest {
                    index: 0,
                    name: "Getting started".to_string(),
                    same_index_acceptable: false,
                },
                now,
            )
        })
        .await?;
    let (_, lesson) = courses
        .mutate(&course.id, instructor, |course, now| {
            course.add_lesson(
                LessonInput {
                    index: 0,
                    section: section.id.clone(),
                    title: "Hello cargo".to_string(),
                    content: String::new(),
                    document_link: None,
                    video_link: None,
                    duration: 12.0,
                    free_preview: true,
                },
                now,
            )
        })
        .await?;
    let (_, quiz) = courses
        .mutate(&course.id, instructor, |course, now| {
            course.add_quiz(
                &lesson.id,
                QuizInput {
                    question: "Which tool builds Rust crates?".to_string(),
                    answer: vec![
                        AnswerOption {
                            index: 0,
                            value: "cargo".to_string(),
                        },
                        AnswerOption {
                            index: 1,
                            value: "make".to_string(),
                        },
                    ],
                    correct_answer: vec![CorrectMark {
                        index: 0,
                        value: true,
                    }],
                },
                now,
            )
        })
        .await?;

    let submitted = courses.submit_for_publish(&course.id, instructor).await?;
    assert_eq!(submitted.status, CourseStatus::Unaccepted);
    let accepted = courses
        .review(&course.id, ReviewKind::New, ReviewDecision::Accept)
        .await?;
    assert_eq!(accepted.status, CourseStatus::Public);
    assert!(accepted.published);

    Ok(PublishedFixture {
        course_id: course.id,
        lesson_id: lesson.id,
        quiz_id: quiz.id,
    })
}

#[tokio::test]
async fn integration_course_publish_then_free_enrollment() -> Result<()> {
    let state = create_test_state().await;
    let courses = CourseService::new(state.mongo.clone());
    let instructor = seed_user(&state, vec![UserRole::Subscriber, UserRole::Instructor]).await?;
    let student = seed_user(&state, vec![UserRole::Subscriber]).await?;

    let fixture = publish_free_course(&courses, &instructor).await?;
    let snapshot = courses.load_published(&fixture.course_id).await?;
    assert_eq!(snapshot.content.lessons.len(), 1);
    assert_eq!(snapshot.content.quizzes.len(), 1);

    let enrollments = EnrollmentService::new(&state);
    assert!(!enrollments.is_enrolled(&student, &fixture.course_id).await?);
    enrollments.enroll_free(&student, &fixture.course_id).await?;
    assert!(enrollments.is_enrolled(&student, &fixture.course_id).await?);
    Ok(())
}

#[tokio::test]
async fn integration_free_enrollment_is_idempotent() -> Result<()> {
    let state = create_test_state().await;
    let courses = CourseService::new(state.mongo.clone());
    let instructor = seed_user(&state, vec![UserRole::Subscriber, UserRole::Instructor]).await?;
    let student = seed_user(&state, vec![UserRole::Subscriber]).await?;
    let fixture = publish_free_course(&courses, &instructor).await?;

    let enrollments = EnrollmentService::new(&state);
    enrollments.enroll_free(&student, &fixture.course_id).await?;
    enrollments.enroll_free(&student, &fixture.course_id).await?;

    let user = load_user(&state, &student).await?;
    let entries = user
        .courses
        .iter()
        .filter(|e| e.course_id == fixture.course_id)
        .count();
    assert_eq!(entries, 1);
    Ok(())
}

#[tokio::test]
async fn integration_instructor_cannot_enroll_in_own_course() -> Result<()> {
    let state = create_test_state().await;
    let courses = CourseService::new(state.mongo.clone());
    let instructor = seed_user(&state, vec![UserRole::Subscriber, UserRole::Instructor]).await?;
    let fixture = publish_free_course(&courses, &instructor).await?;

    let err = EnrollmentService::new(&state)
        .enroll_free(&instructor, &fixture.course_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidOperation(_)));

    let user = load_user(&state, &instructor).await?;
    assert!(user.courses.is_empty());
    Ok(())
}

#[tokio::test]
async fn integration_mark_incomplete_revokes_quiz_credit() -> Result<()> {
    let state = create_test_state().await;
    let courses = CourseService::new(state.mongo.clone());
    let instructor = seed_user(&state, vec![UserRole::Subscriber, UserRole::Instructor]).await?;
    let student = seed_user(&state, vec![UserRole::Subscriber]).await?;
    let fixture = publish_free_course(&courses, &instructor).await?;

    let enrollments = EnrollmentService::new(&state);
    enrollments.enroll_free(&student, &fixture.course_id).await?;

    let progress = enrollments
        .mark_lesson(&student, &fixture.course_id, &fixture.lesson_id, true)
        .await?;
    assert_eq!(progress.completed_lessons, vec![fixture.lesson_id.clone()]);

    let answered = enrollments
        .submit_quiz_answer(&student, &fixture.course_id, &fixture.quiz_id, 0)
        .await?;
    assert!(answered.correct);

    let progress = enrollments
        .mark_lesson(&student, &fixture.course_id, &fixture.lesson_id, false)
        .await?;
    assert!(progress.completed_lessons.is_empty());
    assert!(progress.completed_quizzes.is_empty());
    Ok(())
}

#[tokio::test]
async fn integration_progress_requires_enrollment() -> Result<()> {
    let state = create_test_state().await;
    let courses = CourseService::new(state.mongo.clone());
    let instructor = seed_user(&state, vec![UserRole::Subscriber, UserRole::Instructor]).await?;
    let stranger = seed_user(&state, vec![UserRole::Subscriber]).await?;
    let fixture = publish_free_course(&courses, &instructor).await?;

    let err = EnrollmentService::new(&state)
        .mark_lesson(&stranger, &fixture.course_id, &fixture.lesson_id, true)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotEnrolled));
    Ok(())
}

#[tokio::test]
async fn integration_stale_course_write_conflicts() -> Result<()> {
    let state = create_test_state().await;
    let courses = CourseService::new(state.mongo.clone());
    let instructor = seed_user(&state, vec![UserRole::Subscriber, UserRole::Instructor]).await?;
    let created = courses.create(&instructor, course_request()).await?;

    let mut first = courses.load(&created.id).await?;
    let mut second = courses.load(&created.id).await?;

    first.draft.summary = "first writer".to_string();
    courses.save(&first).await?;

    second.draft.summary = "second writer".to_string();
    let err = courses.save(&second).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let stored = courses.load(&created.id).await?;
    assert_eq!(stored.draft.summary, "first writer");
    assert_eq!(stored.revision, created.revision + 1);
    Ok(())
}

fn signed_ipn(state: &AppState, order: &PaymentOrder) -> Result<BTreeMap<String, String>> {
    let mut params = BTreeMap::new();
    params.insert("vnp_TxnRef".to_string(), order.txn_ref.clone());
    params.insert("vnp_Amount".to_string(), (order.amount * 100).to_string());
    params.insert("vnp_ResponseCode".to_string(), "00".to_string());
    params.insert("vnp_TransactionNo".to_string(), "14000001".to_string());
    let hash = state.vnpay.sign(&params)?;
    params.insert("vnp_SecureHash".to_string(), hash);
    Ok(params)
}

async fn seed_order(
    state: &AppState,
    user_id: &str,
    status: OrderStatus,
    membership_activated: bool,
) -> Result<PaymentOrder> {
    let now = now_millis();
    let order = PaymentOrder {
        id: Uuid::new_v4().to_string(),
        txn_ref: format!("it{}", Uuid::new_v4().simple()),
        user_id: user_id.to_string(),
        plan: PlanType::Gold,
        amount: 500_000,
        status,
        gateway_transaction_no: None,
        response_code: None,
        paid_at: (status == OrderStatus::Paid).then_some(now),
        membership_activated,
        created_at: now,
        updated_at: now,
    };
    state
        .mongo
        .collection::<PaymentOrder>(PAYMENT_ORDERS)
        .insert_one(&order)
        .await?;
    Ok(order)
}

#[tokio::test]
async fn integration_ipn_activates_membership() -> Result<()> {
    let state = create_test_state().await;
    let buyer = seed_user(&state, vec![UserRole::Subscriber]).await?;
    let order = seed_order(&state, &buyer, OrderStatus::Pending, false).await?;

    let ack = PaymentService::new(&state)
        .handle_ipn(&signed_ipn(&state, &order)?)
        .await;
    assert_eq!(ack.rsp_code, "00");

    let user = load_user(&state, &buyer).await?;
    let info = user.instructor_information.expect("membership written");
    assert_eq!(info.plan_type, Some(PlanType::Gold));

    let ack = PaymentService::new(&state)
        .handle_ipn(&signed_ipn(&state, &order)?)
        .await;
    assert_eq!(ack.rsp_code, "02");
    Ok(())
}

#[tokio::test]
async fn integration_ipn_retry_finishes_interrupted_activation() -> Result<()> {
    let state = create_test_state().await;
    let buyer = seed_user(&state, vec![UserRole::Subscriber]).await?;
    // Order flipped to paid, but the membership write never happened.
    let order = seed_order(&state, &buyer, OrderStatus::Paid, false).await?;

    let ack = PaymentService::new(&state)
        .handle_ipn(&signed_ipn(&state, &order)?)
        .await;
    assert_eq!(ack.rsp_code, "00");

    let user = load_user(&state, &buyer).await?;
    let info = user.instructor_information.expect("membership written");
    assert_eq!(info.plan_type, Some(PlanType::Gold));
    assert_eq!(info.plan_start, order.paid_at);

    let stored = state
        .mongo
        .collection::<PaymentOrder>(PAYMENT_ORDERS)
        .find_one(doc! { "_id": &order.id })
        .await?
        .expect("order present");
    assert!(stored.membership_activated);
    Ok(())
}
