use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod errors;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

type AppRouter = Router<Arc<AppState>>;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = match HeaderValue::from_str(&app_state.config.client_url) {
        Ok(origin) => CorsLayer::new().allow_origin(origin).allow_credentials(true),
        Err(_) => {
            tracing::warn!("CLIENT_URL is not a valid origin, CORS disabled");
            CorsLayer::new()
        }
    }
    .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
    .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let api = Router::new()
        .nest("/auth", auth_routes(app_state.clone()))
        .nest("/instructor", instructor_routes(app_state.clone()))
        .nest("/course", course_routes(app_state.clone()))
        .nest("/user", user_routes(app_state.clone()))
        .nest("/payment", payment_routes(app_state.clone()))
        .nest("/review", review_routes(app_state.clone()))
        .nest("/qa", qa_routes(app_state.clone()))
        .nest("/category", category_routes(app_state.clone()))
        .nest("/banner", banner_routes(app_state.clone()));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        .nest("/api", api)
        .with_state(app_state)
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(middleware::from_fn(middlewares::metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(middlewares::trace::make_request_span))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
}

/// Wraps every route of `router` with token authentication.
fn signed_in(router: AppRouter, app_state: &Arc<AppState>) -> AppRouter {
    router.route_layer(middleware::from_fn_with_state(
        app_state.clone(),
        middlewares::auth::auth_middleware,
    ))
}

fn instructor_only(router: AppRouter, app_state: &Arc<AppState>) -> AppRouter {
    signed_in(
        router.route_layer(middleware::from_fn(
            middlewares::auth::instructor_guard_middleware,
        )),
        app_state,
    )
}

fn admin_only(router: AppRouter, app_state: &Arc<AppState>) -> AppRouter {
    signed_in(
        router.route_layer(middleware::from_fn(
            middlewares::auth::admin_guard_middleware,
        )),
        app_state,
    )
}

fn auth_routes(app_state: Arc<AppState>) -> AppRouter {
    let register_route = Router::new()
        .route("/register", post(handlers::auth::register))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::rate_limit::register_rate_limit_middleware,
        ));

    let login_route = Router::new()
        .route("/login", post(handlers::auth::login))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::rate_limit::login_rate_limit_middleware,
        ));

    let public_routes = Router::new()
        .route("/activate", post(handlers::auth::activate))
        .route("/logout", get(handlers::auth::logout))
        .route("/forgot-password", post(handlers::auth::forgot_password))
        .route("/reset-password", post(handlers::auth::reset_password));

    let protected_routes = signed_in(
        Router::new().route("/current-user", get(handlers::auth::current_user)),
        &app_state,
    );

    register_route
        .merge(login_route)
        .merge(public_routes)
        .merge(protected_routes)
}

fn instructor_routes(app_state: Arc<AppState>) -> AppRouter {
    let onboarding = signed_in(
        Router::new().route(
            "/become-instructor",
            post(handlers::instructor::become_instructor),
        ),
        &app_state,
    );

    let instructor = instructor_only(
        Router::new()
            .route("/stripe/onboard", post(handlers::instructor::stripe_onboard))
            .route("/stripe/status", post(handlers::instructor::stripe_status))
            .route("/current", get(handlers::instructor::current_instructor)),
        &app_state,
    );

    onboarding.merge(instructor)
}

fn course_routes(app_state: Arc<AppState>) -> AppRouter {
    use handlers::{course, media};

    let public = Router::new()
        .route("/public", get(course::list_public))
        .route("/public/{slug}", get(course::get_public_by_slug))
        .route("/public/id/{course_id}", get(course::get_public_by_id));

    // `{course_id}` doubles as the slug on GET /ins/{course_id}.
    let instructor = instructor_only(
        Router::new()
            .route("/ins", get(course::list_own).post(course::create_course))
            .route("/ins/upload-image", post(media::upload_image))
            .route("/ins/remove-image", post(media::remove_image))
            .route("/ins/upload-pdf", post(media::upload_pdf))
            .route("/ins/remove-pdf", post(media::remove_pdf))
            .route(
                "/ins/{course_id}",
                get(course::get_own).put(course::update_course),
            )
            .route("/ins/{course_id}/submit-publish", put(course::submit_publish))
            .route("/ins/{course_id}/submit-undopublish", put(course::undo_publish))
            .route("/ins/{course_id}/section", post(course::add_section))
            .route(
                "/ins/{course_id}/section/{section_id}/update",
                post(course::update_section),
            )
            .route(
                "/ins/{course_id}/section/{section_id}/delete",
                post(course::delete_section),
            )
            .route("/ins/{course_id}/lesson", post(course::add_lesson))
            .route(
                "/ins/{course_id}/lesson/{lesson_id}/update",
                put(course::update_lesson),
            )
            .route(
                "/ins/{course_id}/lesson/{lesson_id}/delete",
                put(course::delete_lesson),
            )
            .route(
                "/ins/{course_id}/lesson/{lesson_id}/quiz",
                post(course::add_quiz),
            )
            .route(
                "/ins/{course_id}/lesson/{lesson_id}/quiz/{quiz_id}/update",
                put(course::update_quiz),
            )
            .route(
                "/ins/{course_id}/lesson/{lesson_id}/quiz/{quiz_id}/delete",
                put(course::delete_quiz),
            ),
        &app_state,
    );

    let admin = admin_only(
        Router::new()
            .route("/ad", get(course::list_all))
            .route("/ad/course-inspect", get(course::list_pending))
            .route("/ad/course-inspect/{course_id}", get(course::get_pending))
            .route("/ad/course-new/{course_id}", put(course::review_new))
            .route("/ad/course-edit/{course_id}", put(course::review_edit)),
        &app_state,
    );

    public.merge(instructor).merge(admin)
}

fn user_routes(app_state: Arc<AppState>) -> AppRouter {
    use handlers::user;

    let member = signed_in(
        Router::new()
            .route("/", get(user::profile))
            .route("/edit", put(user::edit_profile))
            .route("/edit-password", put(user::edit_password))
            .route("/check-enrollment/{course_id}", post(user::check_enrollment))
            .route("/enrollment/free/{course_id}", post(user::enroll_free))
            .route("/enrollment/paid/{course_id}", post(user::enroll_paid))
            .route("/stripe-success/{course_id}", get(user::stripe_success))
            .route("/enrolled-courses", get(user::enrolled_courses))
            // `{course_id}` doubles as the slug here.
            .route("/enrolled-courses/{course_id}", get(user::enrolled_course))
            .route(
                "/enrolled-courses/{course_id}/lesson/{lesson_id}/mark-complete",
                post(user::mark_complete),
            )
            .route(
                "/enrolled-courses/{course_id}/lesson/{lesson_id}/mark-incomplete",
                post(user::mark_incomplete),
            )
            .route("/quiz-answer/{course_id}/{quiz_id}", post(user::quiz_answer)),
        &app_state,
    );

    let admin = admin_only(Router::new().route("/ad", get(user::list_users)), &app_state);

    member.merge(admin)
}

fn payment_routes(app_state: Arc<AppState>) -> AppRouter {
    use handlers::payment;

    let gateway = Router::new()
        .route("/vnpay_ipn", get(payment::vnpay_ipn))
        .route("/vnpay_return", get(payment::vnpay_return));

    let buyer = signed_in(
        Router::new().route("/create_payment_url", post(payment::create_payment_url)),
        &app_state,
    );

    gateway.merge(buyer)
}

fn review_routes(app_state: Arc<AppState>) -> AppRouter {
    use handlers::review;

    let public = Router::new().route(
        "/public/course/{course_id}",
        get(review::list_for_course),
    );

    let member = signed_in(
        Router::new()
            .route("/course/{course_id}", post(review::add_review))
            .route(
                "/course/{course_id}/{review_id}/update",
                put(review::update_review),
            )
            .route(
                "/course/{course_id}/{review_id}/delete",
                put(review::delete_review),
            ),
        &app_state,
    );

    let admin = admin_only(Router::new().route("/ad", get(review::list_all)), &app_state);

    public.merge(member).merge(admin)
}

fn qa_routes(app_state: Arc<AppState>) -> AppRouter {
    use handlers::qa;

    let member = signed_in(
        Router::new()
            .route("/course/{course_id}", get(qa::list_threads))
            .route("/course/{course_id}/qa/{qa_id}", get(qa::get_thread))
            .route("/course/{course_id}/lesson/{lesson_id}", post(qa::add_qa))
            .route(
                "/course/{course_id}/lesson/{lesson_id}/{qa_id}/update",
                put(qa::update_qa),
            )
            .route(
                "/course/{course_id}/lesson/{lesson_id}/{qa_id}/delete",
                put(qa::delete_qa),
            ),
        &app_state,
    );

    let admin = admin_only(Router::new().route("/ad", get(qa::list_all)), &app_state);

    member.merge(admin)
}

fn category_routes(app_state: Arc<AppState>) -> AppRouter {
    use handlers::category;

    let public = Router::new()
        .route("/public", get(category::list_categories))
        .route("/public/{slug}", get(category::get_by_slug));

    let admin = admin_only(
        Router::new()
            .route(
                "/ad",
                get(category::list_categories).post(category::create_category),
            )
            .route("/ad/{category_id}", get(category::get_category))
            .route("/ad/{category_id}/update", put(category::update_category))
            .route("/ad/{category_id}/delete", put(category::delete_category)),
        &app_state,
    );

    public.merge(admin)
}

fn banner_routes(app_state: Arc<AppState>) -> AppRouter {
    use handlers::banner;

    let public = Router::new()
        .route("/public", get(banner::list_banners))
        .route("/public/{banner_id}", get(banner::get_banner));

    let admin = admin_only(
        Router::new()
            .route("/ad", post(banner::create_banner))
            .route("/ad/{banner_id}/update", put(banner::update_banner))
            .route("/ad/{banner_id}/delete", put(banner::delete_banner)),
        &app_state,
    );

    public.merge(admin)
}
