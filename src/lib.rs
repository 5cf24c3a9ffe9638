use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod access;
pub mod auth;
pub mod config;
pub mod handlers;
pub mod models;
pub mod repository;

// Routers split by audience (public, authenticated, admin).
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use access::{AccessControl, AccessError};
pub use config::AppConfig;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document aggregated from every `#[utoipa::path]` handler, served at
/// `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register_user, handlers::login, handlers::get_me,
        handlers::get_my_courses, handlers::create_course, handlers::join_course,
        handlers::get_course, handlers::delete_course, handlers::get_roster,
        handlers::add_teacher, handlers::remove_enrollment, handlers::get_assignments,
        handlers::create_assignment, handlers::delete_assignment, handlers::get_submissions,
        handlers::submit_assignment, handlers::grade_submission, handlers::delete_submission,
        handlers::get_admin_stats, handlers::search_users, handlers::set_user_approval,
        handlers::update_user, handlers::get_admin_courses
    ),
    components(
        schemas(
            models::Role, models::CourseRole, models::UserProfile, models::Course,
            models::Enrollment, models::Assignment, models::Submission,
            models::RegisterUserRequest, models::LoginRequest, models::LoginResponse,
            models::CreateCourseRequest, models::JoinCourseRequest, models::AddTeacherRequest,
            models::CreateAssignmentRequest, models::SubmitAssignmentRequest,
            models::GradeSubmissionRequest, models::UpdateUserRequest,
            models::AdminDashboardStats,
        )
    ),
    tags(
        (name = "classroom-portal", description = "Classroom management API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, cloneable container for the services every handler needs.
#[derive(Clone)]
pub struct AppState {
    /// Persistence: Postgres in deployments, in-memory locally and in tests.
    pub repo: RepositoryState,
    /// The loaded, immutable configuration.
    pub config: AppConfig,
}

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Rejects requests without a valid session (401) before they reach a handler,
/// by forcing the `AuthUser` extractor to run.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing tree, applies middleware and registers the state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        // Role checks for /admin happen in the handlers, through the access engine.
        .nest("/admin", admin::admin_routes())
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the per-request span so every log line carries the request id.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
