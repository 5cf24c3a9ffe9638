use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, put},
};

/// Admin Router Module
///
/// Moderation and oversight. Nested under `/admin`; every handler resolves the
/// caller through `AccessControl::administer`, so non-admins get 403 and
/// anonymous callers 401 (from the `AuthUser` extractor).
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/stats
        .route("/stats", get(handlers::get_admin_stats))
        // GET /admin/users?search=...
        .route("/users", get(handlers::search_users))
        // PUT /admin/users/{id}
        // Edits email, names or role from the admin panel.
        .route("/users/{id}", put(handlers::update_user))
        // PUT /admin/users/{id}/approval
        // Approves (true) or suspends (false) an account. Pending teachers
        // cannot log in until approved.
        .route("/users/{id}/approval", put(handlers::set_user_approval))
        // GET /admin/courses
        // Every course, enrolled or not. Deletion goes through DELETE /courses/{id}.
        .route("/courses", get(handlers::get_admin_courses))
}
