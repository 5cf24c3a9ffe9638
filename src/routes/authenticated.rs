use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Authenticated Router Module
///
/// Everything a signed-in student or teacher does. The `AuthUser` middleware
/// layered above guarantees a session; each handler then asks the access
/// control engine whether that session may touch the target resource.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        .route("/me", get(handlers::get_me))
        // --- Courses ---
        // GET lists the caller's courses; POST creates one (teachers only) and
        // enrolls the creator as its teacher.
        .route(
            "/courses",
            get(handlers::get_my_courses).post(handlers::create_course),
        )
        // POST /courses/join
        // Students enroll themselves with a course code.
        .route("/courses/join", post(handlers::join_course))
        .route(
            "/courses/{id}",
            get(handlers::get_course).delete(handlers::delete_course),
        )
        // --- Enrollment Ledger ---
        .route("/courses/{id}/roster", get(handlers::get_roster))
        .route("/courses/{id}/teachers", post(handlers::add_teacher))
        .route(
            "/courses/{id}/enrollments/{user_id}",
            delete(handlers::remove_enrollment),
        )
        // --- Assignments ---
        // Creation and deletion are owner-only (enrolled course teachers).
        .route(
            "/courses/{id}/assignments",
            get(handlers::get_assignments).post(handlers::create_assignment),
        )
        .route(
            "/courses/{id}/assignments/{assignment_id}",
            delete(handlers::delete_assignment),
        )
        // --- Submissions ---
        // POST carries the claimed author; it must match the session (anti-forgery).
        .route(
            "/assignments/{id}/submissions",
            get(handlers::get_submissions).post(handlers::submit_assignment),
        )
        .route("/submissions/{id}/grade", put(handlers::grade_submission))
        .route("/submissions/{id}", delete(handlers::delete_submission))
}
