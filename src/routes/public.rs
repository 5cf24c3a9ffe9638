use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Unauthenticated endpoints: monitoring and the identity gateway.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /register
        // Creates a student (approved) or teacher (pending approval) account.
        .route("/register", post(handlers::register_user))
        // POST /login
        // Exchanges username and password for a bearer token.
        .route("/login", post(handlers::login))
}
