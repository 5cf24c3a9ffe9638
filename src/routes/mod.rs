/// Router Module Index
///
/// Routing is split by audience so that authentication is attached per module
/// (as an axum layer) rather than per handler.

/// Routes open to anonymous clients: health, registration, login.
pub mod public;

/// Routes behind the `AuthUser` middleware. Course, assignment and submission
/// writes are further gated by the access control engine.
pub mod authenticated;

/// Routes restricted to the 'admin' role.
pub mod admin;
