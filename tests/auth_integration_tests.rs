mod common;

use axum::{
    extract::FromRequestParts,
    http::{Method, Request, StatusCode, Uri, header, request::Parts},
};
use classroom_portal::{
    AppState, InMemoryRepository,
    auth::{self, AuthUser, Claims, TokenError},
    config::{AppConfig, Env},
    models::Role,
    repository::RepositoryState,
};
use common::seed_user;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use std::{sync::Arc, time::SystemTime};
use uuid::Uuid;

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";
const TEST_USER_ID: Uuid = Uuid::from_u128(1);

fn create_token(user_id: Uuid, role: Role, exp_offset: i64, secret: &str) -> String {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;

    let claims = Claims {
        sub: user_id,
        role,
        iat: now as usize,
        exp: (now + exp_offset) as usize,
    };

    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

fn create_app_state(env: Env, repo: Arc<InMemoryRepository>) -> AppState {
    let config = AppConfig {
        env,
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    };

    AppState {
        repo: repo as RepositoryState,
        config,
    }
}

/// Helper to get the mutable Parts struct from a generated Request
fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

fn with_bearer(parts: &mut Parts, token: &str) {
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
}

// --- Extractor ---

#[tokio::test]
async fn test_auth_success_with_valid_jwt() {
    let token = create_token(TEST_USER_ID, Role::Teacher, 3600, TEST_JWT_SECRET);
    let app_state = create_app_state(Env::Production, Arc::new(InMemoryRepository::new()));

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bearer(&mut parts, &token);

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    // Identity comes from the token alone; the store is not consulted here.
    let user = auth_user.unwrap();
    assert_eq!(user.id, TEST_USER_ID);
    assert_eq!(user.role, Role::Teacher);
}

#[tokio::test]
async fn test_auth_failure_with_missing_header() {
    let app_state = create_app_state(Env::Production, Arc::new(InMemoryRepository::new()));

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert_eq!(auth_user.unwrap_err(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_with_expired_jwt() {
    // Well past the default validation leeway.
    let token = create_token(TEST_USER_ID, Role::Student, -3600, TEST_JWT_SECRET);
    let app_state = create_app_state(Env::Production, Arc::new(InMemoryRepository::new()));

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bearer(&mut parts, &token);

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert_eq!(auth_user.unwrap_err(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_with_foreign_signature() {
    let token = create_token(TEST_USER_ID, Role::Admin, 3600, "some-other-secret");
    let app_state = create_app_state(Env::Production, Arc::new(InMemoryRepository::new()));

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bearer(&mut parts, &token);

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert_eq!(auth_user.unwrap_err(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_with_malformed_header() {
    let app_state = create_app_state(Env::Production, Arc::new(InMemoryRepository::new()));

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_static("Basic dXNlcjpwYXNz"),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert_eq!(auth_user.unwrap_err(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_local_bypass_success() {
    let repo = Arc::new(InMemoryRepository::new());
    let admin = seed_user(&repo, "localadmin", Role::Admin, true).await;
    let app_state = create_app_state(Env::Local, repo);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::HeaderName::from_static("x-user-id"),
        header::HeaderValue::from_str(&admin.id.to_string()).unwrap(),
    );

    let user = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();

    assert_eq!(user.id, admin.id);
    assert_eq!(user.role, Role::Admin);
}

#[tokio::test]
async fn test_local_bypass_unknown_user_rejected() {
    let app_state = create_app_state(Env::Local, Arc::new(InMemoryRepository::new()));

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::HeaderName::from_static("x-user-id"),
        header::HeaderValue::from_str(&Uuid::new_v4().to_string()).unwrap(),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert_eq!(auth_user.unwrap_err(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_local_bypass_disabled_in_prod() {
    let repo = Arc::new(InMemoryRepository::new());
    let student = seed_user(&repo, "produser", Role::Student, true).await;
    let app_state = create_app_state(Env::Production, repo);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    // Provide ONLY the local bypass header
    parts.headers.insert(
        header::HeaderName::from_static("x-user-id"),
        header::HeaderValue::from_str(&student.id.to_string()).unwrap(),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert_eq!(auth_user.unwrap_err(), StatusCode::UNAUTHORIZED);
}

// --- Token issuing ---

#[tokio::test]
async fn test_issued_token_round_trips_through_extractor() {
    let repo = Arc::new(InMemoryRepository::new());
    let teacher = seed_user(&repo, "issuer", Role::Teacher, true).await;
    let app_state = create_app_state(Env::Production, repo);

    let token = auth::issue_token(&app_state.config, &teacher).unwrap();

    let claims = decode::<Claims>(
        &token,
        &DecodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
        &Validation::default(),
    )
    .unwrap()
    .claims;
    assert_eq!(claims.exp - claims.iat, app_state.config.token_ttl_secs as usize);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bearer(&mut parts, &token);
    let user = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();
    assert_eq!(user.id, teacher.id);
}

#[tokio::test]
async fn test_issue_token_rejects_overflowing_ttl() {
    let repo = Arc::new(InMemoryRepository::new());
    let teacher = seed_user(&repo, "forever", Role::Teacher, true).await;
    let mut app_state = create_app_state(Env::Production, repo);
    app_state.config.token_ttl_secs = u64::MAX;

    let result = auth::issue_token(&app_state.config, &teacher);

    assert!(matches!(result, Err(TokenError::TtlOverflow(ttl)) if ttl == u64::MAX));
}

// --- Passwords ---

#[test]
fn test_password_hash_verifies() {
    let hash = auth::hash_password("s3cret-pass").unwrap();

    assert!(hash.starts_with("$argon2"));
    assert!(auth::verify_password(&hash, "s3cret-pass"));
    assert!(!auth::verify_password(&hash, "wrong-pass"));
}

#[test]
fn test_password_hashes_are_salted() {
    let a = auth::hash_password("same").unwrap();
    let b = auth::hash_password("same").unwrap();

    assert_ne!(a, b);
}

#[test]
fn test_verify_rejects_malformed_hash() {
    assert!(!auth::verify_password("not-a-phc-string", "anything"));
}
