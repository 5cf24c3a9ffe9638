use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use password_hash::{PasswordHash, SaltString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    models::{Role, User},
    repository::RepositoryState,
};

/// Claims
///
/// Payload of the session token issued by `POST /login`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's id.
    pub sub: Uuid,
    /// Site role at the time of login. Informational only; access decisions
    /// re-read the role from the identity store.
    pub role: Role,
    /// Expiration time (seconds since the epoch).
    pub exp: usize,
    /// Issued at (seconds since the epoch).
    pub iat: usize,
}

/// AuthUser
///
/// The session context of a request: who is calling, as asserted by a valid
/// token. The identity is not guaranteed to still exist in the store; the
/// access control engine resolves it before any write.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

/// Errors from the password hashing collaborator.
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("could not gather salt entropy: {0}")]
    Entropy(String),
    #[error("could not hash password: {0}")]
    Hash(String),
}

/// Errors from issuing a session token.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token lifetime of {0}s overflows the expiry timestamp")]
    TtlOverflow(u64),
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

/// hash_password
///
/// Hashes with Argon2 (default parameters) and a random 16-byte salt, returning
/// the PHC string that is stored in `users.password_hash`.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| PasswordError::Entropy(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| PasswordError::Hash(e.to_string()))?;
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::Hash(e.to_string()))?
        .to_string();
    Ok(phc)
}

/// verify_password
///
/// False for a wrong password and for a malformed stored hash alike.
pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// issue_token
///
/// Signs an HS256 session token for `user`, valid for `config.token_ttl_secs`.
pub fn issue_token(config: &AppConfig, user: &User) -> Result<String, TokenError> {
    let now = Utc::now().timestamp().max(0) as usize;
    let exp = usize::try_from(config.token_ttl_secs)
        .ok()
        .and_then(|ttl| now.checked_add(ttl))
        .ok_or(TokenError::TtlOverflow(config.token_ttl_secs))?;
    let claims = Claims {
        sub: user.id,
        role: user.role,
        iat: now,
        exp,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?;
    Ok(token)
}

/// AuthUser Extractor Implementation
///
/// Resolution order:
/// 1. `Env::Local` only: an `x-user-id` header naming an existing user.
/// 2. `Authorization: Bearer <token>`, signature and expiry validated.
///
/// Rejection: `StatusCode::UNAUTHORIZED` on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);

        // Development bypass. The user must exist so the role is real.
        if config.env == Env::Local {
            let bypass_id = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|id_str| Uuid::parse_str(id_str).ok());

            if let Some(user_id) = bypass_id {
                let repo = RepositoryState::from_ref(state);
                if let Some(user) = repo.get_user(user_id).await {
                    return Ok(AuthUser {
                        id: user.id,
                        role: user.role,
                    });
                }
            }
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("rejected expired session token"),
                kind => tracing::debug!("rejected session token: {:?}", kind),
            }
            StatusCode::UNAUTHORIZED
        })?;

        Ok(AuthUser {
            id: token_data.claims.sub,
            role: token_data.claims.role,
        })
    }
}
