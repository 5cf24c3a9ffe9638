use std::env;

/// Development-only signing secret. Never accepted in production.
pub const LOCAL_JWT_SECRET: &str = "classroom-local-development-secret";

const DEFAULT_TOKEN_TTL_SECS: u64 = 60 * 60 * 24;
/// Longest session a token may be issued for: one year.
pub const MAX_TOKEN_TTL_SECS: u64 = 60 * 60 * 24 * 365;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// AppConfig
///
/// Holds the application's entire configuration state. Loaded once at startup and
/// shared immutably with every handler through `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Postgres connection string. `None` selects the in-memory store (local only).
    pub db_url: Option<String>,
    // Runtime environment marker. Controls the development auth bypass.
    pub env: Env,
    // HMAC secret used to sign and validate session tokens.
    pub jwt_secret: String,
    // Lifetime of an issued session token, in seconds.
    pub token_ttl_secs: u64,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
}

/// Env
///
/// Runtime context: `Local` enables the in-memory store and the `x-user-id`
/// bypass, `Production` demands every secret explicitly.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// Safe, non-panicking configuration used for test state scaffolding.
    fn default() -> Self {
        Self {
            db_url: None,
            env: Env::Local,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from the environment, failing fast.
    ///
    /// # Panics
    /// Panics when a variable required by the current environment is missing, or
    /// when `TOKEN_TTL_SECS` is not a positive integer no greater than
    /// [`MAX_TOKEN_TTL_SECS`].
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let token_ttl_secs = match env::var("TOKEN_TTL_SECS") {
            Ok(raw) => match raw.parse::<u64>() {
                Ok(ttl) if ttl > 0 && ttl <= MAX_TOKEN_TTL_SECS => ttl,
                Ok(ttl) if ttl > MAX_TOKEN_TTL_SECS => panic!(
                    "FATAL: TOKEN_TTL_SECS must be at most {MAX_TOKEN_TTL_SECS}, got {ttl}"
                ),
                _ => panic!("FATAL: TOKEN_TTL_SECS must be a positive integer, got {raw:?}"),
            },
            Err(_) => DEFAULT_TOKEN_TTL_SECS,
        };

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        match env {
            Env::Local => Self {
                env: Env::Local,
                // Without a database the server runs against the in-memory store.
                db_url: env::var("DATABASE_URL").ok(),
                jwt_secret: env::var("JWT_SECRET")
                    .unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
                token_ttl_secs,
                bind_addr,
            },
            Env::Production => Self {
                env: Env::Production,
                db_url: Some(
                    env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod"),
                ),
                jwt_secret: env::var("JWT_SECRET")
                    .expect("FATAL: JWT_SECRET must be set in production."),
                token_ttl_secs,
                bind_addr,
            },
        }
    }
}
