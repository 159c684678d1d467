//! HTTP Basic Auth for the dashboard, backed by an argon2 password hash

use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::Rng;

use crate::config::AuthConfig;
use crate::dashboard::ApiError;
use crate::SolarError;

const SALT_BYTES: usize = 16;

/// Decides whether a username/password pair may use the dashboard
#[cfg_attr(test, mockall::automock)]
pub trait CredentialCheck: Send + Sync {
    fn verify(&self, username: &str, password: &str) -> bool;
}

/// One configured user with an argon2 PHC password hash
#[derive(Debug, Clone)]
pub struct Argon2Credentials {
    username: String,
    password_hash: String,
}

impl Argon2Credentials {
    /// Fails when the configured hash is not a PHC string
    pub fn from_config(config: &AuthConfig) -> crate::Result<Self> {
        PasswordHash::new(&config.password_hash)
            .map_err(|e| SolarError::Auth(format!("invalid password_hash: {}", e)))?;
        Ok(Self {
            username: config.username.clone(),
            password_hash: config.password_hash.clone(),
        })
    }
}

impl CredentialCheck for Argon2Credentials {
    fn verify(&self, username: &str, password: &str) -> bool {
        if username != self.username {
            return false;
        }
        let Ok(hash) = PasswordHash::new(&self.password_hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok()
    }
}

/// Hash `password` into a PHC string for `dashboard.auth.password_hash`
pub fn hash_password(password: &str) -> crate::Result<String> {
    if password.is_empty() {
        return Err(SolarError::Auth("password cannot be empty".to_string()));
    }

    let mut salt = [0u8; SALT_BYTES];
    rand::rng().fill(&mut salt);
    let salt = SaltString::encode_b64(&salt)
        .map_err(|e| SolarError::Auth(format!("salt encoding failed: {}", e)))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| SolarError::Auth(format!("hashing failed: {}", e)))
}

/// Split an `Authorization: Basic ...` value into username and password
pub fn parse_basic_auth(value: &str) -> Option<(String, String)> {
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// Middleware rejecting requests without valid Basic Auth credentials.
///
/// Password verification is CPU and memory heavy, so it runs on the blocking pool.
pub async fn require_basic_auth(
    State(check): State<Arc<dyn CredentialCheck>>,
    request: Request,
    next: Next,
) -> Response {
    let credentials = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_basic_auth);

    let Some((username, password)) = credentials else {
        return ApiError::Unauthorized.into_response();
    };

    let user = username.clone();
    let verified = tokio::task::spawn_blocking(move || check.verify(&user, &password))
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Credential check did not complete: {}", e);
            false
        });

    if verified {
        next.run(request).await
    } else {
        tracing::warn!("Rejected dashboard login for user '{}'", username);
        ApiError::Unauthorized.into_response()
    }
}
