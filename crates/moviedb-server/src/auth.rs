use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use constant_time_eq::constant_time_eq;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::{
    store::{IssuedToken, TokenStore},
    AppState,
};

pub const DEFAULT_USERNAME: &str = "username";
pub const DEFAULT_PASSWORD: &str = "password";

/// A username/password pair. Also the shape of the `POST /api/auth` body;
/// absent fields decode as empty strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// The single account this server accepts.
    pub fn fixed() -> Self {
        Self::new(DEFAULT_USERNAME, DEFAULT_PASSWORD)
    }

    fn matches(&self, username: &str, password: &str) -> bool {
        // Evaluate both halves so a bad username costs the same as a bad password.
        let user_ok = constant_time_eq(self.username.as_bytes(), username.as_bytes());
        let pass_ok = constant_time_eq(self.password.as_bytes(), password.as_bytes());
        user_ok & pass_ok
    }
}

/// Bad username or password on `POST /api/auth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidCredentials;

impl IntoResponse for InvalidCredentials {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid username or password"})),
        )
            .into_response()
    }
}

/// Missing, unknown or expired bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidToken;

impl IntoResponse for InvalidToken {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid token"})),
        )
            .into_response()
    }
}

/// Checks credentials against the fixed account and hands out tokens from the
/// injected store.
#[derive(Clone)]
pub struct Authenticator {
    credentials: Credentials,
    tokens: Arc<dyn TokenStore>,
}

impl Authenticator {
    pub fn new(credentials: Credentials, tokens: Arc<dyn TokenStore>) -> Self {
        Self {
            credentials,
            tokens,
        }
    }

    pub fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<IssuedToken, InvalidCredentials> {
        if !self.credentials.matches(username, password) {
            debug!("rejected credentials");
            return Err(InvalidCredentials);
        }
        Ok(self.tokens.issue())
    }

    pub fn is_valid(&self, token: &str) -> bool {
        self.tokens.check(token)
    }
}

/// Axum middleware that validates `Authorization: Bearer <token>`.
pub async fn require_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let token = request
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match token {
        Some(t) if state.auth.is_valid(t) => next.run(request).await,
        _ => InvalidToken.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::store::MemoryTokenStore;

    fn authenticator(lifetime: Duration) -> Authenticator {
        Authenticator::new(
            Credentials::fixed(),
            Arc::new(MemoryTokenStore::new(lifetime)),
        )
    }

    #[test]
    fn fixed_pair_is_accepted() {
        let auth = authenticator(Duration::from_secs(10));
        let token = auth.authenticate("username", "password").unwrap();
        assert_eq!(token.lifetime, Duration::from_secs(10));
        assert!(auth.is_valid(&token.bearer));
    }

    #[test]
    fn mismatches_are_rejected() {
        let auth = authenticator(Duration::from_secs(10));
        assert_eq!(auth.authenticate("username", "wrong"), Err(InvalidCredentials));
        assert_eq!(auth.authenticate("admin", "password"), Err(InvalidCredentials));
        assert_eq!(auth.authenticate("", ""), Err(InvalidCredentials));
        assert_eq!(
            auth.authenticate("username", "password "),
            Err(InvalidCredentials)
        );
    }

    #[test]
    fn token_stops_validating_after_lifetime() {
        let auth = authenticator(Duration::from_millis(40));
        let token = auth.authenticate("username", "password").unwrap();
        assert!(auth.is_valid(&token.bearer));
        std::thread::sleep(Duration::from_millis(60));
        assert!(!auth.is_valid(&token.bearer));
    }

    #[test]
    fn missing_body_fields_decode_empty() {
        let c: Credentials = serde_json::from_str(r#"{"username":"username"}"#).unwrap();
        assert_eq!(c.username, "username");
        assert_eq!(c.password, "");
    }
}
