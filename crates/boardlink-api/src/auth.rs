//! Operator authentication: accounts, sessions, middleware.
//!
//! Passwords are bcrypt-hashed in the operator table. Sessions are opaque
//! random bearer tokens in an in-memory map with a TTL, so logout and
//! expiry revoke a token immediately. A restart drops all sessions;
//! operators log in again.

use std::collections::HashMap;
use std::sync::Arc;

use base64::prelude::*;
use rand::RngCore;
use tokio::sync::RwLock;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};

use boardlink_core::error::Error as CoreError;
use boardlink_storage::{DispatchStore, OperatorRecord};

use crate::server::ServerState;

/// Bytes of entropy per session token.
const TOKEN_BYTES: usize = 32;

/// An authenticated operator session, inserted into request extensions by
/// the auth middleware.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub operator_id: String,
    pub username: String,
    pub created_at: i64,
    pub expires_at: i64,
}

/// Operator-facing authentication failures.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Username already taken")]
    UsernameTaken,
    #[error("Invalid registration key")]
    InvalidRegistrationKey,
    #[error("Missing or malformed Authorization header")]
    MissingToken,
    #[error("Invalid or expired session")]
    InvalidSession,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            // Login failures are a plain 400; the body does not say which
            // part of the credential pair was wrong.
            AuthError::InvalidCredentials => (StatusCode::BAD_REQUEST, self.to_string()),
            AuthError::UsernameTaken => (StatusCode::BAD_REQUEST, self.to_string()),
            AuthError::InvalidRegistrationKey => (StatusCode::FORBIDDEN, self.to_string()),
            AuthError::MissingToken | AuthError::InvalidSession => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            AuthError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AuthError::Internal(_) => {
                tracing::error!(error = %self, "Auth internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });
        (status, Json(body)).into_response()
    }
}

/// Operator account and session management.
#[derive(Clone)]
pub struct AuthGateway {
    store: Arc<DispatchStore>,
    sessions: Arc<RwLock<HashMap<String, SessionInfo>>>,
    registration_key: Option<String>,
    session_ttl_secs: i64,
}

impl AuthGateway {
    pub fn new(
        store: Arc<DispatchStore>,
        registration_key: Option<String>,
        session_ttl_secs: i64,
    ) -> Self {
        Self {
            store,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            registration_key,
            session_ttl_secs,
        }
    }

    /// Create an operator account. Self-registration is gated by the
    /// configured registration key; when no key is configured, signup is
    /// open (first-run bootstrap).
    pub fn register_operator(
        &self,
        username: &str,
        password: &str,
        email: Option<String>,
        registration_key: Option<&str>,
    ) -> Result<OperatorRecord, AuthError> {
        if let Some(expected) = &self.registration_key {
            if registration_key != Some(expected.as_str()) {
                tracing::warn!(username, "Operator signup rejected: bad registration key");
                return Err(AuthError::InvalidRegistrationKey);
            }
        }
        if username.is_empty() {
            return Err(AuthError::InvalidInput("username must not be empty".into()));
        }
        if password.len() < 8 {
            return Err(AuthError::InvalidInput(
                "password must be at least 8 characters".into(),
            ));
        }

        let password_hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        let record = OperatorRecord {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            password_hash,
            email,
            created_at: chrono::Utc::now().timestamp(),
        };
        self.store.create_operator(&record).map_err(|e| {
            match CoreError::from(e) {
                CoreError::Conflict(_) => AuthError::UsernameTaken,
                other => AuthError::Internal(other.to_string()),
            }
        })?;
        tracing::info!(username, "Operator registered");
        Ok(record)
    }

    /// Verify credentials and mint a session token.
    pub async fn login(&self, username: &str, password: &str) -> Result<String, AuthError> {
        let operator = self
            .store
            .get_operator(username)
            .map_err(|e| AuthError::Internal(e.to_string()))?
            .ok_or(AuthError::InvalidCredentials)?;

        let valid = bcrypt::verify(password, &operator.password_hash)
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        if !valid {
            tracing::warn!(username, "Login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        let token = Self::generate_token();
        let now = chrono::Utc::now().timestamp();
        let session = SessionInfo {
            operator_id: operator.id,
            username: operator.username.clone(),
            created_at: now,
            expires_at: now + self.session_ttl_secs,
        };
        self.sessions.write().await.insert(token.clone(), session);
        tracing::info!(username, "Operator logged in");
        Ok(token)
    }

    /// Revoke a session token. Returns `false` when the token was not a
    /// live session.
    pub async fn logout(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    /// Resolve a bearer token to a live session, evicting it when expired.
    pub async fn require_session(&self, token: &str) -> Result<SessionInfo, AuthError> {
        let now = chrono::Utc::now().timestamp();
        let mut sessions = self.sessions.write().await;
        match sessions.get(token) {
            Some(session) if session.expires_at > now => Ok(session.clone()),
            Some(_) => {
                sessions.remove(token);
                Err(AuthError::InvalidSession)
            }
            None => Err(AuthError::InvalidSession),
        }
    }

    pub fn operator_count(&self) -> Result<usize, AuthError> {
        self.store
            .operator_count()
            .map_err(|e| AuthError::Internal(e.to_string()))
    }

    fn generate_token() -> String {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        BASE64_URL_SAFE_NO_PAD.encode(bytes)
    }
}

/// Session authentication middleware for operator routes. Validates the
/// bearer token and stores the `SessionInfo` in request extensions.
pub async fn session_auth_middleware(
    State(state): State<ServerState>,
    headers: HeaderMap,
    mut req: axum::extract::Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingToken)?;
    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::MissingToken)?;

    let session = state.auth.require_session(token).await?;
    req.extensions_mut().insert(session);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway(key: Option<&str>, ttl: i64) -> (tempfile::TempDir, AuthGateway) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(DispatchStore::open(dir.path().join("a.redb")).unwrap());
        (
            dir,
            AuthGateway::new(store, key.map(String::from), ttl),
        )
    }

    #[tokio::test]
    async fn test_register_login_logout() {
        let (_dir, auth) = gateway(None, 3600);
        auth.register_operator("alice", "correct-horse", None, None)
            .unwrap();

        let token = auth.login("alice", "correct-horse").await.unwrap();
        let session = auth.require_session(&token).await.unwrap();
        assert_eq!(session.username, "alice");

        assert!(auth.logout(&token).await);
        assert!(auth.require_session(&token).await.is_err());
        assert!(!auth.logout(&token).await);
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let (_dir, auth) = gateway(None, 3600);
        auth.register_operator("alice", "correct-horse", None, None)
            .unwrap();

        assert!(matches!(
            auth.login("alice", "wrong").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("nobody", "correct-horse").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_registration_key_gating() {
        let (_dir, auth) = gateway(Some("fleet-key"), 3600);

        assert!(matches!(
            auth.register_operator("alice", "correct-horse", None, None),
            Err(AuthError::InvalidRegistrationKey)
        ));
        assert!(matches!(
            auth.register_operator("alice", "correct-horse", None, Some("wrong")),
            Err(AuthError::InvalidRegistrationKey)
        ));
        assert!(auth
            .register_operator("alice", "correct-horse", None, Some("fleet-key"))
            .is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let (_dir, auth) = gateway(None, 3600);
        auth.register_operator("alice", "correct-horse", None, None)
            .unwrap();
        assert!(matches!(
            auth.register_operator("alice", "other-password", None, None),
            Err(AuthError::UsernameTaken)
        ));
    }

    #[tokio::test]
    async fn test_expired_session_is_evicted() {
        let (_dir, auth) = gateway(None, -1); // already expired at mint
        auth.register_operator("alice", "correct-horse", None, None)
            .unwrap();
        let token = auth.login("alice", "correct-horse").await.unwrap();
        assert!(auth.require_session(&token).await.is_err());
        // The expired entry is gone, not lingering.
        assert!(!auth.logout(&token).await);
    }

    #[test]
    fn test_tokens_are_unique() {
        let a = AuthGateway::generate_token();
        let b = AuthGateway::generate_token();
        assert_ne!(a, b);
        assert!(a.len() >= 40);
    }
}
