//! Password hashing, bearer-token sessions and the request extractors that
//! resolve them.

use std::collections::HashMap;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task;
use tracing::warn;
use uuid::Uuid;

use crate::domain::User;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// bcrypt with a configurable cost; hashing runs on the blocking pool.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub async fn hash(&self, password: String) -> AppResult<String> {
        let cost = self.cost;
        task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|_| AppError::internal())?
            .map_err(|e| {
                warn!(error = %e, "password hashing failed");
                AppError::internal()
            })
    }

    /// False on mismatch and on a malformed hash.
    pub async fn verify(&self, password: String, hash: String) -> bool {
        task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
            .await
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// In-memory bearer-token sessions. Tokens do not survive a restart.
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn issue(&self, user_id: Uuid) -> IssuedToken {
        let token = format!(
            "{}{}",
            Uuid::new_v4().simple(),
            Uuid::new_v4().simple()
        );
        let expires_at = Utc::now() + self.ttl;

        self.sessions.write().await.insert(
            token.clone(),
            Session {
                user_id,
                expires_at,
            },
        );

        IssuedToken { token, expires_at }
    }

    /// The session's user, dropping the session if it has expired.
    pub async fn resolve(&self, token: &str) -> Option<Uuid> {
        let now = Utc::now();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(token) {
                Some(session) if session.expires_at > now => return Some(session.user_id),
                Some(_) => {}
                None => return None,
            }
        }

        self.sessions.write().await.remove(token);
        None
    }

    pub async fn revoke(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    /// Removes expired sessions and returns how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.expires_at > now);
        before - sessions.len()
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// A request made with a valid session.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

impl AuthUser {
    pub fn require_organizer(&self) -> AppResult<()> {
        if self.user.role.can_post_events() {
            Ok(())
        } else {
            Err(AppError::forbidden("only organizers can do this"))
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> AppResult<Self> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::unauthorized("sign in required"))?
            .to_string();

        let user_id = state
            .sessions
            .resolve(&token)
            .await
            .ok_or_else(|| AppError::unauthorized("session expired or invalid"))?;

        let user = state
            .store
            .user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::unauthorized("session expired or invalid"))?;

        Ok(Self { user, token })
    }
}

/// Like [`AuthUser`], but a missing `Authorization` header yields `None`.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<User>);

impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> AppResult<Self> {
        if !parts.headers.contains_key(AUTHORIZATION) {
            return Ok(Self(None));
        }

        let auth = AuthUser::from_request_parts(parts, state).await?;
        Ok(Self(Some(auth.user)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(header) = header {
            builder = builder.header(AUTHORIZATION, header);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(bearer_token(&parts_with(Some("bearer abc"))), Some("abc"));
        assert_eq!(bearer_token(&parts_with(Some("Bearer  abc "))), Some("abc"));
        assert_eq!(bearer_token(&parts_with(Some("Basic abc"))), None);
        assert_eq!(bearer_token(&parts_with(Some("Bearer"))), None);
        assert_eq!(bearer_token(&parts_with(None)), None);
    }

    #[tokio::test]
    async fn sessions_resolve_until_revoked() {
        let sessions = SessionManager::new(Duration::hours(1));
        let user_id = Uuid::new_v4();
        let issued = sessions.issue(user_id).await;

        assert_eq!(issued.token.len(), 64);
        assert_eq!(sessions.resolve(&issued.token).await, Some(user_id));
        assert!(sessions.revoke(&issued.token).await);
        assert_eq!(sessions.resolve(&issued.token).await, None);
    }

    #[tokio::test]
    async fn expired_sessions_are_dropped() {
        let sessions = SessionManager::new(Duration::seconds(-1));
        let issued = sessions.issue(Uuid::new_v4()).await;
        let _other = sessions.issue(Uuid::new_v4()).await;

        assert_eq!(sessions.resolve(&issued.token).await, None);
        assert_eq!(sessions.purge_expired().await, 1);
    }

    #[tokio::test]
    async fn password_round_trip() {
        let hasher = PasswordHasher::new(4);
        let hash = hasher.hash("terriers123".to_string()).await.unwrap();

        assert!(hasher.verify("terriers123".to_string(), hash.clone()).await);
        assert!(!hasher.verify("wrong-password".to_string(), hash).await);
        assert!(!hasher.verify("x".to_string(), "not-a-hash".to_string()).await);
    }
}
