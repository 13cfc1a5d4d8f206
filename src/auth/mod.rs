//! # Authentication
//!
//! Bearer session tokens issued by [`crate::services::AccountService`].
//! Handlers take [`AuthUser`] or [`AdminUser`] as an argument; both are
//! `FromRequestParts` extractors that resolve the `Authorization` header to
//! a live session and its user, rejecting with 401 otherwise.

pub mod password;
pub mod token;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::header;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::aggregates::User;
use crate::error::AppError;
use crate::state::AppState;

/// A server-side session. The token secret itself is never stored.
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub secret_hash: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// The authenticated caller.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user: User,
    pub session_id: Uuid,
}

impl AuthUser {
    pub fn id(&self) -> Uuid { self.user.id }
    pub fn is_admin(&self) -> bool { self.user.is_admin }
}

/// An authenticated caller holding the admin flag.
#[derive(Clone, Debug)]
pub struct AdminUser(pub AuthUser);

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let value = parts
        .headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("missing authorization header".into()))?
        .to_str()
        .map_err(|_| AppError::Unauthorized("authorization header is not valid UTF-8".into()))?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("authorization header must use Bearer scheme".into()))
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        state.accounts.authenticate(token).await.map_err(|e| {
            tracing::warn!(reason = %e, "authentication failed");
            AppError::from(e)
        })
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let caller = AuthUser::from_request_parts(parts, state).await?;
        if !caller.is_admin() {
            tracing::warn!(user_id = %caller.id(), "admin route refused for non-admin caller");
            return Err(AppError::Unauthorized("not authorized as an admin".into()));
        }
        Ok(AdminUser(caller))
    }
}
