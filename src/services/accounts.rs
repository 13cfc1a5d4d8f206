//! Accounts and sessions.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::password::{hash_password, verify_password, PasswordError, MIN_PASSWORD_LEN};
use crate::auth::token::{format_token, parse_token, TokenError, TokenSecret};
use crate::auth::{AuthUser, Session};
use crate::domain::aggregates::{normalize_email, User};
use crate::store::{SessionStore, StoreError, UserStore};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("email {0} is already registered")]
    EmailTaken(String),

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("not authorized as an admin")]
    NotAdmin,

    #[error(transparent)]
    InvalidToken(#[from] TokenError),

    #[error("session is invalid or has been revoked")]
    InvalidSession,

    #[error("session has expired")]
    SessionExpired,

    #[error("user {0} not found")]
    UserNotFound(Uuid),

    #[error("password must be at least 6 characters")]
    WeakPassword,

    #[error("name must not be empty")]
    MissingName,

    #[error("administrators cannot delete their own account")]
    CannotDeleteSelf,

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Returned by register and login.
#[derive(Clone, Debug, Serialize)]
pub struct AuthSession {
    pub token: String,
    pub user: User,
}

#[derive(Clone, Debug)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Partial profile update; `None` leaves the field untouched.
#[derive(Clone, Debug, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub password: Option<String>,
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    session_ttl: Duration,
}

impl AccountService {
    pub fn new(users: Arc<dyn UserStore>, sessions: Arc<dyn SessionStore>, session_ttl: Duration) -> Self {
        Self { users, sessions, session_ttl }
    }

    pub async fn register(&self, registration: Registration) -> Result<AuthSession, AccountError> {
        let user = self.create_user(&registration.name, &registration.email, &registration.password, false).await?;
        tracing::info!(user_id = %user.id, "user registered");
        self.issue_session(user).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AccountError> {
        let user = self.check_credentials(email, password).await?;
        self.issue_session(user).await
    }

    /// Like [`Self::login`], but only administrators get a session.
    pub async fn login_admin(&self, email: &str, password: &str) -> Result<AuthSession, AccountError> {
        let user = self.check_credentials(email, password).await?;
        if !user.is_admin {
            tracing::warn!(user_id = %user.id, "admin login refused for non-admin");
            return Err(AccountError::NotAdmin);
        }
        self.issue_session(user).await
    }

    pub async fn logout(&self, session_id: Uuid) -> Result<(), AccountError> {
        if !self.sessions.delete(session_id).await? {
            tracing::debug!(%session_id, "logout for a session that no longer exists");
        }
        Ok(())
    }

    /// Resolve a bearer token to its session and user.
    pub async fn authenticate(&self, token: &str) -> Result<AuthUser, AccountError> {
        let parsed = parse_token(token)?;
        let session = self.sessions.find(parsed.session_id).await?.ok_or(AccountError::InvalidSession)?;
        if !parsed.secret.matches(&session.secret_hash) {
            return Err(AccountError::InvalidSession);
        }
        if session.is_expired(Utc::now()) {
            self.sessions.delete(session.id).await?;
            return Err(AccountError::SessionExpired);
        }
        let user = self.users.find(session.user_id).await?.ok_or(AccountError::InvalidSession)?;
        Ok(AuthUser { user, session_id: session.id })
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<User, AccountError> {
        self.users.find(user_id).await?.ok_or(AccountError::UserNotFound(user_id))
    }

    pub async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> Result<User, AccountError> {
        let mut user = self.profile(user_id).await?;
        if let Some(name) = update.name {
            user.name = valid_name(&name)?;
        }
        if let Some(email) = update.email {
            let email = normalize_email(&email);
            if email != user.email {
                if self.users.find_by_email(&email).await?.is_some() {
                    return Err(AccountError::EmailTaken(email));
                }
                user.email = email;
            }
        }
        if let Some(avatar) = update.avatar {
            user.avatar = Some(avatar).filter(|a| !a.trim().is_empty());
        }
        if let Some(password) = update.password {
            user.password_hash = strong_hash(&password)?;
        }
        user.touch();
        self.save_user(&user).await?;
        tracing::info!(%user_id, "profile updated");
        Ok(user)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AccountError> {
        Ok(self.users.list().await?)
    }

    pub async fn delete_user(&self, caller_id: Uuid, user_id: Uuid) -> Result<(), AccountError> {
        if caller_id == user_id {
            return Err(AccountError::CannotDeleteSelf);
        }
        let revoked = self.sessions.delete_for_user(user_id).await?;
        if !self.users.delete(user_id).await? {
            return Err(AccountError::UserNotFound(user_id));
        }
        tracing::info!(%user_id, revoked_sessions = revoked, "user deleted");
        Ok(())
    }

    pub async fn set_admin(&self, user_id: Uuid, is_admin: bool) -> Result<User, AccountError> {
        let mut user = self.profile(user_id).await?;
        user.is_admin = is_admin;
        user.touch();
        self.save_user(&user).await?;
        tracing::info!(%user_id, is_admin, "user role changed");
        Ok(user)
    }

    /// Create the bootstrap administrator, or promote the account if it exists.
    pub async fn ensure_admin(&self, name: &str, email: &str, password: &str) -> Result<User, AccountError> {
        match self.users.find_by_email(&normalize_email(email)).await? {
            Some(user) if user.is_admin => Ok(user),
            Some(user) => self.set_admin(user.id, true).await,
            None => {
                let user = self.create_user(name, email, password, true).await?;
                tracing::info!(user_id = %user.id, email = %user.email, "bootstrap administrator created");
                Ok(user)
            }
        }
    }

    async fn create_user(&self, name: &str, email: &str, password: &str, is_admin: bool) -> Result<User, AccountError> {
        let name = valid_name(name)?;
        let email = normalize_email(email);
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AccountError::EmailTaken(email));
        }
        let user = User::create(name, &email, strong_hash(password)?, is_admin);
        self.users.insert(&user).await.map_err(|e| match e {
            StoreError::Conflict(_) => AccountError::EmailTaken(email),
            other => other.into(),
        })?;
        Ok(user)
    }

    async fn save_user(&self, user: &User) -> Result<(), AccountError> {
        match self.users.update(user).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(AccountError::UserNotFound(user.id)),
            Err(StoreError::Conflict(_)) => Err(AccountError::EmailTaken(user.email.clone())),
            Err(e) => Err(e.into()),
        }
    }

    async fn check_credentials(&self, email: &str, password: &str) -> Result<User, AccountError> {
        let user = self.users.find_by_email(&normalize_email(email)).await?.ok_or(AccountError::InvalidCredentials)?;
        if !verify_password(password, &user.password_hash)? {
            tracing::warn!(user_id = %user.id, "login failed: wrong password");
            return Err(AccountError::InvalidCredentials);
        }
        Ok(user)
    }

    async fn issue_session(&self, user: User) -> Result<AuthSession, AccountError> {
        let now = Utc::now();
        let purged = self.sessions.delete_expired(now).await?;
        if purged > 0 {
            tracing::debug!(purged, "expired sessions removed");
        }

        let secret = TokenSecret::generate();
        let session = Session {
            id: Uuid::now_v7(),
            user_id: user.id,
            secret_hash: secret.hash(),
            created_at: now,
            expires_at: now + self.session_ttl,
        };
        self.sessions.insert(&session).await?;
        tracing::info!(user_id = %user.id, session_id = %session.id, "session issued");
        Ok(AuthSession { token: format_token(session.id, &secret), user })
    }
}

fn valid_name(name: &str) -> Result<String, AccountError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AccountError::MissingName);
    }
    Ok(name.to_string())
}

fn strong_hash(password: &str) -> Result<String, AccountError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AccountError::WeakPassword);
    }
    Ok(hash_password(password)?)
}
