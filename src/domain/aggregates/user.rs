//! User Aggregate

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_admin: bool,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Owner fields resolved onto orders for display.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl User {
    pub fn create(name: impl Into<String>, email: &str, password_hash: String, is_admin: bool) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: name.into().trim().to_string(),
            email: normalize_email(email),
            password_hash,
            is_admin,
            avatar: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary { id: self.id, name: self.name.clone(), email: self.email.clone() }
    }

    pub fn touch(&mut self) { self.updated_at = Utc::now(); }
}

/// Emails are unique case-insensitively; stores only ever see the normalized form.
pub fn normalize_email(email: &str) -> String { email.trim().to_lowercase() }
