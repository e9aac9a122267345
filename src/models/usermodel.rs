use chrono::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Labour,
    Client,
    Admin,
}

impl UserRole {
    pub fn to_str(&self) -> &str {
        match self {
            UserRole::Labour => "labour",
            UserRole::Client => "client",
            UserRole::Admin => "admin",
        }
    }
}

/// Identity record. The role is fixed when the row is created and has no update path.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub password: String,
    pub role: UserRole,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: String,
    pub role: UserRole,
    pub verified: bool,
}

impl NewUser {
    /// Either an email or a phone number must identify the account.
    pub fn has_contact(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().map_or(false, |s| !s.trim().is_empty());
        present(&self.email) || present(&self.phone)
    }

    pub fn into_user(self, id: Uuid, now: DateTime<Utc>) -> User {
        User {
            id,
            email: self.email,
            phone: self.phone,
            password: self.password_hash,
            role: self.role,
            verified: self.verified,
            created_at: now,
            updated_at: now,
        }
    }
}
