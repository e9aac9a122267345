use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Otp {
    pub id: Uuid,
    pub phone: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
    pub created_at: DateTime<Utc>,
}

impl Otp {
    pub fn is_redeemable(&self, code: &str, now: DateTime<Utc>) -> bool {
        !self.is_used && self.code == code && self.expires_at > now
    }
}
