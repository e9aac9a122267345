use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::{
    db::MarketStore,
    service::{error::ServiceError, notification_service::NotificationService},
    utils::{
        otp_generator::{generate_otp, DEVELOPMENT_OTP},
        phone::normalize_phone,
    },
};

#[derive(Debug, Clone)]
pub struct OtpService {
    db_client: Arc<dyn MarketStore>,
    notification_service: Arc<NotificationService>,
    ttl_minutes: i64,
    fixed_code: bool,
}

impl OtpService {
    pub fn new(
        db_client: Arc<dyn MarketStore>,
        notification_service: Arc<NotificationService>,
        ttl_minutes: i64,
        fixed_code: bool,
    ) -> Self {
        Self {
            db_client,
            notification_service,
            ttl_minutes,
            fixed_code,
        }
    }

    /// Issues a fresh code for an unregistered phone, retiring any earlier one.
    pub async fn request_otp(&self, phone: &str) -> Result<DateTime<Utc>, ServiceError> {
        let phone = normalize_phone(phone);

        if self
            .db_client
            .find_user_by_contact(None, Some(&phone))
            .await?
            .is_some()
        {
            return Err(ServiceError::DuplicateUser("phone"));
        }

        let code = if self.fixed_code {
            DEVELOPMENT_OTP.to_string()
        } else {
            generate_otp()
        };
        let expires_at = Utc::now() + Duration::minutes(self.ttl_minutes);

        let otp = self.db_client.replace_otp(&phone, &code, expires_at).await?;

        if let Err(e) = self.notification_service.send_otp(&phone, &code).await {
            tracing::error!("Failed to send OTP to {}: {}", phone, e);
            return Err(ServiceError::Notification("Failed to send OTP".to_string()));
        }

        tracing::info!("OTP issued for {} (expires {})", phone, otp.expires_at);
        Ok(otp.expires_at)
    }

    /// Redeems a code. Each code works once, and only before it expires.
    pub async fn verify_otp(&self, phone: &str, code: &str) -> Result<(), ServiceError> {
        let phone = normalize_phone(phone);
        if self.db_client.consume_otp(&phone, code, Utc::now()).await? {
            Ok(())
        } else {
            Err(ServiceError::InvalidOtp)
        }
    }

    pub async fn purge_expired(&self) -> Result<u64, ServiceError> {
        Ok(self.db_client.purge_expired_otps(Utc::now()).await?)
    }

    /// Periodically drops spent and expired codes.
    pub async fn start_cleanup_task(self: Arc<Self>) {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            match self.purge_expired().await {
                Ok(0) => {}
                Ok(n) => tracing::debug!("🧹 Purged {} stale OTP(s)", n),
                Err(e) => tracing::warn!("OTP cleanup failed: {}", e),
            }
        }
    }
}
