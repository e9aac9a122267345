use std::str::FromStr;

use anyhow::{Context, Result};

const DEVELOPMENT: &str = "development";

#[derive(Debug, Clone)]
pub struct Config {
    /// Absent means the process-local store is used.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    /// Token lifetime in minutes.
    pub jwt_maxage: i64,
    pub port: u16,
    pub app_env: String,
    pub otp_ttl_minutes: i64,
    pub resend_api_key: Option<String>,
    pub mail_from: String,
    pub cors_origins: Vec<String>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} has an invalid value: {}", name, raw)),
        None => Ok(default),
    }
}

impl Config {
    pub fn init() -> Result<Config> {
        let jwt_secret = optional("JWT_SECRET_KEY").context("JWT_SECRET_KEY must be set")?;

        let cors_origins = optional("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".to_string())
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        Ok(Config {
            database_url: optional("DATABASE_URL"),
            db_max_connections: parsed("DB_MAX_CONNECTIONS", 10)?,
            jwt_secret,
            jwt_maxage: parsed("JWT_MAXAGE", 60)?,
            port: parsed("PORT", 8000)?,
            app_env: optional("APP_ENV").unwrap_or_else(|| DEVELOPMENT.to_string()),
            otp_ttl_minutes: parsed("OTP_TTL_MINUTES", 10)?,
            resend_api_key: optional("RESEND_API_KEY"),
            mail_from: optional("MAIL_FROM")
                .unwrap_or_else(|| "LabourHub <noreply@labourhub.app>".to_string()),
            cors_origins,
            admin_email: optional("ADMIN_EMAIL"),
            admin_password: optional("ADMIN_PASSWORD"),
        })
    }

    /// Development builds use a fixed OTP so signups work without an SMS gateway.
    pub fn is_development(&self) -> bool {
        self.app_env == DEVELOPMENT
    }

    #[cfg(test)]
    pub fn for_tests() -> Config {
        Config {
            database_url: None,
            db_max_connections: 1,
            jwt_secret: "test-secret".to_string(),
            jwt_maxage: 60,
            port: 0,
            app_env: DEVELOPMENT.to_string(),
            otp_ttl_minutes: 10,
            resend_api_key: None,
            mail_from: "LabourHub <test@labourhub.app>".to_string(),
            cors_origins: vec!["http://localhost:5173".to_string()],
            admin_email: None,
            admin_password: None,
        }
    }
}
