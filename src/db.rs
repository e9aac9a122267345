use std::fmt::Debug;

use thiserror::Error;

pub mod categorydb;
pub mod db;
pub mod jobdb;
pub mod labourdb;
pub mod memory;
pub mod otpdb;
pub mod ratingdb;
pub mod userdb;

pub use categorydb::CategoryExt;
pub use jobdb::JobExt;
pub use labourdb::LabourExt;
pub use otpdb::OtpExt;
pub use ratingdb::RatingExt;
pub use userdb::UserExt;

pub const USER_EMAIL_UNIQUE: &str = "users_email_key";
pub const USER_PHONE_UNIQUE: &str = "users_phone_key";
pub const CATEGORY_NAME_UNIQUE: &str = "categories_name_key";
pub const APPLICATION_UNIQUE: &str = "job_applications_job_labour_key";
pub const RATING_JOB_UNIQUE: &str = "ratings_job_id_key";

const PG_UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("duplicate key violates unique constraint {0}")]
    UniqueViolation(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("database error: {0}")]
    Sqlx(sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl DbError {
    pub fn is_unique_violation(&self, constraint: &str) -> bool {
        matches!(self, DbError::UniqueViolation(name) if name == constraint)
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(PG_UNIQUE_VIOLATION) {
                let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                return DbError::UniqueViolation(constraint);
            }
        }
        DbError::Sqlx(err)
    }
}

/// Everything the services need from storage. Implemented by the PostgreSQL
/// client and by the in-memory store; every multi-row mutation is atomic in both.
pub trait MarketStore:
    UserExt + LabourExt + CategoryExt + JobExt + RatingExt + OtpExt + Debug + Send + Sync
{
    fn backend_name(&self) -> &'static str;
}
