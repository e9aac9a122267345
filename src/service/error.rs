use axum::http::StatusCode;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    db::DbError,
    error::{ErrorKind, ErrorMessage, HttpError},
    models::{jobmodel::JobStatus, labourmodel::ApprovalStatus},
};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Job {0} not found")]
    JobNotFound(Uuid),

    #[error("Application {0} not found")]
    ApplicationNotFound(Uuid),

    #[error("Labour {0} not found")]
    LabourNotFound(Uuid),

    #[error("Labour profile not found for user {0}")]
    LabourProfileNotFound(Uuid),

    #[error("Client profile not found for user {0}")]
    ClientProfileNotFound(Uuid),

    #[error("Client {0} not found")]
    ClientNotFound(Uuid),

    #[error("Category {0} not found")]
    CategoryNotFound(Uuid),

    #[error("No rating found for job {0}")]
    RatingNotFound(Uuid),

    #[error("User {0} not found")]
    UserNotFound(Uuid),

    #[error("Job {job_id} is {actual}, expected {expected}")]
    InvalidJobStatus {
        job_id: Uuid,
        expected: JobStatus,
        actual: JobStatus,
    },

    #[error("Application {0} has already been processed")]
    ApplicationAlreadyProcessed(Uuid),

    #[error("You have already applied for job {0}")]
    AlreadyApplied(Uuid),

    #[error("Job {0} has already been rated")]
    AlreadyRated(Uuid),

    #[error("Labour {0} has already been {1}")]
    LabourAlreadyProcessed(Uuid, ApprovalStatus),

    #[error("Labour {0} must be approved to apply for jobs")]
    LabourNotApproved(Uuid),

    #[error("No approved labour available for this category in {0}")]
    NoEligibleLabour(String),

    #[error("User {0} does not own job {1}")]
    NotJobOwner(Uuid, Uuid),

    #[error("User {0} is not the labour assigned to job {1}")]
    NotAssignedLabour(Uuid, Uuid),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account not verified")]
    AccountNotVerified,

    #[error("Invalid or expired OTP")]
    InvalidOtp,

    #[error("A user with this {0} already exists")]
    DuplicateUser(&'static str),

    #[error("Category '{0}' already exists")]
    DuplicateCategory(String),

    #[error("Payment amount {received} does not match the job total {expected}")]
    AmountMismatch { expected: f64, received: f64 },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Other error: {0}")]
    Other(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::JobNotFound(_)
            | ServiceError::ApplicationNotFound(_)
            | ServiceError::LabourNotFound(_)
            | ServiceError::LabourProfileNotFound(_)
            | ServiceError::ClientProfileNotFound(_)
            | ServiceError::ClientNotFound(_)
            | ServiceError::CategoryNotFound(_)
            | ServiceError::RatingNotFound(_)
            | ServiceError::UserNotFound(_) => ErrorKind::NotFound,

            ServiceError::InvalidJobStatus { .. }
            | ServiceError::ApplicationAlreadyProcessed(_)
            | ServiceError::AlreadyApplied(_)
            | ServiceError::AlreadyRated(_)
            | ServiceError::LabourAlreadyProcessed(_, _)
            | ServiceError::NoEligibleLabour(_)
            | ServiceError::DuplicateUser(_)
            | ServiceError::DuplicateCategory(_) => ErrorKind::StateConflict,

            ServiceError::LabourNotApproved(_)
            | ServiceError::NotJobOwner(_, _)
            | ServiceError::NotAssignedLabour(_, _) => ErrorKind::Forbidden,

            ServiceError::InvalidCredentials | ServiceError::AccountNotVerified => {
                ErrorKind::Unauthorized
            }

            ServiceError::InvalidOtp
            | ServiceError::AmountMismatch { .. }
            | ServiceError::Validation(_) => ErrorKind::ValidationError,

            ServiceError::Notification(_) | ServiceError::Database(_) | ServiceError::Other(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.kind().status_code()
    }
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        match error.kind() {
            ErrorKind::Internal => {
                tracing::error!("Internal service failure: {}", error);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }
            kind => HttpError::new(error.to_string(), kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_violations_are_never_server_errors() {
        let job_id = Uuid::new_v4();
        let errors = [
            ServiceError::InvalidJobStatus {
                job_id,
                expected: JobStatus::Open,
                actual: JobStatus::InProgress,
            },
            ServiceError::ApplicationAlreadyProcessed(job_id),
            ServiceError::AlreadyApplied(job_id),
            ServiceError::AlreadyRated(job_id),
            ServiceError::LabourAlreadyProcessed(job_id, ApprovalStatus::Approved),
            ServiceError::NoEligibleLabour("Hubli".into()),
        ];
        for err in errors {
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST, "{}", err);
            assert_eq!(err.kind(), ErrorKind::StateConflict);
        }
    }

    #[test]
    fn actor_errors_are_forbidden() {
        let err = ServiceError::NotJobOwner(Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ServiceError::LabourNotApproved(Uuid::new_v4()).status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn internal_details_are_hidden_from_callers() {
        let err = ServiceError::Database(DbError::InvalidRecord("secret detail".into()));
        let http: HttpError = err.into();
        assert_eq!(http.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!http.message.contains("secret"));
    }
}
