pub mod auth_service;
pub mod category_service;
pub mod error;
pub mod job_service;
pub mod labour_service;
pub mod notification_service;
pub mod otp_service;
pub mod payment_service;
pub mod rating_service;
