pub mod otp_generator;
pub mod pagination;
pub mod password;
pub mod phone;
pub mod token;
