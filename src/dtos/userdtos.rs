use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    models::{
        clientmodel::Client,
        labourmodel::{City, Labour},
        usermodel::{User, UserRole},
    },
    utils::phone::{format_phone_display, is_valid_phone},
};

pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if is_valid_phone(phone) {
        return Ok(());
    }
    let mut error = ValidationError::new("invalid_phone");
    error.message = Some(Cow::from("Valid 10-digit Indian phone number required"));
    Err(error)
}

fn validate_otp(otp: &str) -> Result<(), ValidationError> {
    if otp.len() == 4 && otp.chars().all(|c| c.is_ascii_digit()) {
        return Ok(());
    }
    let mut error = ValidationError::new("invalid_otp");
    error.message = Some(Cow::from("OTP must be 4 digits"));
    Err(error)
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct RequestOtpDto {
    #[validate(custom = "validate_phone")]
    pub phone: String,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabourSignupDto {
    #[validate(custom = "validate_phone")]
    pub phone: String,

    #[validate(custom = "validate_otp")]
    pub otp: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,

    #[validate(length(min = 2, max = 100, message = "Name must be 2-100 characters"))]
    pub name: String,

    #[validate(length(min = 1, message = "At least one category required"))]
    pub categories: Vec<Uuid>,

    #[validate(range(min = 50.0, max = 2000.0, message = "Hourly rate must be between 50-2000"))]
    pub hourly_rate: f64,

    pub city: City,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct ClientSignupDto {
    #[validate(email(message = "Valid email required"))]
    pub email: String,

    #[validate(custom = "validate_phone")]
    pub phone: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,

    #[validate(length(min = 2, max = 100, message = "Name must be 2-100 characters"))]
    pub name: String,

    #[validate(length(max = 100, message = "Company name must be max 100 characters"))]
    pub company: Option<String>,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct LoginUserDto {
    /// E-mail address or phone number.
    #[validate(length(min = 1, message = "Email or phone is required"))]
    pub identifier: String,

    #[validate(length(min = 1, message = "Password required"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FilterUserDto {
    pub id: Uuid,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: UserRole,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

impl FilterUserDto {
    pub fn filter_user(user: &User) -> Self {
        FilterUserDto {
            id: user.id,
            email: user.email.clone(),
            phone: user.phone.as_deref().map(format_phone_display),
            role: user.role,
            verified: user.verified,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum AccountProfile {
    Client(Client),
    Labour(Labour),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AccountDto {
    pub user: FilterUserDto,
    pub profile: Option<AccountProfile>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLoginResponseDto {
    pub status: String,
    pub token: String,
    #[serde(flatten)]
    pub account: AccountDto,
}
