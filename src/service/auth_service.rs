use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::{MarketStore, USER_EMAIL_UNIQUE, USER_PHONE_UNIQUE},
    dtos::userdtos::{
        AccountDto, AccountProfile, ClientSignupDto, FilterUserDto, LabourSignupDto, LoginUserDto,
    },
    error::ErrorMessage,
    models::{
        labourmodel::NewLabour,
        usermodel::{NewUser, User, UserRole},
    },
    service::{
        error::ServiceError, notification_service::NotificationService, otp_service::OtpService,
    },
    utils::{
        password,
        phone::{looks_like_phone, normalize_phone},
        token,
    },
};

fn duplicate_user(err: crate::db::DbError) -> ServiceError {
    if err.is_unique_violation(USER_EMAIL_UNIQUE) {
        ServiceError::DuplicateUser("email")
    } else if err.is_unique_violation(USER_PHONE_UNIQUE) {
        ServiceError::DuplicateUser("phone")
    } else {
        err.into()
    }
}

fn hash_password(raw: &str) -> Result<String, ServiceError> {
    password::hash(raw).map_err(|e| {
        let message = e.to_string();
        match e {
            ErrorMessage::EmptyPassword | ErrorMessage::ExceededMaxPasswordLength(_) => {
                ServiceError::Validation(message)
            }
            _ => ServiceError::Other(message),
        }
    })
}

/// Signup, login and the identity/profile lookups behind `/auth`.
#[derive(Debug, Clone)]
pub struct AuthService {
    db_client: Arc<dyn MarketStore>,
    otp_service: Arc<OtpService>,
    notification_service: Arc<NotificationService>,
    jwt_secret: String,
    jwt_maxage: i64,
}

impl AuthService {
    pub fn new(
        db_client: Arc<dyn MarketStore>,
        otp_service: Arc<OtpService>,
        notification_service: Arc<NotificationService>,
        jwt_secret: String,
        jwt_maxage: i64,
    ) -> Self {
        Self {
            db_client,
            otp_service,
            notification_service,
            jwt_secret,
            jwt_maxage,
        }
    }

    pub fn issue_token(&self, user: &User) -> Result<String, ServiceError> {
        token::create_token(
            &user.id.to_string(),
            user.role.to_str(),
            self.jwt_secret.as_bytes(),
            self.jwt_maxage,
        )
        .map_err(|e| ServiceError::Other(format!("token creation failed: {}", e)))
    }

    pub async fn labour_signup(
        &self,
        body: LabourSignupDto,
    ) -> Result<(String, AccountDto), ServiceError> {
        let phone = normalize_phone(&body.phone);

        let requested: HashSet<Uuid> = body.categories.iter().copied().collect();
        let category_ids: Vec<Uuid> = requested.into_iter().collect();
        let active = self
            .db_client
            .get_categories_by_ids(&category_ids)
            .await?
            .into_iter()
            .filter(|c| c.is_active)
            .count();
        if active != category_ids.len() {
            return Err(ServiceError::Validation(
                "One or more categories do not exist or are inactive".to_string(),
            ));
        }

        self.otp_service.verify_otp(&phone, &body.otp).await?;

        let password_hash = hash_password(&body.password)?;
        let (user, labour) = self
            .db_client
            .create_labour_account(
                NewUser {
                    email: None,
                    phone: Some(phone),
                    password_hash,
                    role: UserRole::Labour,
                    verified: true,
                },
                NewLabour {
                    name: body.name.trim().to_string(),
                    category_ids,
                    hourly_rate: body.hourly_rate,
                    city: body.city,
                },
            )
            .await
            .map_err(duplicate_user)?;

        tracing::info!("Labour {} signed up (user {}), pending approval", labour.id, user.id);

        let token = self.issue_token(&user)?;
        Ok((
            token,
            AccountDto {
                user: FilterUserDto::filter_user(&user),
                profile: Some(AccountProfile::Labour(labour)),
            },
        ))
    }

    pub async fn client_signup(
        &self,
        body: ClientSignupDto,
    ) -> Result<(String, AccountDto), ServiceError> {
        let email = body.email.trim().to_lowercase();
        let phone = normalize_phone(&body.phone);

        if let Some(existing) = self
            .db_client
            .find_user_by_contact(Some(&email), Some(&phone))
            .await?
        {
            let field = if existing.email.as_deref() == Some(email.as_str()) {
                "email"
            } else {
                "phone"
            };
            return Err(ServiceError::DuplicateUser(field));
        }

        let password_hash = hash_password(&body.password)?;
        let company = body
            .company
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        let (user, client) = self
            .db_client
            .create_client_account(
                NewUser {
                    email: Some(email),
                    phone: Some(phone),
                    password_hash,
                    role: UserRole::Client,
                    verified: true,
                },
                body.name.trim().to_string(),
                company,
            )
            .await
            .map_err(duplicate_user)?;

        tracing::info!("Client {} signed up (user {})", client.id, user.id);
        self.notification_service.welcome(user.id, &client.name);

        let token = self.issue_token(&user)?;
        Ok((
            token,
            AccountDto {
                user: FilterUserDto::filter_user(&user),
                profile: Some(AccountProfile::Client(client)),
            },
        ))
    }

    pub async fn login(&self, body: LoginUserDto) -> Result<(String, AccountDto), ServiceError> {
        let identifier = body.identifier.trim();
        let user = if looks_like_phone(identifier) {
            let phone = normalize_phone(identifier);
            self.db_client.find_user_by_contact(None, Some(&phone)).await?
        } else {
            let email = identifier.to_lowercase();
            self.db_client.find_user_by_contact(Some(&email), None).await?
        };

        let user = user.ok_or(ServiceError::InvalidCredentials)?;

        let matches = password::compare(&body.password, &user.password)
            .map_err(|_| ServiceError::InvalidCredentials)?;
        if !matches {
            return Err(ServiceError::InvalidCredentials);
        }
        if !user.verified {
            return Err(ServiceError::AccountNotVerified);
        }

        let token = self.issue_token(&user)?;
        let account = self.account(&user).await?;
        Ok((token, account))
    }

    /// The user plus its role-specific profile.
    pub async fn account(&self, user: &User) -> Result<AccountDto, ServiceError> {
        let profile = match user.role {
            UserRole::Client => self
                .db_client
                .get_client_by_user(user.id)
                .await?
                .map(AccountProfile::Client),
            UserRole::Labour => self
                .db_client
                .get_labour_by_user(user.id)
                .await?
                .map(AccountProfile::Labour),
            UserRole::Admin => None,
        };

        Ok(AccountDto {
            user: FilterUserDto::filter_user(user),
            profile,
        })
    }

    /// Creates the configured admin account on first start.
    pub async fn ensure_admin(&self, email: &str, raw_password: &str) -> Result<(), ServiceError> {
        let email = email.trim().to_lowercase();
        if self
            .db_client
            .find_user_by_contact(Some(&email), None)
            .await?
            .is_some()
        {
            return Ok(());
        }

        let user = self
            .db_client
            .save_user(NewUser {
                email: Some(email),
                phone: None,
                password_hash: hash_password(raw_password)?,
                role: UserRole::Admin,
                verified: true,
            })
            .await
            .map_err(duplicate_user)?;

        tracing::info!("Admin account {} created", user.id);
        Ok(())
    }
}
