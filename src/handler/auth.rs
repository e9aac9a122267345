use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::Cookie;
use serde_json::json;
use validator::Validate;

use crate::{
    dtos::{
        userdtos::{
            ClientSignupDto, LabourSignupDto, LoginUserDto, RequestOtpDto, UserLoginResponseDto,
        },
        ApiResponse,
    },
    error::HttpError,
    middleware::{auth, JWTAuthMiddeware},
    AppState,
};

pub fn auth_handler() -> Router {
    Router::new()
        .route("/labour/request-otp", post(request_otp))
        .route("/labour/signup", post(labour_signup))
        .route("/client/signup", post(client_signup))
        .route("/login", post(login))
        .route("/me", get(me).layer(middleware::from_fn(auth)))
}

pub async fn request_otp(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<RequestOtpDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let expires_at = app_state.otp_service.request_otp(&body.phone).await?;

    Ok(Json(json!({
        "status": "success",
        "message": "OTP sent successfully",
        "expiresAt": expires_at,
    })))
}

pub async fn labour_signup(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<LabourSignupDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let (token, account) = app_state.auth_service.labour_signup(body).await?;

    Ok((
        StatusCode::CREATED,
        Json(UserLoginResponseDto {
            status: "success".to_string(),
            token,
            account,
        }),
    ))
}

pub async fn client_signup(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<ClientSignupDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let (token, account) = app_state.auth_service.client_signup(body).await?;

    Ok((
        StatusCode::CREATED,
        Json(UserLoginResponseDto {
            status: "success".to_string(),
            token,
            account,
        }),
    ))
}

pub async fn login(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<LoginUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let (token, account) = app_state.auth_service.login(body).await?;

    let cookie_duration = time::Duration::minutes(app_state.env.jwt_maxage);
    let cookie = Cookie::build(("token", token.clone()))
        .path("/")
        .max_age(cookie_duration)
        .http_only(true)
        .build();
    let cookie_value = HeaderValue::from_str(&cookie.to_string())
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    let mut response = Json(UserLoginResponseDto {
        status: "success".to_string(),
        token,
        account,
    })
    .into_response();
    response.headers_mut().append(header::SET_COOKIE, cookie_value);

    Ok(response)
}

pub async fn me(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let account = app_state.auth_service.account(&auth.user).await?;

    Ok(Json(ApiResponse::success("Account retrieved", account)))
}
