use std::sync::Arc;

use axum::{
    extract::Path,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{
        categorydtos::{CreateCategoryDto, UpdateCategoryDto},
        ApiResponse,
    },
    error::HttpError,
    middleware::{auth, role_check},
    models::usermodel::UserRole,
    AppState,
};

pub fn categories_handler() -> Router {
    let admin_routes = Router::new()
        .route("/", post(create_category))
        .route("/:id", patch(update_category).delete(delete_category))
        .layer(middleware::from_fn(|state, req, next| {
            role_check(state, req, next, vec![UserRole::Admin])
        }))
        .layer(middleware::from_fn(auth));

    Router::new()
        .route("/", get(list_categories))
        .merge(admin_routes)
}

pub async fn list_categories(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let categories = app_state.category_service.list_categories().await?;

    Ok(Json(ApiResponse::success("Categories retrieved", categories)))
}

pub async fn create_category(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<CreateCategoryDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let category = app_state.category_service.create_category(body).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Category created", category)),
    ))
}

pub async fn update_category(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(category_id): Path<Uuid>,
    Json(body): Json<UpdateCategoryDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let category = app_state
        .category_service
        .update_category(category_id, body)
        .await?;

    Ok(Json(ApiResponse::success("Category updated", category)))
}

pub async fn delete_category(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(category_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let category = app_state
        .category_service
        .deactivate_category(category_id)
        .await?;

    Ok(Json(ApiResponse::success("Category deactivated", category)))
}
