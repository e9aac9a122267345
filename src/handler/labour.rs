use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    middleware,
    response::IntoResponse,
    routing::{get, patch},
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{
        labourdtos::{ApprovalDecisionDto, LabourListQueryDto},
        ApiResponse, PaginatedResponse,
    },
    error::HttpError,
    middleware::{auth, role_check},
    models::{labourmodel::LabourFilter, usermodel::UserRole},
    AppState,
};

pub fn labour_handler() -> Router {
    let admin_routes = Router::new()
        .route("/admin/pending", get(get_pending_labour))
        .route("/:id/approval", patch(decide_approval))
        .layer(middleware::from_fn(|state, req, next| {
            role_check(state, req, next, vec![UserRole::Admin])
        }))
        .layer(middleware::from_fn(auth));

    Router::new()
        .route("/", get(list_labour))
        .route("/:id", get(get_labour_profile))
        .merge(admin_routes)
}

pub async fn list_labour(
    Query(query_params): Query<LabourListQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    query_params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let filter = LabourFilter {
        category_id: query_params.category,
        city: query_params.city,
    };
    let labours = app_state
        .labour_service
        .list_labour(filter, query_params.page_request())
        .await?;

    Ok(Json(PaginatedResponse::from(labours)))
}

pub async fn get_labour_profile(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(labour_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let profile = app_state.labour_service.get_profile(labour_id).await?;

    Ok(Json(ApiResponse::success("Labour profile retrieved", profile)))
}

pub async fn get_pending_labour(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let pending = app_state.labour_service.list_pending().await?;

    Ok(Json(ApiResponse::success("Pending labour retrieved", pending)))
}

pub async fn decide_approval(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(labour_id): Path<Uuid>,
    Json(body): Json<ApprovalDecisionDto>,
) -> Result<impl IntoResponse, HttpError> {
    let labour = app_state
        .labour_service
        .decide_approval(labour_id, body.is_approved)
        .await?;

    let message = if body.is_approved {
        "Labour approved"
    } else {
        "Labour rejected"
    };
    Ok(Json(ApiResponse::success(message, labour)))
}
