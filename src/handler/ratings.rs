use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{
        ratingdtos::{LabourRatingsDto, RatingListQueryDto},
        ApiResponse, PaginatedResponse,
    },
    error::HttpError,
    AppState,
};

pub fn ratings_handler() -> Router {
    Router::new()
        .route("/labour/:id", get(get_labour_ratings))
        .route("/labour/:id/stats", get(get_labour_stats))
        .route("/job/:id", get(get_job_rating))
        .route("/client/:id", get(get_client_ratings))
}

pub async fn get_labour_ratings(
    Query(query_params): Query<RatingListQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Path(labour_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    query_params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let (labour, ratings) = app_state
        .rating_service
        .labour_ratings(labour_id, query_params.page_request())
        .await?;

    Ok(Json(ApiResponse::success(
        "Ratings retrieved",
        LabourRatingsDto {
            labour,
            ratings: PaginatedResponse::from(ratings),
        },
    )))
}

pub async fn get_labour_stats(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(labour_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let stats = app_state.rating_service.labour_stats(labour_id).await?;

    Ok(Json(ApiResponse::success("Rating stats retrieved", stats)))
}

pub async fn get_job_rating(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let rating = app_state.rating_service.rating_for_job(job_id).await?;

    Ok(Json(ApiResponse::success("Rating retrieved", rating)))
}

pub async fn get_client_ratings(
    Query(query_params): Query<RatingListQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Path(client_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    query_params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let ratings = app_state
        .rating_service
        .client_ratings(client_id, query_params.page_request())
        .await?;

    Ok(Json(PaginatedResponse::from(ratings)))
}
