use std::sync::Arc;

use axum::{
    extract::{Path, Query},
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
        jobdtos::{
            AcceptedApplicationDto, ApplicationListQueryDto, ApplyJobDto, CreateJobDto,
            JobListQueryDto, LabourRatingSummaryDto, RateJobDto, RatedJobDto,
        },
        ApiResponse, PaginatedResponse,
    },
    error::HttpError,
    middleware::{role_check, JWTAuthMiddeware},
    models::usermodel::UserRole,
    AppState,
};

pub fn jobs_handler() -> Router {
    let client_routes = Router::new()
        .route("/", post(create_job))
        .route("/:id/applications", get(get_job_applications))
        .route("/applications/:id/accept", patch(accept_application))
        .route("/applications/:id/reject", patch(reject_application))
        .route("/:id/work-done", patch(mark_work_done))
        .route("/:id/rate", post(rate_job))
        .route("/:id/cancel", patch(cancel_job))
        .layer(middleware::from_fn(|state, req, next| {
            role_check(state, req, next, vec![UserRole::Client])
        }));

    let labour_routes = Router::new()
        .route("/available", get(get_available_jobs))
        .route("/:id/apply", post(apply_for_job))
        .route("/applications/mine", get(get_my_applications))
        .route("/:id/payment-received", patch(confirm_payment))
        .layer(middleware::from_fn(|state, req, next| {
            role_check(state, req, next, vec![UserRole::Labour])
        }));

    Router::new()
        .route("/my-jobs", get(get_my_jobs))
        .route("/:id", get(get_job))
        .merge(client_routes)
        .merge(labour_routes)
}

pub async fn create_job(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateJobDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let job = app_state.job_service.create_job(&auth.user, body).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Job created successfully", job)),
    ))
}

pub async fn get_job(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let job = app_state.job_service.get_job(job_id).await?;

    Ok(Json(ApiResponse::success("Job retrieved", job)))
}

pub async fn get_my_jobs(
    Query(query_params): Query<JobListQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    query_params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let jobs = app_state
        .job_service
        .list_my_jobs(&auth.user, query_params.status, query_params.page_request())
        .await?;

    Ok(Json(PaginatedResponse::from(jobs)))
}

pub async fn get_available_jobs(
    Query(query_params): Query<JobListQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    query_params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let jobs = app_state
        .job_service
        .list_available_jobs(&auth.user, query_params.page_request())
        .await?;

    Ok(Json(PaginatedResponse::from(jobs)))
}

pub async fn apply_for_job(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(job_id): Path<Uuid>,
    Json(body): Json<ApplyJobDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let application = app_state
        .job_service
        .submit_application(&auth.user, job_id, body)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Application submitted", application)),
    ))
}

pub async fn get_job_applications(
    Query(query_params): Query<ApplicationListQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    query_params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let applications = app_state
        .job_service
        .list_job_applications(
            &auth.user,
            job_id,
            query_params.status,
            query_params.page_request(),
        )
        .await?;

    Ok(Json(PaginatedResponse::from(applications)))
}

pub async fn get_my_applications(
    Query(query_params): Query<ApplicationListQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    query_params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let applications = app_state
        .job_service
        .list_my_applications(&auth.user, query_params.status, query_params.page_request())
        .await?;

    Ok(Json(PaginatedResponse::from(applications)))
}

pub async fn accept_application(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(application_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let accepted = app_state
        .job_service
        .accept_application(&auth.user, application_id)
        .await?;

    Ok(Json(ApiResponse::success(
        "Application accepted",
        AcceptedApplicationDto::from(accepted),
    )))
}

pub async fn reject_application(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(application_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let application = app_state
        .job_service
        .reject_application(&auth.user, application_id)
        .await?;

    Ok(Json(ApiResponse::success("Application rejected", application)))
}

pub async fn mark_work_done(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let job = app_state.job_service.mark_work_done(&auth.user, job_id).await?;

    Ok(Json(ApiResponse::success("Work marked as done", job)))
}

pub async fn confirm_payment(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let job = app_state.job_service.confirm_payment(&auth.user, job_id).await?;

    Ok(Json(ApiResponse::success("Payment confirmed", job)))
}

pub async fn rate_job(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(job_id): Path<Uuid>,
    Json(body): Json<RateJobDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let rated = app_state.job_service.rate_job(&auth.user, job_id, body).await?;
    let labour = LabourRatingSummaryDto::from(&rated.labour);

    Ok(Json(ApiResponse::success(
        "Job rated successfully",
        RatedJobDto {
            job: rated.job,
            rating: rated.rating,
            labour,
        },
    )))
}

pub async fn cancel_job(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let job = app_state.job_service.cancel_job(&auth.user, job_id).await?;

    Ok(Json(ApiResponse::success("Job cancelled", job)))
}
