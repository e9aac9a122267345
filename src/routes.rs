use std::sync::Arc;

use axum::{middleware, routing::get, Extension, Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    handler::{
        auth::auth_handler, categories::categories_handler, jobs::jobs_handler,
        labour::labour_handler, payments::payments_handler, ratings::ratings_handler,
    },
    middleware::auth,
    AppState,
};

async fn health_checker(Extension(app_state): Extension<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "LabourHub API is running",
        "storage": app_state.db_client.backend_name(),
    }))
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_route = Router::new()
        .route("/healthchecker", get(health_checker))
        .nest("/auth", auth_handler())
        .nest("/categories", categories_handler())
        .nest(
            "/jobs",
            jobs_handler()
                .layer(middleware::from_fn(auth))
        )
        .nest("/labour", labour_handler())
        .nest("/ratings", ratings_handler())
        .nest(
            "/payments",
            payments_handler()
                .layer(middleware::from_fn(auth))
        )
        .layer(TraceLayer::new_for_http())
        .layer(Extension(app_state));

    Router::new().nest("/api", api_route)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::{
        db::memory::MemoryStore,
        models::{jobmodel::JobStatus, labourmodel::City},
        test_support::{
            app_state, bearer, job_at, seed_admin, seed_category, seed_client, seed_labour,
            PASSWORD,
        },
    };

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, token);
        }
        let request = match body {
            Some(json) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    fn job_json(category_id: Uuid) -> Value {
        json!({
            "title": "Paint the front gate",
            "description": "Two coats of weatherproof paint on a steel gate",
            "category": category_id,
            "city": "Hubli",
            "estimatedHours": 3.0,
        })
    }

    #[tokio::test]
    async fn health_reports_backend() {
        let app = create_router(app_state(Arc::new(MemoryStore::new())));
        let (status, body) = send(&app, "GET", "/api/healthchecker", None, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["storage"], "memory");
    }

    #[tokio::test]
    async fn job_routes_require_a_client_token() {
        let store = Arc::new(MemoryStore::new());
        let app = create_router(app_state(store.clone()));
        let category = seed_category(&store, "Painting").await;
        let (worker, _) =
            seed_labour(&store, "9100000001", category.id, City::Hubli, 200.0, true).await;

        let (status, body) =
            send(&app, "POST", "/api/jobs", None, Some(job_json(category.id))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["kind"], "unauthorized");

        let (status, body) = send(
            &app,
            "POST",
            "/api/jobs",
            Some(&bearer(&worker)),
            Some(job_json(category.id)),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["kind"], "forbidden");
    }

    #[tokio::test]
    async fn posting_and_applying_over_http() {
        let store = Arc::new(MemoryStore::new());
        let app = create_router(app_state(store.clone()));
        let category = seed_category(&store, "Painting").await;
        let (client, _) = seed_client(&store, "9000000001").await;
        let (worker, _) =
            seed_labour(&store, "9100000001", category.id, City::Hubli, 200.0, true).await;
        let (pending, _) =
            seed_labour(&store, "9100000002", category.id, City::Hubli, 200.0, false).await;
        let client_token = bearer(&client);

        let mut invalid = job_json(category.id);
        invalid["title"] = json!("Fix");
        let (status, body) =
            send(&app, "POST", "/api/jobs", Some(&client_token), Some(invalid)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "validation_error");

        let (status, body) = send(
            &app,
            "POST",
            "/api/jobs",
            Some(&client_token),
            Some(job_json(category.id)),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["hourlyRate"], 200);
        assert_eq!(body["data"]["status"], "open");
        let job_id = body["data"]["id"].as_str().unwrap().to_string();

        let apply = format!("/api/jobs/{}/apply", job_id);
        let (status, _) =
            send(&app, "POST", &apply, Some(&bearer(&pending)), Some(json!({}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(
            &app,
            "POST",
            &apply,
            Some(&bearer(&worker)),
            Some(json!({ "message": "Available this weekend" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["status"], "pending");

        let (status, body) =
            send(&app, "POST", &apply, Some(&bearer(&worker)), Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "state_conflict");

        let (status, body) = send(
            &app,
            "GET",
            &format!("/api/jobs/{}/applications", job_id),
            Some(&client_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["data"][0]["labourPhone"], "+919100000001");

        let (status, body) = send(
            &app,
            "PATCH",
            &format!("/api/jobs/{}/work-done", job_id),
            Some(&client_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "state_conflict");

        let (status, _) = send(
            &app,
            "GET",
            &format!("/api/jobs/{}", Uuid::new_v4()),
            Some(&client_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    fn answer(application_id: &str, verb: &str) -> String {
        format!("/api/jobs/applications/{}/{}", application_id, verb)
    }

    #[tokio::test]
    async fn answering_applications_over_http() {
        let store = Arc::new(MemoryStore::new());
        let state = app_state(store.clone());
        let app = create_router(state.clone());
        let fixture = job_at(&state, &store, JobStatus::Open).await;
        let (second, _) = seed_labour(
            &store,
            "9100000002",
            fixture.job.category_id,
            City::Hubli,
            150.0,
            true,
        )
        .await;
        let (third, _) = seed_labour(
            &store,
            "9100000003",
            fixture.job.category_id,
            City::Hubli,
            150.0,
            true,
        )
        .await;
        let client_token = bearer(&fixture.client);

        let apply = format!("/api/jobs/{}/apply", fixture.job.id);
        let mut ids = Vec::new();
        for worker in [&second, &fixture.worker, &third] {
            let (status, body) =
                send(&app, "POST", &apply, Some(&bearer(worker)), Some(json!({}))).await;
            assert_eq!(status, StatusCode::CREATED);
            ids.push(body["data"]["id"].as_str().unwrap().to_string());
        }

        let (status, _) = send(
            &app,
            "PATCH",
            &answer(&ids[0], "accept"),
            Some(&bearer(&second)),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) =
            send(&app, "PATCH", &answer(&ids[0], "reject"), Some(&client_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "rejected");

        let (status, body) =
            send(&app, "PATCH", &answer(&ids[0], "reject"), Some(&client_token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "state_conflict");

        let (status, body) =
            send(&app, "PATCH", &answer(&ids[1], "accept"), Some(&client_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["job"]["status"], "in_progress");
        assert_eq!(body["data"]["rejectedApplicationIds"], json!([ids[2]]));

        for id in [&ids[1], &ids[2]] {
            let (status, body) =
                send(&app, "PATCH", &answer(id, "accept"), Some(&client_token), None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["kind"], "state_conflict");
        }

        let (status, body) = send(
            &app,
            "PATCH",
            &format!("/api/jobs/{}/payment-received", fixture.job.id),
            Some(&bearer(&fixture.worker)),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "state_conflict");

        let (status, body) = send(
            &app,
            "GET",
            "/api/jobs/applications/mine",
            Some(&bearer(&fixture.worker)),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
    }

    #[tokio::test]
    async fn approval_gate_is_admin_only_and_one_shot() {
        let store = Arc::new(MemoryStore::new());
        let app = create_router(app_state(store.clone()));
        let category = seed_category(&store, "Masonry").await;
        let admin = seed_admin(&store).await;
        let (worker, labour) =
            seed_labour(&store, "9100000001", category.id, City::Dharwad, 300.0, false).await;
        let uri = format!("/api/labour/{}/approval", labour.id);

        let (status, _) = send(
            &app,
            "PATCH",
            &uri,
            Some(&bearer(&worker)),
            Some(json!({ "isApproved": true })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(
            &app,
            "PATCH",
            &uri,
            Some(&bearer(&admin)),
            Some(json!({ "isApproved": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["approvalStatus"], "approved");

        let (status, body) = send(
            &app,
            "PATCH",
            &uri,
            Some(&bearer(&admin)),
            Some(json!({ "isApproved": false })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "state_conflict");

        let (status, body) = send(&app, "GET", "/api/labour?city=Dharwad", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["data"][0]["phone"], "+919100000001");
    }

    #[tokio::test]
    async fn login_sets_the_token_cookie() {
        let store = Arc::new(MemoryStore::new());
        let app = create_router(app_state(store.clone()));
        seed_client(&store, "9000000001").await;

        let request = Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({ "identifier": "9000000001", "password": PASSWORD }).to_string(),
            ))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        assert!(cookie.starts_with("token="));
        assert!(cookie.contains("HttpOnly"));

        let (status, body) = send(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "identifier": "9000000001", "password": "nope-nope" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["kind"], "unauthorized");
    }
}
