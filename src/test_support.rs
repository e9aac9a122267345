//! Fixtures shared by service and HTTP tests.

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    config::Config,
    db::{memory::MemoryStore, CategoryExt, LabourExt, UserExt},
    dtos::jobdtos::{ApplyJobDto, CreateJobDto},
    models::{
        categorymodel::Category,
        clientmodel::Client,
        jobmodel::{Job, JobStatus},
        labourmodel::{ApprovalStatus, City, Labour, NewLabour},
        usermodel::{NewUser, User, UserRole},
    },
    service::notification_service::{LogNotifier, Notifier},
    utils::{password, token},
    AppState,
};

pub const PASSWORD: &str = "secret123";

pub fn app_state(store: Arc<MemoryStore>) -> Arc<AppState> {
    app_state_with(store, Arc::new(LogNotifier::sms()), Arc::new(LogNotifier::email()))
}

pub fn app_state_with(
    store: Arc<MemoryStore>,
    sms: Arc<dyn Notifier>,
    email: Arc<dyn Notifier>,
) -> Arc<AppState> {
    Arc::new(AppState::new(store, Config::for_tests(), sms, email))
}

pub fn bearer(user: &User) -> String {
    let token = token::create_token(
        &user.id.to_string(),
        user.role.to_str(),
        Config::for_tests().jwt_secret.as_bytes(),
        60,
    )
    .unwrap();
    format!("Bearer {}", token)
}

fn new_user(email: Option<&str>, phone: Option<&str>, role: UserRole) -> NewUser {
    NewUser {
        email: email.map(str::to_string),
        phone: phone.map(str::to_string),
        password_hash: password::hash(PASSWORD).unwrap(),
        role,
        verified: true,
    }
}

pub async fn seed_category(store: &MemoryStore, name: &str) -> Category {
    store
        .create_category(name.to_string(), Some(format!("{} work", name)))
        .await
        .unwrap()
}

pub async fn seed_client(store: &MemoryStore, phone: &str) -> (User, Client) {
    let email = format!("client{}@example.com", phone);
    store
        .create_client_account(
            new_user(Some(&email), Some(phone), UserRole::Client),
            format!("Client {}", &phone[6..]),
            None,
        )
        .await
        .unwrap()
}

pub async fn seed_admin(store: &MemoryStore) -> User {
    store
        .save_user(new_user(Some("admin@example.com"), None, UserRole::Admin))
        .await
        .unwrap()
}

/// A labour profile, approved unless `approved` is false.
pub async fn seed_labour(
    store: &MemoryStore,
    phone: &str,
    category_id: Uuid,
    city: City,
    hourly_rate: f64,
    approved: bool,
) -> (User, Labour) {
    let (user, labour) = store
        .create_labour_account(
            new_user(None, Some(phone), UserRole::Labour),
            NewLabour {
                name: format!("Worker {}", &phone[6..]),
                category_ids: vec![category_id],
                hourly_rate,
                city,
            },
        )
        .await
        .unwrap();

    if !approved {
        return (user, labour);
    }

    let labour = store
        .decide_labour_approval(labour.id, ApprovalStatus::Approved, chrono::Utc::now())
        .await
        .unwrap()
        .unwrap();
    (user, labour)
}

pub struct JobFixture {
    pub client: User,
    pub worker: User,
    pub labour: Labour,
    pub job: Job,
}

/// Posts a Plumbing job in Hubli (one worker at 150/h, 2 hours) and drives
/// it forward until it reaches `target`.
pub async fn job_at(state: &AppState, store: &MemoryStore, target: JobStatus) -> JobFixture {
    let plumbing = seed_category(store, "Plumbing").await;
    let (client, _) = seed_client(store, "9000000001").await;
    let (worker, labour) =
        seed_labour(store, "9100000001", plumbing.id, City::Hubli, 150.0, true).await;
    let jobs = &state.job_service;

    let mut job = jobs
        .create_job(
            &client,
            CreateJobDto {
                title: "Fix kitchen sink".into(),
                description: "Leaking pipe under the kitchen sink needs replacing".into(),
                category: plumbing.id,
                city: City::Hubli,
                estimated_hours: 2.0,
            },
        )
        .await
        .unwrap();

    if job.status != target {
        let application = jobs
            .submit_application(&worker, job.id, ApplyJobDto::default())
            .await
            .unwrap();
        job = jobs.accept_application(&client, application.id).await.unwrap().job;
    }
    if job.status != target {
        job = jobs.mark_work_done(&client, job.id).await.unwrap();
    }
    if job.status != target {
        job = jobs.confirm_payment(&worker, job.id).await.unwrap();
    }
    assert_eq!(job.status, target);

    JobFixture {
        client,
        worker,
        labour,
        job,
    }
}
