mod config;
mod db;
mod dtos;
mod error;
mod handler;
mod mail;
mod middleware;
mod models;
mod routes;
mod service;
mod utils;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use anyhow::Context;
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use config::Config;
use dotenv::dotenv;
use routes::create_router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tracing_subscriber::filter::LevelFilter;

use crate::{
    db::{db::DBClient, memory::MemoryStore, MarketStore},
    mail::sendmail::ResendMailer,
    service::{
        auth_service::AuthService,
        category_service::CategoryService,
        job_service::JobService,
        labour_service::LabourService,
        notification_service::{LogNotifier, NotificationService, Notifier},
        otp_service::OtpService,
        payment_service::PaymentService,
        rating_service::RatingService,
    },
};

#[derive(Debug, Clone)]
pub struct AppState {
    pub env: Config,
    pub db_client: Arc<dyn MarketStore>,
    // Services
    pub job_service: Arc<JobService>,
    pub labour_service: Arc<LabourService>,
    pub rating_service: Arc<RatingService>,
    pub category_service: Arc<CategoryService>,
    pub auth_service: Arc<AuthService>,
    pub otp_service: Arc<OtpService>,
    pub payment_service: Arc<PaymentService>,
    pub notification_service: Arc<NotificationService>,
}

impl AppState {
    pub fn new(
        db_client: Arc<dyn MarketStore>,
        config: Config,
        sms: Arc<dyn Notifier>,
        email: Arc<dyn Notifier>,
    ) -> Self {
        let notification_service =
            Arc::new(NotificationService::new(db_client.clone(), sms, email));
        let otp_service = Arc::new(OtpService::new(
            db_client.clone(),
            notification_service.clone(),
            config.otp_ttl_minutes,
            config.is_development(),
        ));
        let auth_service = Arc::new(AuthService::new(
            db_client.clone(),
            otp_service.clone(),
            notification_service.clone(),
            config.jwt_secret.clone(),
            config.jwt_maxage,
        ));
        let job_service = Arc::new(JobService::new(
            db_client.clone(),
            notification_service.clone(),
        ));

        Self {
            env: config,
            job_service,
            labour_service: Arc::new(LabourService::new(db_client.clone())),
            rating_service: Arc::new(RatingService::new(db_client.clone())),
            category_service: Arc::new(CategoryService::new(db_client.clone())),
            payment_service: Arc::new(PaymentService::new(db_client.clone())),
            auth_service,
            otp_service,
            notification_service,
            db_client,
        }
    }
}

fn log_level() -> LevelFilter {
    std::env::var("RUST_LOG_LEVEL")
        .ok()
        .and_then(|level| level.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::DEBUG)
}

async fn connect_store(config: &Config) -> anyhow::Result<Arc<dyn MarketStore>> {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set, using the in-memory store; data is lost on restart");
        return Ok(Arc::new(MemoryStore::new()));
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(database_url)
        .await
        .context("failed to connect to the database")?;
    tracing::info!(
        "✅ Connection to the database is successful (max connections: {})",
        config.db_max_connections
    );

    let db_client = DBClient::new(pool);
    db_client.migrate().await.context("failed to run migrations")?;

    Ok(Arc::new(db_client))
}

fn email_notifier(config: &Config) -> Arc<dyn Notifier> {
    match config.resend_api_key.clone() {
        Some(api_key) => Arc::new(ResendMailer::new(api_key, config.mail_from.clone())),
        None => {
            tracing::warn!("RESEND_API_KEY not set, e-mails will only be logged");
            Arc::new(LogNotifier::email())
        }
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_max_level(log_level())
        .init();

    let config = Config::init()?;
    let db_client = connect_store(&config).await?;

    let app_state = Arc::new(AppState::new(
        db_client,
        config.clone(),
        Arc::new(LogNotifier::sms()),
        email_notifier(&config),
    ));

    let otp_service = app_state.otp_service.clone();
    tokio::spawn(async move {
        otp_service.start_cleanup_task().await;
    });

    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        app_state.auth_service.ensure_admin(email, password).await?;
    }

    let app = create_router(app_state).layer(cors_layer(&config));

    let address = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {}", address))?;
    tracing::info!("🚀 Server is running on http://{}", address);

    axum::serve(listener, app).await?;

    Ok(())
}
