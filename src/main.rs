mod config;
mod db;
mod dtos;
mod error;
mod handler;
mod middleware;
mod models;
mod routes;
mod service;
mod utils;

use std::sync::Arc;

use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use config::Config;
use dotenv::dotenv;
use routes::create_router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::filter::LevelFilter;

use crate::db::db::DBClient;
use crate::service::{
    attribution_service::AttributionService,
    audit::AuditService,
    availability::AvailabilityService,
    booking_rules::{default_ruleset, BookingRuleset},
    otp::OtpStore,
    referral_code_service::{ReferralCodeService, RewardSchedule},
    reward_issuer::RewardIssuer,
    scheduling_api::{HttpSchedulingClient, SchedulingApi},
    sms::{HttpSmsClient, SmsApi},
};

#[derive(Clone)]
pub struct AppState {
    pub env: Config,
    pub db_client: Arc<DBClient>,
    pub booking_rules: Arc<BookingRuleset>,
    pub sms: Arc<dyn SmsApi>,
    pub otp_store: Arc<OtpStore>,
    // Services
    pub referral_code_service: Arc<ReferralCodeService>,
    pub attribution_service: Arc<AttributionService>,
    pub reward_issuer: Arc<RewardIssuer>,
    pub availability_service: Arc<AvailabilityService>,
}

impl AppState {
    pub fn new(db_client: DBClient, config: Config) -> Self {
        let db_client_arc = Arc::new(db_client);
        let schedule = Arc::new(RewardSchedule::default());
        let booking_rules = Arc::new(default_ruleset());

        let scheduling: Arc<dyn SchedulingApi> = Arc::new(HttpSchedulingClient::new(&config));
        let sms: Arc<dyn SmsApi> = Arc::new(HttpSmsClient::new(&config));

        let audit = Arc::new(AuditService::new(db_client_arc.clone()));
        let referral_code_service = Arc::new(ReferralCodeService::new(
            db_client_arc.clone(),
            schedule.clone(),
        ));

        let attribution_service = Arc::new(AttributionService::new(
            db_client_arc.clone(),
            referral_code_service.clone(),
            audit.clone(),
            scheduling.clone(),
            sms.clone(),
            config.app_url.clone(),
        ));

        let reward_issuer = Arc::new(RewardIssuer::new(
            db_client_arc.clone(),
            scheduling.clone(),
            audit,
            schedule,
        ));

        let mut bookable_services: Vec<String> = booking_rules
            .combinable_groups
            .iter()
            .flatten()
            .map(|s| s.to_string())
            .collect();
        bookable_services.sort_unstable();
        bookable_services.dedup();
        let availability_service =
            Arc::new(AvailabilityService::new(scheduling, bookable_services));

        Self {
            env: config,
            db_client: db_client_arc,
            booking_rules,
            sms,
            otp_store: Arc::new(OtpStore::new()),
            referral_code_service,
            attribution_service,
            reward_issuer,
            availability_service,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::INFO)
        .init();

    dotenv().ok();

    let config = Config::init();

    let pool = match PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => {
            tracing::info!("✅ Connection to the database is successful!");
            pool
        }
        Err(err) => {
            tracing::error!("🔥 Failed to connect to the database: {:?}", err);
            std::process::exit(1);
        }
    };

    let db_client = DBClient::new(pool);

    let allowed_origins = vec![
        "https://glowhaus.example.com".parse::<HeaderValue>().unwrap(),
        "http://localhost:3000".parse::<HeaderValue>().unwrap(),
        "http://localhost:8000".parse::<HeaderValue>().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE]);

    let app_state = Arc::new(AppState::new(db_client, config.clone()));

    let app = create_router(app_state.clone()).layer(cors);

    // In-process fallback for deployments without an external scheduler.
    let app_state_clone = app_state.clone();
    tokio::spawn(async move {
        service::background_jobs::start_reconciliation_job(app_state_clone).await;
    });

    tracing::info!("🚀 Server is running on http://localhost:{}", config.port);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", &config.port))
        .await
        .unwrap();

    axum::serve(listener, app).await.unwrap();
}
