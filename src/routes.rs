// routes.rs
use std::sync::Arc;

use axum::{middleware, routing::get, routing::post, Extension, Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    handler::{
        auth::auth_handler,
        booking::booking_handler,
        referral::{claim, member_referral_handler, referral_handler},
    },
    middleware::auth,
    AppState,
};

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Server is running"
    }))
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Claim needs an authenticated referee; the rest of the funnel is public
    // (reconcile guards itself with the cron shared secret).
    let referral_routes = referral_handler().merge(
        Router::new()
            .route("/claim", post(claim))
            .layer(middleware::from_fn(auth)),
    );

    let api_route = Router::new()
        .nest("/auth", auth_handler())
        .nest("/referral", referral_routes)
        .nest(
            "/member/referral",
            member_referral_handler().layer(middleware::from_fn(auth)),
        )
        .nest("/booking", booking_handler())
        .layer(TraceLayer::new_for_http())
        .layer(Extension(app_state));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_route)
}
