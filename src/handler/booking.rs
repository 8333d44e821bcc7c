use std::sync::Arc;

use axum::{
    extract::Path,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use validator::Validate;

use crate::{dtos::bookingdtos::*, error::HttpError, AppState};

pub fn booking_handler() -> Router {
    Router::new()
        .route("/can-combine", post(can_combine))
        .route("/cart/check", post(check_cart))
        .route("/addons", post(compatible_addons))
        .route("/availability/:location_key", get(availability_summary))
}

pub async fn can_combine(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<CanCombineDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    Ok(Json(app_state.booking_rules.can_combine(&body.a, &body.b)))
}

pub async fn check_cart(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<CartCheckDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    Ok(Json(
        app_state
            .booking_rules
            .can_add_to_cart(&body.existing, &body.candidate),
    ))
}

pub async fn compatible_addons(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<AddonSuggestionDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let addons = app_state.booking_rules.compatible_addons(
        &body.primary,
        &body.provider_offered,
        &body.already_selected,
    );

    Ok(Json(AddonSuggestionResponseDto {
        status: "success".to_string(),
        addons,
    }))
}

pub async fn availability_summary(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(location_key): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let summary = app_state.availability_service.summary(&location_key).await;

    Ok(Json(summary))
}
