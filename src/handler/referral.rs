use std::sync::Arc;

use axum::{
    extract::Path,
    http::header::AUTHORIZATION,
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use subtle::ConstantTimeEq;
use validator::Validate;

use crate::{
    db::referraldb::ReferralExt,
    dtos::referraldtos::*,
    error::{ErrorMessage, HttpError},
    middleware::JWTAuthMiddleware,
    models::referralmodel::ReferralStats,
    service::referral_code_service::generate_referral_link,
    AppState,
};

/// Public referral funnel endpoints.
pub fn referral_handler() -> Router {
    Router::new()
        .route("/click", post(record_click))
        .route("/attribute", post(attribute))
        .route("/resolve/:identifier", get(resolve_code))
        .route("/reconcile", post(reconcile))
}

/// Authenticated member-facing referral endpoints (auth layered in routes.rs).
pub fn member_referral_handler() -> Router {
    Router::new()
        .route("/code", get(get_codes))
        .route("/code/custom", post(add_custom_code))
        .route("/invite", post(invite))
        .route("/stats", get(get_stats))
}

pub async fn record_click(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<ClickReferralDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let referral = app_state
        .attribution_service
        .record_click(&body.code, &body.device_id, body.channel.clone())
        .await?;

    Ok(Json(ClaimResponseDto {
        status: "success".to_string(),
        referral_id: referral.id,
        referral_status: referral.status,
    }))
}

pub async fn claim(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddleware>,
    Json(body): Json<ClaimReferralDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let referral = app_state
        .attribution_service
        .claim(&auth.member, &body.code, body.device_id.as_deref())
        .await?;

    Ok(Json(ClaimResponseDto {
        status: "success".to_string(),
        referral_id: referral.id,
        referral_status: referral.status,
    }))
}

pub async fn attribute(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<AttributeReferralDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let outcome = app_state.attribution_service.attribute(&body).await?;

    Ok(Json(AttributionResponseDto {
        status: "success".to_string(),
        referral_id: outcome.referral.id,
        referral_status: outcome.referral.status,
        matched_by: outcome.matched_by.to_string(),
        fraud_flags: outcome.verdict.flags,
    }))
}

pub async fn resolve_code(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(identifier): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let code = app_state
        .referral_code_service
        .resolve(&identifier)
        .await?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::ReferralCodeNotFound.to_string()))?;

    Ok(Json(ResolveCodeResponseDto {
        status: "success".to_string(),
        code: code.custom_code.unwrap_or(code.code),
        tier: code.tier,
        referee_reward_cents: app_state.referral_code_service.schedule().referee_reward_cents,
    }))
}

/// Scheduled reconciliation entry point. Partial failures surface only as a
/// non-empty error list in the summary, never as an HTTP error status.
pub async fn reconcile(
    Extension(app_state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HttpError> {
    let provided = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .unwrap_or("");

    let expected = app_state.env.cron_secret.as_bytes();
    if provided.as_bytes().ct_eq(expected).unwrap_u8() != 1 {
        return Err(HttpError::unauthorized(
            ErrorMessage::PermissionDenied.to_string(),
        ));
    }

    let summary = app_state.reward_issuer.run().await;

    Ok(Json(summary))
}

pub async fn get_codes(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    // First read creates the primary code lazily.
    app_state
        .referral_code_service
        .get_or_create_primary(auth.member.id)
        .await?;

    let codes = app_state
        .db_client
        .get_codes_by_member(auth.member.id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    let codes = codes
        .into_iter()
        .map(|code| {
            let display = code.custom_code.clone().unwrap_or_else(|| code.code.clone());
            ReferralCodeData {
                id: code.id,
                share_link: generate_referral_link(&app_state.env.app_url, &display),
                code: code.code,
                custom_code: code.custom_code,
                tier: code.tier,
                is_primary: code.is_primary,
            }
        })
        .collect();

    Ok(Json(ReferralCodeResponseDto {
        status: "success".to_string(),
        codes,
    }))
}

pub async fn add_custom_code(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddleware>,
    Json(body): Json<AddCustomCodeDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let code = app_state
        .referral_code_service
        .add_custom_code(auth.member.id, &body.code)
        .await?;

    let display = code.custom_code.clone().unwrap_or_else(|| code.code.clone());
    Ok(Json(ReferralCodeResponseDto {
        status: "success".to_string(),
        codes: vec![ReferralCodeData {
            id: code.id,
            share_link: generate_referral_link(&app_state.env.app_url, &display),
            code: code.code,
            custom_code: code.custom_code,
            tier: code.tier,
            is_primary: code.is_primary,
        }],
    }))
}

pub async fn invite(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddleware>,
    Json(body): Json<InviteReferralDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;
    body.validate_phone_number()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let outcome = app_state
        .attribution_service
        .invite(&auth.member, &body.first_name, &body.phone, body.send_sms)
        .await?;

    Ok(Json(InviteResponseDto {
        status: "success".to_string(),
        referral_id: outcome.referral.id,
        sms_sent: outcome.sms_sent,
        share_link: outcome.share_link,
    }))
}

pub async fn get_stats(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let codes = app_state
        .db_client
        .get_codes_by_member(auth.member.id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    let tier = codes
        .iter()
        .find(|code| code.is_primary)
        .map(|code| code.tier)
        .unwrap_or(crate::models::referralmodel::ReferralTier::Member);

    let stats = ReferralStats {
        total_shares: codes.iter().map(|c| c.total_shares as i64).sum(),
        total_clicks: codes.iter().map(|c| c.total_clicks as i64).sum(),
        total_signups: codes.iter().map(|c| c.total_signups as i64).sum(),
        total_completed: codes.iter().map(|c| c.total_completed as i64).sum(),
        total_earned_cents: codes.iter().map(|c| c.total_earned_cents).sum(),
        tier,
    };

    Ok(Json(stats))
}
