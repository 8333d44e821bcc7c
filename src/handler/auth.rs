use std::sync::Arc;

use axum::{
    http::{header, HeaderMap},
    response::IntoResponse,
    routing::post,
    Extension, Json, Router,
};
use axum_extra::extract::cookie::Cookie;
use validator::Validate;

use crate::{
    db::memberdb::MemberExt,
    dtos::authdtos::*,
    error::HttpError,
    utils::{phone, token},
    AppState,
};

/// Phone sign-in: request a one-time code, then trade it for a session token.
pub fn auth_handler() -> Router {
    Router::new()
        .route("/otp/request", post(request_otp))
        .route("/otp/verify", post(verify_otp))
}

pub async fn request_otp(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<RequestOtpDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let phone_last10 = phone::last_ten_digits(&body.phone);

    let member = app_state
        .db_client
        .get_member_by_phone(&phone_last10)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    if member.is_none() {
        return Err(HttpError::not_found(
            "No member found for that phone number".to_string(),
        ));
    }

    let code = app_state.otp_store.issue(&phone_last10).await;

    // Delivery failure is not fatal; the caller can retry from the response.
    let sms_sent = match app_state
        .sms
        .send_sms(&body.phone, &format!("Your Glowhaus sign-in code is {}", code))
        .await
    {
        Ok(accepted) => accepted,
        Err(err) => {
            tracing::warn!("sign-in code delivery failed for {}: {}", phone_last10, err);
            false
        }
    };

    Ok(Json(OtpRequestResponseDto {
        status: "success".to_string(),
        sms_sent,
    }))
}

pub async fn verify_otp(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<VerifyOtpDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let phone_last10 = phone::last_ten_digits(&body.phone);

    if !app_state.otp_store.verify(&phone_last10, &body.code).await {
        return Err(HttpError::unauthorized(
            "Verification code is invalid or expired".to_string(),
        ));
    }

    let member = app_state
        .db_client
        .get_member_by_phone(&phone_last10)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?
        .ok_or(HttpError::not_found(
            "No member found for that phone number".to_string(),
        ))?;

    let token = token::create_token(
        &member.id.to_string(),
        app_state.env.jwt_secret.as_bytes(),
        app_state.env.jwt_maxage * 60,
    )
    .map_err(|e| HttpError::server_error(e.to_string()))?;

    let cookie = Cookie::build(("token", token.clone()))
        .path("/")
        .http_only(true)
        .build();

    let mut headers = HeaderMap::new();
    headers.append(
        header::SET_COOKIE,
        cookie
            .to_string()
            .parse()
            .map_err(|_| HttpError::server_error("Failed to build session cookie".to_string()))?,
    );

    let response = Json(SessionResponseDto {
        status: "success".to_string(),
        token,
    });

    let mut response = response.into_response();
    response.headers_mut().extend(headers);

    Ok(response)
}
