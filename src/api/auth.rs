// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! One-time code endpoints.
//!
//! The development server has no mail transport: issued codes are written to
//! the log instead of being emailed.

use axum::{extract::State, Json};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::{
    api::ApiJson,
    error::ApiError,
    models::{InitiateRequest, LoginRequest, MessageResponse, VerifyOtpRequest, VerifyOtpResponse},
    state::AppState,
    validation::{validate, Field},
};

/// Send a verification code to an email address (signup step three).
#[utoipa::path(
    post,
    path = "/initiate",
    tag = "Codes",
    request_body = InitiateRequest,
    responses(
        (status = 200, description = "Code issued", body = MessageResponse),
        (status = 422, description = "Invalid email"),
    )
)]
pub async fn initiate(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<InitiateRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    validate(Field::Email, &request.email)?;
    let code = state
        .store
        .write()
        .await
        .issue_code(&request.email, Utc::now());
    info!(email = %request.email, code = %code, "Verification code issued");
    Ok(Json(MessageResponse::new("Verification code sent")))
}

/// Check credentials and send a login code.
#[utoipa::path(
    post,
    path = "/login",
    tag = "Codes",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Credentials accepted, code issued", body = MessageResponse),
        (status = 401, description = "Invalid email or password"),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let mut store = state.store.write().await;
    let user_id = store.authenticate(&request.email, &request.password)?.id.clone();
    let code = store.issue_code(&request.email, Utc::now());
    info!(user_id = %user_id, code = %code, "Login code issued");
    Ok(Json(MessageResponse::new("Login code sent")))
}

/// Verify a code. For registered emails this completes a login.
#[utoipa::path(
    post,
    path = "/verify-otp",
    tag = "Codes",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Code accepted", body = VerifyOtpResponse),
        (status = 401, description = "Invalid or expired code"),
    )
)]
pub async fn verify_otp(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<VerifyOtpRequest>,
) -> Result<Json<VerifyOtpResponse>, ApiError> {
    let user = state
        .store
        .write()
        .await
        .verify_code(&request.email, &request.otp, Utc::now())?;

    let token = user.as_ref().map(|_| Uuid::new_v4().to_string());
    if let Some(user) = &user {
        info!(user_id = %user.id, "Session established");
    }

    Ok(Json(VerifyOtpResponse {
        verified: true,
        token,
        user,
    }))
}
