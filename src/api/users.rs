// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account registration endpoint.

use axum::{extract::State, http::StatusCode, Json};
use tracing::info;

use crate::{
    api::ApiJson,
    error::ApiError,
    models::{CreateUserRequest, UserResponse},
    state::AppState,
};

/// Register a new account.
///
/// Field rules match the signup wizard; the first failing field is reported.
#[utoipa::path(
    post,
    path = "/users",
    tag = "Accounts",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Account created", body = UserResponse),
        (status = 409, description = "Email already registered"),
        (status = 422, description = "A field failed validation"),
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let user = state.store.write().await.create_user(request)?;
    info!(user_id = %user.id, "Account registered");
    Ok((StatusCode::CREATED, Json(user)))
}
