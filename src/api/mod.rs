// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Development account server routes.

use axum::{
    extract::FromRequest,
    http::HeaderName,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    error::ApiError,
    models::{
        CreateUserRequest, InitiateRequest, LoginRequest, MessageResponse, UserResponse,
        VerifyOtpRequest, VerifyOtpResponse,
    },
    state::AppState,
};

pub mod auth;
pub mod health;
pub mod users;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// JSON request body whose rejections are reported as [`ApiError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

pub fn router(state: AppState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    let routes = Router::new()
        .route("/users", post(users::create_user))
        .route("/initiate", post(auth::initiate))
        .route("/login", post(auth::login))
        .route("/verify-otp", post(auth::verify_otp))
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .with_state(state);

    routes
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        users::create_user,
        auth::initiate,
        auth::login,
        auth::verify_otp,
        health::health,
        health::liveness
    ),
    components(
        schemas(
            CreateUserRequest,
            UserResponse,
            InitiateRequest,
            LoginRequest,
            VerifyOtpRequest,
            VerifyOtpResponse,
            MessageResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Accounts", description = "Account registration"),
        (name = "Codes", description = "One-time code issue and verification"),
        (name = "Health", description = "Service health checks")
    )
)]
struct ApiDoc;
