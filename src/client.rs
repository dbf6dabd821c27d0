// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for the account API.
//!
//! Implements the collaborator traits the signup wizard and the login flow
//! talk to. Every endpoint has exactly one success status; anything else is
//! reported as [`ClientError::Rejected`] carrying the server's message.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::config::ClientConfig;
use crate::error::ErrorBody;
use crate::login::LoginApi;
use crate::models::{
    CreateUserRequest, InitiateRequest, LoginRequest, MessageResponse, UserResponse,
    VerifyOtpRequest, VerifyOtpResponse,
};
use crate::onboarding::{AccountRegistrar, CodeVerifier, CompletedAccount};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Could not reach the account service: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("Unexpected response from the account service: {0}")]
    InvalidResponse(String),

    #[error("Invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ClientError {
    /// HTTP status for server rejections.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpAccountClient {
    base_url: Url,
    http: Client,
}

impl HttpAccountClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(config.http_timeout).build()?;
        Ok(Self {
            base_url: config.api_url.clone(),
            http,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `POST /users`; only `201 Created` counts as success.
    pub async fn create_user(
        &self,
        request: &CreateUserRequest,
    ) -> Result<UserResponse, ClientError> {
        let user: UserResponse = self
            .post_json("users", request, StatusCode::CREATED)
            .await?;
        info!(user_id = %user.id, "Account created");
        Ok(user)
    }

    /// `POST /initiate`: ask the service to email a verification code.
    pub async fn initiate(&self, email: &str) -> Result<MessageResponse, ClientError> {
        let request = InitiateRequest {
            email: email.to_string(),
        };
        self.post_json("initiate", &request, StatusCode::OK).await
    }

    /// `POST /login`: check credentials; the service emails a login code.
    pub async fn login(&self, email: &str, password: &str) -> Result<MessageResponse, ClientError> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.post_json("login", &request, StatusCode::OK).await
    }

    /// `POST /verify-otp`.
    pub async fn verify_otp(
        &self,
        email: &str,
        otp: &str,
    ) -> Result<VerifyOtpResponse, ClientError> {
        let request = VerifyOtpRequest {
            email: email.to_string(),
            otp: otp.to_string(),
        };
        let response: VerifyOtpResponse = self
            .post_json("verify-otp", &request, StatusCode::OK)
            .await?;
        if !response.verified {
            return Err(ClientError::Rejected {
                status: StatusCode::OK.as_u16(),
                message: "Invalid or expired code".to_string(),
            });
        }
        Ok(response)
    }

    async fn post_json<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        expected: StatusCode,
    ) -> Result<R, ClientError> {
        let url = self.base_url.join(path)?;
        debug!(url = %url, "POST");

        let response = self.http.post(url).json(body).send().await?;
        let status = response.status();
        if status != expected {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|body| body.error)
                .unwrap_or_else(|_| format!("POST /{path} returned {status}"));
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(format!("POST /{path}: {e}")))
    }
}

#[async_trait]
impl AccountRegistrar for HttpAccountClient {
    async fn create_account(&self, account: &CompletedAccount) -> Result<(), ClientError> {
        match account {
            CompletedAccount::Standard {
                name,
                email,
                phone,
                password,
                ..
            } => {
                let request = CreateUserRequest {
                    name: name.clone(),
                    email: email.clone(),
                    password: password.clone(),
                    phone: phone.clone(),
                };
                self.create_user(&request).await.map(|_| ())
            }
            // Identity accounts live in their contract; there is nothing to register.
            CompletedAccount::Identity { identity, .. } => {
                debug!(contract = %identity.contract_address, "Identity account needs no registration");
                Ok(())
            }
        }
    }
}

#[async_trait]
impl CodeVerifier for HttpAccountClient {
    async fn send_code(&self, email: &str) -> Result<(), ClientError> {
        self.initiate(email).await.map(|_| ())
    }

    async fn verify_code(&self, email: &str, code: &str) -> Result<(), ClientError> {
        self.verify_otp(email, code).await.map(|_| ())
    }
}

#[async_trait]
impl LoginApi for HttpAccountClient {
    async fn request_login_code(&self, email: &str, password: &str) -> Result<(), ClientError> {
        self.login(email, password).await.map(|_| ())
    }

    async fn confirm_login_code(
        &self,
        email: &str,
        otp: &str,
    ) -> Result<VerifyOtpResponse, ClientError> {
        self.verify_otp(email, otp).await
    }
}
