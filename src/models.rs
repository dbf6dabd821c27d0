// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! This module defines the request and response data structures exchanged
//! with the account API. The same types are serialized by the HTTP client
//! and deserialized by the development server, so both sides agree on the
//! wire format. All types derive `Serialize`, `Deserialize`, and `ToSchema`.
//!
//! ## Model Categories
//!
//! - **Accounts**: `POST /users`
//! - **Codes**: `POST /initiate`, `POST /login`, `POST /verify-otp`
//! - **Wallets**: the [`WalletAddress`] newtype used by the wallet login path

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// =============================================================================
// Wallet Address Type
// =============================================================================

/// Ethereum-compatible wallet address wrapper.
///
/// Format: `0x` followed by 40 hexadecimal characters (20 bytes).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WalletAddress(pub String);

impl WalletAddress {
    /// Build an address from 20 raw bytes.
    pub fn from_bytes(bytes: &[u8; 20]) -> Self {
        WalletAddress(format!("0x{}", hex::encode(bytes)))
    }

    /// Whether the address has the `0x` + 40 hex digit shape.
    pub fn is_well_formed(&self) -> bool {
        self.0
            .strip_prefix("0x")
            .map(|rest| rest.len() == 40 && rest.chars().all(|c| c.is_ascii_hexdigit()))
            .unwrap_or(false)
    }
}

impl std::fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WalletAddress {
    fn from(value: &str) -> Self {
        WalletAddress(value.to_string())
    }
}

// =============================================================================
// Account Models
// =============================================================================

/// Request body for `POST /users`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: String,
}

/// A registered account as returned by the API. Never carries the password.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// One-Time Code Models
// =============================================================================

/// Request body for `POST /initiate`: send a verification code to `email`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InitiateRequest {
    pub email: String,
}

/// Request body for `POST /login`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for `POST /verify-otp`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

/// Response of `POST /verify-otp`.
///
/// `token` and `user` are only present when the email belongs to a
/// registered account, i.e. when the code completes a login.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct VerifyOtpResponse {
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserResponse>,
}

/// Generic acknowledgement body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
