// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory account store for the development server.
//!
//! Holds registered accounts and outstanding one-time codes. Nothing
//! survives a restart. Passwords are kept as salted HMAC-SHA256 digests.

use std::collections::HashMap;

use base64ct::{Base64, Encoding};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::{Rng, RngCore};
use sha2::Sha256;
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{CreateUserRequest, UserResponse};
use crate::validation::{validate, Field};

type HmacSha256 = Hmac<Sha256>;

/// How long an issued code stays valid.
pub const CODE_TTL_MINUTES: i64 = 10;

/// Failed attempts after which a code is discarded.
pub const MAX_CODE_ATTEMPTS: u32 = 5;

const SALT_LEN: usize = 16;

#[derive(Debug, Clone)]
pub struct StoredUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    password_salt: String,
    password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl StoredUser {
    fn password_matches(&self, password: &str) -> bool {
        let (Ok(salt), Ok(hash)) = (
            Base64::decode_vec(&self.password_salt),
            Base64::decode_vec(&self.password_hash),
        ) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(&salt) else {
            return false;
        };
        mac.update(password.as_bytes());
        mac.verify_slice(&hash).is_ok()
    }
}

impl From<&StoredUser> for UserResponse {
    fn from(user: &StoredUser) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone)]
struct PendingCode {
    code: String,
    expires_at: DateTime<Utc>,
    failed_attempts: u32,
}

#[derive(Default)]
pub struct InMemoryStore {
    users: HashMap<String, StoredUser>,
    codes: HashMap<String, PendingCode>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn pending_code_count(&self) -> usize {
        self.codes.len()
    }

    pub fn user_by_email(&self, email: &str) -> Option<&StoredUser> {
        self.users.get(&normalize_email(email))
    }

    pub fn create_user(&mut self, request: CreateUserRequest) -> Result<UserResponse, ApiError> {
        validate(Field::Name, &request.name)?;
        validate(Field::Email, &request.email)?;
        validate(Field::Phone, &request.phone)?;
        validate(Field::Password, &request.password)?;

        let email = normalize_email(&request.email);
        if self.users.contains_key(&email) {
            return Err(ApiError::conflict("An account with this email already exists"));
        }

        let mut salt = [0u8; SALT_LEN];
        rand::rng().fill_bytes(&mut salt);
        let mut mac = HmacSha256::new_from_slice(&salt)
            .map_err(|e| ApiError::internal(format!("Failed to hash password: {e}")))?;
        mac.update(request.password.as_bytes());

        let user = StoredUser {
            id: Uuid::new_v4().to_string(),
            name: request.name.trim().to_string(),
            email: email.clone(),
            phone: request.phone.trim().to_string(),
            password_salt: Base64::encode_string(&salt),
            password_hash: Base64::encode_string(&mac.finalize().into_bytes()),
            created_at: Utc::now(),
        };
        let response = UserResponse::from(&user);
        self.users.insert(email, user);
        Ok(response)
    }

    /// Check login credentials without revealing which half was wrong.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<&StoredUser, ApiError> {
        self.user_by_email(email)
            .filter(|user| user.password_matches(password))
            .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))
    }

    /// Issue a fresh 6-digit code for `email`, replacing any outstanding one.
    pub fn issue_code(&mut self, email: &str, now: DateTime<Utc>) -> String {
        let code = format!("{:06}", rand::rng().random_range(0..1_000_000u32));
        self.codes.insert(
            normalize_email(email),
            PendingCode {
                code: code.clone(),
                expires_at: now + Duration::minutes(CODE_TTL_MINUTES),
                failed_attempts: 0,
            },
        );
        code
    }

    /// Outstanding code for `email`, if any.
    pub fn pending_code(&self, email: &str) -> Option<String> {
        self.codes
            .get(&normalize_email(email))
            .map(|pending| pending.code.clone())
    }

    /// Consume the code for `email`.
    ///
    /// Returns the account when the email is registered, so a login can be
    /// completed; signup verification of a new email returns `None`.
    pub fn verify_code(
        &mut self,
        email: &str,
        otp: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserResponse>, ApiError> {
        let key = normalize_email(email);
        let invalid = || ApiError::unauthorized("Invalid or expired code");

        let pending = self.codes.get_mut(&key).ok_or_else(invalid)?;
        if pending.expires_at <= now {
            self.codes.remove(&key);
            return Err(invalid());
        }
        if pending.code != otp.trim() {
            pending.failed_attempts += 1;
            if pending.failed_attempts >= MAX_CODE_ATTEMPTS {
                self.codes.remove(&key);
            }
            return Err(invalid());
        }

        self.codes.remove(&key);
        Ok(self.users.get(&key).map(UserResponse::from))
    }
}

/// Canonical form used as the account key.
pub fn normalize_email(email: &str) -> String {
    email.trim().nfkc().collect::<String>().to_lowercase()
}
