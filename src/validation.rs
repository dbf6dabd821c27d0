// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Field validation rules shared by the signup wizard, the login flow and the
//! account server.

use std::{fmt, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Required number of digits in a national identification number.
pub const NIN_LENGTH: usize = 11;
pub const MIN_NAME_LEN: usize = 2;
pub const MIN_PHONE_DIGITS: usize = 10;
pub const MIN_PASSWORD_LEN: usize = 8;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

/// A validated form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Name,
    Email,
    Phone,
    Password,
    Nin,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::Name,
        Field::Email,
        Field::Phone,
        Field::Password,
        Field::Nin,
    ];

    /// Human readable label used in messages.
    pub fn label(&self) -> &'static str {
        match self {
            Field::Name => "Name",
            Field::Email => "Email",
            Field::Phone => "Phone number",
            Field::Password => "Password",
            Field::Nin => "NIN",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Why a field value was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(Field),

    #[error("Name must be at least 2 characters")]
    NameTooShort,

    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Phone number must be at least 10 digits")]
    InvalidPhone,

    #[error("Password must be at least 8 characters")]
    PasswordTooShort,

    #[error("NIN must be exactly 11 digits")]
    InvalidNin,
}

/// Validate a single field value.
pub fn validate(field: Field, value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Required(field));
    }

    match field {
        Field::Name => {
            if trimmed.chars().count() < MIN_NAME_LEN {
                return Err(ValidationError::NameTooShort);
            }
        }
        Field::Email => {
            if !EMAIL_PATTERN.is_match(trimmed) {
                return Err(ValidationError::InvalidEmail);
            }
        }
        Field::Phone => {
            let digits = strip_phone_formatting(trimmed);
            if digits.len() < MIN_PHONE_DIGITS || !digits.chars().all(|c| c.is_ascii_digit()) {
                return Err(ValidationError::InvalidPhone);
            }
        }
        Field::Password => {
            if value.chars().count() < MIN_PASSWORD_LEN {
                return Err(ValidationError::PasswordTooShort);
            }
        }
        Field::Nin => {
            if value.len() != NIN_LENGTH || !value.chars().all(|c| c.is_ascii_digit()) {
                return Err(ValidationError::InvalidNin);
            }
        }
    }

    Ok(())
}

/// Removes `+`, whitespace, hyphens and parentheses from a phone number.
pub fn strip_phone_formatting(phone: &str) -> String {
    phone
        .chars()
        .filter(|c| !matches!(c, '+' | '-' | '(' | ')') && !c.is_whitespace())
        .collect()
}

/// Filters an edit to the NIN field before it reaches form state.
///
/// Returns the value to store, or `None` when the edit must be dropped and
/// the previous value kept: any non-digit character, or more digits than a
/// NIN can hold.
pub fn filter_nin_input(proposed: &str) -> Option<String> {
    if !proposed.chars().all(|c| c.is_ascii_digit()) || proposed.len() > NIN_LENGTH {
        return None;
    }
    Some(proposed.to_string())
}
