// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Signup Onboarding
//!
//! The signup wizard collects account details through one of two mutually
//! exclusive paths and hands the completed account to a registrar exactly
//! once.
//!
//! - [`wizard`] - the state machine: events in, actions out, no I/O
//! - [`flow`] - async driver running wizard actions against collaborators
//! - [`form`] - form values and per-field validation state
//!
//! ## Collaborators
//!
//! | Trait | Used for |
//! |-------|----------|
//! | [`AccountRegistrar`] | creating the account at the end of either path |
//! | [`CodeVerifier`] | sending and checking the email verification code |
//! | [`CompletionHandler`] | notifying the embedding application |
//! | [`crate::contract::ContractDeployer`] | identity path deployment stages |
//! | [`crate::session::StatusStore`] | persisting the onboarded flag |

use async_trait::async_trait;

use crate::client::ClientError;
use crate::contract::DeployedIdentity;

pub mod flow;
pub mod form;
pub mod wizard;

pub use flow::SignupFlow;
pub use form::{SignupForm, ValidationState};
pub use wizard::{
    CollaboratorResult, SignupPath, SignupWizard, WizardAction, WizardEvent, WizardStep,
};

/// An account produced by a finished signup path.
#[derive(Clone, PartialEq, Eq)]
pub enum CompletedAccount {
    /// Email and password signup, with a verified email and national ID.
    Standard {
        name: String,
        email: String,
        phone: String,
        password: String,
        nin: String,
    },
    /// Self-sovereign signup bound to a deployed identity contract.
    Identity {
        name: String,
        nin: String,
        identity: DeployedIdentity,
    },
}

impl CompletedAccount {
    pub fn name(&self) -> &str {
        match self {
            CompletedAccount::Standard { name, .. } | CompletedAccount::Identity { name, .. } => {
                name
            }
        }
    }
}

impl std::fmt::Debug for CompletedAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompletedAccount::Standard {
                name, email, phone, ..
            } => f
                .debug_struct("Standard")
                .field("name", name)
                .field("email", email)
                .field("phone", phone)
                .finish_non_exhaustive(),
            CompletedAccount::Identity {
                name, identity, ..
            } => f
                .debug_struct("Identity")
                .field("name", name)
                .field("identity", identity)
                .finish_non_exhaustive(),
        }
    }
}

/// Creates the account once a signup path reaches its terminal step.
#[async_trait]
pub trait AccountRegistrar: Send + Sync {
    async fn create_account(&self, account: &CompletedAccount) -> Result<(), ClientError>;
}

/// Delivers and checks the one-time code used at the verification step.
#[async_trait]
pub trait CodeVerifier: Send + Sync {
    async fn send_code(&self, email: &str) -> Result<(), ClientError>;

    async fn verify_code(&self, email: &str, code: &str) -> Result<(), ClientError>;
}

/// Receives the completed account. Called at most once per wizard session.
pub trait CompletionHandler: Send + Sync {
    fn on_complete(&self, account: &CompletedAccount);
}

impl<F> CompletionHandler for F
where
    F: Fn(&CompletedAccount) + Send + Sync,
{
    fn on_complete(&self, account: &CompletedAccount) {
        self(account)
    }
}
