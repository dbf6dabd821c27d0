// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! WelliRecord Onboarding - account creation and sign-in
//!
//! This crate holds the signup wizard and the login flow as plain state
//! machines, plus the collaborators they talk to and a development account
//! server speaking the same HTTP contract as the production service.
//!
//! ## Modules
//!
//! - `onboarding` - Signup wizard, form state and async driver
//! - `login` - Credential and wallet login paths
//! - `validation` - Field rules shared by the wizard and the server
//! - `contract` - Identity contract deployment stages
//! - `wallet` - Wallet connection provider
//! - `session` - Persisted onboarding status
//! - `client` - HTTP client for the account endpoints
//! - `api`, `store`, `state` - Development account server (Axum)

pub mod api;
pub mod client;
pub mod config;
pub mod contract;
pub mod error;
pub mod login;
pub mod models;
pub mod onboarding;
pub mod session;
pub mod state;
pub mod store;
pub mod validation;
pub mod wallet;
