// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values and the
//! typed configuration used by the onboarding client and the development
//! account server. Configuration is loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `WELLI_API_URL` | Base URL of the account API | `http://localhost:8080` |
//! | `WELLI_DATA_DIR` | Directory holding `onboarding.json` | `./data` |
//! | `WELLI_HTTP_TIMEOUT_SECS` | Request timeout for the account client | `15` |
//! | `WELLI_DEPLOY_STAGE_MS` | Duration of each simulated deployment stage | `1500` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::{env, path::PathBuf, time::Duration};

use url::Url;

/// Environment variable name for the account API base URL.
pub const API_URL_ENV: &str = "WELLI_API_URL";

/// Environment variable name for the onboarding status directory.
pub const DATA_DIR_ENV: &str = "WELLI_DATA_DIR";

/// Environment variable name for the HTTP client timeout in seconds.
pub const HTTP_TIMEOUT_ENV: &str = "WELLI_HTTP_TIMEOUT_SECS";

/// Environment variable name for the simulated deployment stage length.
pub const DEPLOY_STAGE_ENV: &str = "WELLI_DEPLOY_STAGE_MS";

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_API_URL: &str = "http://localhost:8080";
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_DEPLOY_STAGE: Duration = Duration::from_millis(1500);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} is not a valid URL: {reason}")]
    InvalidUrl { name: &'static str, reason: String },

    #[error("{name} must be a number, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },
}

/// Configuration of the onboarding client side.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL that `/users`, `/login`, `/initiate` and `/verify-otp` hang off.
    pub api_url: Url,
    pub data_dir: PathBuf,
    pub http_timeout: Duration,
    pub deploy_stage: Duration,
}

impl ClientConfig {
    /// Configuration for `api_url` with every other setting at its default.
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            deploy_stage: DEFAULT_DEPLOY_STAGE,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = parse_api_url(&env_or_default(API_URL_ENV, DEFAULT_API_URL))?;
        let data_dir = PathBuf::from(env_or_default(DATA_DIR_ENV, DEFAULT_DATA_DIR));
        let http_timeout = Duration::from_secs(env_number(
            HTTP_TIMEOUT_ENV,
            DEFAULT_HTTP_TIMEOUT.as_secs(),
        )?);
        let deploy_stage = Duration::from_millis(env_number(
            DEPLOY_STAGE_ENV,
            DEFAULT_DEPLOY_STAGE.as_millis() as u64,
        )?);

        Ok(Self {
            api_url,
            data_dir,
            http_timeout,
            deploy_stage,
        })
    }
}

/// Log output format for the server binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Configuration of the development account server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_format: LogFormat,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env_or_default(HOST_ENV, DEFAULT_HOST);
        let port = env_number(PORT_ENV, DEFAULT_PORT as u64)?;
        let port = u16::try_from(port).map_err(|_| ConfigError::InvalidNumber {
            name: PORT_ENV,
            value: port.to_string(),
        })?;
        let log_format = match env::var(LOG_FORMAT_ENV).as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            host,
            port,
            log_format,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse the API base URL, keeping a trailing slash so endpoint joins
/// append to the path instead of replacing its last segment.
pub fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let mut normalized = raw.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    let url = Url::parse(&normalized).map_err(|e| ConfigError::InvalidUrl {
        name: API_URL_ENV,
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidUrl {
            name: API_URL_ENV,
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

fn env_or_default(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_number(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidNumber { name, value })
        }
        _ => Ok(default),
    }
}
