// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use welli_onboarding::{
    api::router,
    config::{LogFormat, ServerConfig, DEFAULT_LOG_FILTER},
    state::AppState,
};

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() {
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Invalid configuration: {err}");
            std::process::exit(1);
        }
    };
    init_tracing(config.log_format);

    let app = router(AppState::default());
    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .expect("Failed to bind listen address");

    info!(address = %addr, "Account server listening (docs at /docs)");
    info!("Verification codes are logged, not emailed");

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Shutdown requested");
                    shutdown.cancel();
                }
                Err(err) => error!(error = %err, "Failed to listen for shutdown signal"),
            }
        }
    });

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
    {
        error!(error = %err, "Account server failed");
        std::process::exit(1);
    }
}
