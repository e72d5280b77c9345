// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{env, process, sync::Arc};

use axum_server::{tls_rustls::RustlsConfig, Handle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use reminder_auth::{
    api::router,
    auth::HttpKeySetSource,
    config::{AppConfig, LogFormat, LOG_FORMAT_ENV},
    server::{self, GRACE_PERIOD},
    state::AppState,
};

const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

fn init_tracing() {
    let format = env::var(LOG_FORMAT_ENV)
        .ok()
        .and_then(|v| v.parse::<LogFormat>().ok())
        .unwrap_or_default();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() {
    // Install the ring crypto provider for rustls (must be done before any TLS operations)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    init_tracing();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            process::exit(1);
        }
    };

    let key_source = match HttpKeySetSource::new() {
        Ok(source) => Arc::new(source),
        Err(e) => {
            error!(error = %e, "Failed to build JWKS client");
            process::exit(1);
        }
    };

    let shutdown = CancellationToken::new();
    let (state, touch_worker) = match AppState::new(&config, key_source, shutdown.clone()) {
        Ok(wired) => wired,
        Err(e) => {
            error!(error = %e, "Failed to initialize application state");
            process::exit(1);
        }
    };
    let app = router(state);

    let tls = match &config.tls {
        Some(tls) => match RustlsConfig::from_pem_file(&tls.cert, &tls.key).await {
            Ok(tls_config) => Some(tls_config),
            Err(e) => {
                error!(error = %e, cert = %tls.cert.display(), "Failed to load TLS credentials");
                process::exit(1);
            }
        },
        None => None,
    };

    let handle = Handle::new();
    server::shutdown_on(handle.clone(), shutdown_signal(), GRACE_PERIOD);

    if let Err(e) = server::serve(app, config.bind_addr, tls, handle).await {
        error!(error = %e, "Server failed");
    }

    // Let queued last-used / last-login stamps land before exiting
    server::drain(shutdown, touch_worker).await;
    info!("Shutdown complete");
}
