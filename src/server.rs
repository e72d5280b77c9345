// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Serving lifecycle.
//!
//! ## Shutdown order
//!
//! 1. A shutdown signal starts a graceful shutdown of the listener; requests
//!    already in flight keep authenticating normally for up to the grace
//!    period
//! 2. Once the server has stopped, the application shutdown token is
//!    cancelled
//! 3. The touch worker drains queued timestamp updates and exits

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum_server::{tls_rustls::RustlsConfig, Handle};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// In-flight requests get this long to finish after a shutdown signal.
pub const GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Start a graceful shutdown of `handle` once `signal` completes.
pub fn shutdown_on<F>(handle: Handle<SocketAddr>, signal: F, grace: Duration) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        signal.await;
        info!("Shutdown signal received");
        handle.graceful_shutdown(Some(grace));
    })
}

/// Serve `app` on `addr` until `handle` is shut down.
pub async fn serve(
    app: Router,
    addr: SocketAddr,
    tls: Option<RustlsConfig>,
    handle: Handle<SocketAddr>,
) -> io::Result<()> {
    match tls {
        Some(tls_config) => {
            info!("Reminder auth listening on https://{addr} (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
        }
        None => {
            info!("Reminder auth listening on http://{addr} (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await
        }
    }
}

/// Stop background work after the server has stopped.
pub async fn drain(shutdown: CancellationToken, touch_worker: JoinHandle<()>) {
    shutdown.cancel();
    if let Err(e) = touch_worker.await {
        error!(error = %e, "Touch worker panicked");
    }
}
