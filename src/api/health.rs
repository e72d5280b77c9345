// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::state::AppState;

/// Health check response with individual component status.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    /// Individual health checks and their results.
    pub checks: HealthChecks,
}

/// Individual health check results.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthChecks {
    /// Whether the service process is running.
    pub service: String,
    /// Storage root writable ("ok" or "unavailable").
    pub storage: String,
    /// Signing keys of the trust domain cached or fetchable.
    pub jwks: String,
}

/// Simple health check response for liveness probes.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

fn status_str(ok: bool) -> String {
    let status = if ok { "ok" } else { "unavailable" };
    status.to_string()
}

/// Write-read-delete probe of the storage root.
async fn check_storage(state: &AppState) -> bool {
    let storage = state.storage.clone();
    match tokio::task::spawn_blocking(move || storage.health_check()).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(error = %e, "Storage health check failed");
            false
        }
        Err(e) => {
            warn!(error = %e, "Storage health check task failed");
            false
        }
    }
}

/// Keys are cached, or can be fetched now.
async fn check_jwks(state: &AppState) -> bool {
    let domain = &state.authenticator.trust().domain;
    let cache = state.authenticator.verifier().cache();
    if let Some(fetched_at) = cache.fetched_at(domain).await {
        debug!(domain = %domain, %fetched_at, "JWKS cached");
        return true;
    }
    match cache.refresh(domain).await {
        Ok(_) => true,
        Err(e) => {
            warn!(domain = %domain, error = %e, "JWKS health check failed");
            false
        }
    }
}

/// Health check endpoint handler.
///
/// Returns 200 if all checks pass, 503 if any check fails.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = ReadyResponse),
        (status = 503, description = "Service is unhealthy", body = ReadyResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let storage_ok = check_storage(&state).await;
    let jwks_ok = check_jwks(&state).await;
    let all_ok = storage_ok && jwks_ok;

    let response = ReadyResponse {
        status: if all_ok { "ok" } else { "degraded" }.to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            storage: status_str(storage_ok),
            jwks: status_str(jwks_ok),
        },
    };

    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

/// Liveness probe handler.
///
/// Always returns 200 if the process is running.
/// Does not check dependencies - use readiness for that.
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness probe handler.
///
/// Returns 200 only if all dependencies are available.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready", body = ReadyResponse),
        (status = 503, description = "Service is not ready", body = ReadyResponse)
    )
)]
pub async fn readiness(state: State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    health(state).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_support::{test_jwks, TestServices};

    #[tokio::test]
    async fn liveness_is_always_ok() {
        let Json(body) = liveness().await;
        assert_eq!(body.status, "ok");
    }

    #[tokio::test]
    async fn ready_when_storage_and_keys_available() {
        let services = TestServices::new().await;
        let (status, Json(body)) = health(State(services.app_state())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ok");
        assert_eq!(body.checks.storage, "ok");
        assert_eq!(body.checks.jwks, "ok");
    }

    #[tokio::test]
    async fn cached_keys_are_not_refetched() {
        let services = TestServices::new().await;
        health(State(services.app_state())).await;
        let (status, _) = health(State(services.app_state())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(services.key_source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn degraded_when_keys_unreachable() {
        let services = TestServices::with_unavailable_keys().await;
        let (status, Json(body)) = readiness(State(services.app_state())).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.status, "degraded");
        assert_eq!(body.checks.storage, "ok");
        assert_eq!(body.checks.jwks, "unavailable");

        // Recovers once the issuer publishes again
        services.key_source.replace(test_jwks()).await;
        let (status, _) = readiness(State(services.app_state())).await;
        assert_eq!(status, StatusCode::OK);
    }
}
