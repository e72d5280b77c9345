// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Caller identity endpoint, reachable with either credential scheme.

use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{AuthError, Caller, CallerContext, Scheme};

/// Permission needed to call `whoami` with an API key.
pub const WHOAMI_PERMISSION: &str = "read";

/// Response for GET /v1/auth/whoami
#[derive(Debug, Serialize, ToSchema)]
pub struct WhoAmIResponse {
    pub user_id: Uuid,
    pub external_id: String,
    pub email: String,
    pub name: String,
    /// Scheme that authenticated this request.
    pub scheme: Scheme,
    /// Token scope (bearer tokens only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Key used (API keys only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_id: Option<Uuid>,
    /// Permissions of the key (API keys only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
}

impl From<CallerContext> for WhoAmIResponse {
    fn from(ctx: CallerContext) -> Self {
        let (api_key_id, permissions) = match ctx.api_key {
            Some(key) => (Some(key.id), Some(key.permissions)),
            None => (None, None),
        };
        Self {
            user_id: ctx.user.id,
            external_id: ctx.user.external_id,
            email: ctx.user.email,
            name: ctx.user.name,
            scheme: ctx.scheme,
            scope: ctx.scope,
            api_key_id,
            permissions,
        }
    }
}

/// Describe the authenticated caller.
///
/// Accepts a bearer token or an API key; a token is tried first.
#[utoipa::path(
    get,
    path = "/v1/auth/whoami",
    tag = "Auth",
    security(("bearer" = []), ("api_key" = [])),
    responses(
        (status = 200, description = "Resolved caller", body = WhoAmIResponse),
        (status = 401, description = "No valid credential"),
        (status = 403, description = "API key lacks the read permission"),
    )
)]
pub async fn whoami(Caller(caller): Caller) -> Result<Json<WhoAmIResponse>, AuthError> {
    caller.require_permission(WHOAMI_PERMISSION)?;
    Ok(Json(caller.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_support::TestServices;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn token_caller_summary() {
        let services = TestServices::new().await;
        let user = services.user("ext-whoami").await;
        let ctx = CallerContext {
            user: user.clone(),
            scheme: Scheme::Jwt,
            scope: Some("openid profile".into()),
            api_key: None,
        };

        let Json(body) = whoami(Caller(ctx)).await.unwrap();
        assert_eq!(body.user_id, user.id);
        assert_eq!(body.external_id, "ext-whoami");
        assert_eq!(body.scheme, Scheme::Jwt);
        assert_eq!(body.scope.as_deref(), Some("openid profile"));
        assert!(body.api_key_id.is_none());
    }

    #[tokio::test]
    async fn key_without_read_is_forbidden() {
        let services = TestServices::new().await;
        let user = services.user("ext-whoami").await;
        let created = services.create_key(user.id, &["write"]).await;
        let ctx = CallerContext::from_api_key(user, created.record);

        let err = whoami(Caller(ctx)).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn key_caller_summary_lists_permissions() {
        let services = TestServices::new().await;
        let user = services.user("ext-whoami").await;
        let created = services.create_key(user.id, &["read", "write"]).await;
        let key_id = created.record.id;
        let ctx = CallerContext::from_api_key(user, created.record);

        let Json(body) = whoami(Caller(ctx)).await.unwrap();
        assert_eq!(body.scheme, Scheme::ApiKey);
        assert_eq!(body.api_key_id, Some(key_id));
        assert_eq!(
            body.permissions,
            Some(vec!["read".to_string(), "write".to_string()])
        );
    }
}
