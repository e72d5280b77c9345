// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! API key management for the authenticated user.
//!
//! The plaintext key appears in exactly one response: the 201 from create.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    auth::{Caller, NewApiKey},
    error::ApiError,
    models::{ApiKey, ApiKeyListResponse, CreateApiKeyRequest, CreateApiKeyResponse},
    state::AppState,
};

#[utoipa::path(
    post,
    path = "/v1/api-keys",
    request_body = CreateApiKeyRequest,
    tag = "API Keys",
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Key created; `key` is shown only once", body = CreateApiKeyResponse),
        (status = 400, description = "Missing name or expiry in the past"),
        (status = 401, description = "Unauthorized - invalid or missing token"),
    )
)]
pub async fn create_api_key(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(request): Json<CreateApiKeyRequest>,
) -> Result<(StatusCode, Json<CreateApiKeyResponse>), ApiError> {
    let created = state
        .api_keys
        .create(
            caller.user_id(),
            NewApiKey {
                name: request.name,
                permissions: request.permissions,
                expires_at: request.expires_at,
            },
        )
        .await?;

    let response = CreateApiKeyResponse {
        api_key: ApiKey::from(created.record),
        key: created.plaintext,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    get,
    path = "/v1/api-keys",
    tag = "API Keys",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Keys of the caller, newest first", body = ApiKeyListResponse),
        (status = 401, description = "Unauthorized - invalid or missing token"),
    )
)]
pub async fn list_api_keys(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Result<Json<ApiKeyListResponse>, ApiError> {
    let api_keys = state.api_keys.list(caller.user_id()).await?;
    Ok(Json(ApiKeyListResponse {
        count: api_keys.len(),
        api_keys,
    }))
}

#[utoipa::path(
    delete,
    path = "/v1/api-keys/{key_id}",
    params(
        ("key_id" = String, Path, description = "Identifier of the key to revoke")
    ),
    tag = "API Keys",
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Key revoked"),
        (status = 400, description = "Malformed key id"),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 404, description = "No such key for this user"),
    )
)]
pub async fn revoke_api_key(
    Path(key_id): Path<String>,
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Result<StatusCode, ApiError> {
    let key_id =
        Uuid::parse_str(&key_id).map_err(|_| ApiError::bad_request("Invalid API key ID"))?;
    state.api_keys.revoke(caller.user_id(), key_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
