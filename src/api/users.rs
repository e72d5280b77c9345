// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.

use axum::{extract::State, Json};
use tracing::info;

use crate::auth::Caller;
use crate::error::ApiError;
use crate::models::{ProfileUpdate, User};
use crate::state::AppState;

/// Longest accepted display name, in characters.
const MAX_NAME_LEN: usize = 200;

/// Get the current authenticated user's profile.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User profile", body = User),
        (status = 401, description = "Unauthorized - invalid or missing token"),
    )
)]
pub async fn get_current_user(Caller(caller): Caller) -> Json<User> {
    Json(caller.user)
}

/// Update the current user's profile.
///
/// Only the fields present in the body change.
#[utoipa::path(
    put,
    path = "/v1/users/me",
    tag = "Users",
    security(("bearer" = [])),
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Updated profile", body = User),
        (status = 400, description = "Empty update or invalid name"),
        (status = 401, description = "Unauthorized - invalid or missing token"),
    )
)]
pub async fn update_current_user(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(mut update): Json<ProfileUpdate>,
) -> Result<Json<User>, ApiError> {
    if update.is_empty() {
        return Err(ApiError::bad_request("No profile fields to update"));
    }
    if let Some(name) = update.name.as_mut() {
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed.chars().count() > MAX_NAME_LEN {
            return Err(ApiError::bad_request(format!(
                "Name must be 1-{MAX_NAME_LEN} characters"
            )));
        }
        *name = trimmed.to_string();
    }

    let user = state.users.update_profile(caller.user_id(), update).await?;
    info!(user_id = %user.id, "Profile updated");
    Ok(Json(user))
}
