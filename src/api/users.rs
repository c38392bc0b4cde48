// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};

use super::coins::coin_not_found;
use super::sessions::cleared_cookie_headers;
use super::validation::ValidJson;
use crate::auth::middleware::SessionEnded;
use crate::auth::Auth;
use crate::error::{ApiError, ErrorCode};
use crate::images::{self, ImageHost};
use crate::models::{CoinIdRequest, UserResponse};
use crate::state::AppState;
use crate::storage::{StoreError, StoredUser, UserRepository};

fn user_not_found() -> ApiError {
    ApiError::not_found(ErrorCode::UserNotFound, "User not found")
}

fn collection_error(err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound { entity: "Coin", .. } => coin_not_found(),
        StoreError::NotFound { .. } => user_not_found(),
        other => other.into(),
    }
}

fn load_user(state: &AppState, user_id: &str) -> Result<StoredUser, ApiError> {
    UserRepository::new(&state.db)
        .find(user_id)?
        .ok_or_else(user_not_found)
}

/// The configured image host, or 503.
pub(crate) fn image_host(state: &AppState) -> Result<&dyn ImageHost, ApiError> {
    state
        .images
        .as_deref()
        .ok_or_else(|| ApiError::external("Image uploads are not configured"))
}

/// The caller's profile.
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "Users",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorBody),
        (status = 404, description = "User no longer exists", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_me(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, ApiError> {
    Ok(Json(load_user(&state, &user.user_id)?.into()))
}

/// Delete the caller's account with its sessions and pending codes.
#[utoipa::path(
    delete,
    path = "/api/users/me",
    tag = "Users",
    responses(
        (status = 204, description = "Account deleted"),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorBody),
        (status = 404, description = "User no longer exists", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_me(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<(StatusCode, Extension<SessionEnded>, HeaderMap), ApiError> {
    UserRepository::new(&state.db)
        .delete(&user.user_id)
        .map_err(collection_error)?;
    tracing::info!(user_id = %user.user_id, "account deleted");
    Ok((
        StatusCode::NO_CONTENT,
        Extension(SessionEnded),
        cleared_cookie_headers(&state),
    ))
}

/// Replace the caller's profile picture (multipart field `pfp`).
#[utoipa::path(
    put,
    path = "/api/users/me/pfp",
    tag = "Users",
    request_body(content_type = "multipart/form-data", description = "Image under field `pfp`"),
    responses(
        (status = 200, description = "Profile picture updated", body = UserResponse),
        (status = 400, description = "No file uploaded", body = crate::error::ErrorBody),
        (status = 413, description = "Image too big", body = crate::error::ErrorBody),
        (status = 415, description = "Unsupported image type", body = crate::error::ErrorBody),
        (status = 503, description = "Image host unavailable", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn upload_profile_picture(
    Auth(user): Auth,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UserResponse>, ApiError> {
    let mut form = images::read_upload_form(multipart, "pfp").await?;
    let image = form.require_image("No file uploaded")?;

    let host = image_host(&state)?;
    let url = host
        .upload(image, &images::profile_public_id(&user.user_id))
        .await?;

    let stored = UserRepository::new(&state.db)
        .modify(&user.user_id, |u| u.pfp = Some(url))
        .map_err(collection_error)?;
    Ok(Json(stored.into()))
}

/// Add a coin to the caller's collection.
#[utoipa::path(
    post,
    path = "/api/users/me/coins",
    tag = "Users",
    request_body = CoinIdRequest,
    responses(
        (status = 200, description = "Coin added", body = UserResponse),
        (status = 404, description = "Coin not found", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn add_coin(
    Auth(user): Auth,
    State(state): State<AppState>,
    ValidJson(request): ValidJson<CoinIdRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let updated = UserRepository::new(&state.db)
        .add_coin(&user.user_id, &request.coin_id)
        .map_err(collection_error)?;
    Ok(Json(updated.into()))
}

/// Remove a coin from the caller's collection.
#[utoipa::path(
    delete,
    path = "/api/users/me/coins",
    tag = "Users",
    request_body = CoinIdRequest,
    responses(
        (status = 200, description = "Coin removed", body = UserResponse),
        (status = 404, description = "Coin not in the collection", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn remove_coin(
    Auth(user): Auth,
    State(state): State<AppState>,
    ValidJson(request): ValidJson<CoinIdRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let updated = UserRepository::new(&state.db)
        .remove_coin(&user.user_id, &request.coin_id)
        .map_err(collection_error)?;
    Ok(Json(updated.into()))
}
