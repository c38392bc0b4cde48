// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use super::countries::{country_not_found, find_country};
use super::validation::ValidJson;
use crate::auth::extractor::{CoinsDelete, CoinsUpdate, CoinsWrite};
use crate::auth::RequirePermission;
use crate::error::{ApiError, ErrorCode, FieldIssue};
use crate::models::{coin_rule_issues, CoinListQuery, CreateCoinRequest, UpdateCoinRequest};
use crate::state::AppState;
use crate::storage::{CoinFilter, CoinRepository, CoinType, StoreError, StoredCoin};

pub(crate) fn coin_not_found() -> ApiError {
    ApiError::not_found(ErrorCode::CoinNotFound, "Coin not found")
}

fn coin_error(err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound {
            entity: "Country", ..
        } => country_not_found(),
        StoreError::NotFound { .. } => coin_not_found(),
        other => other.into(),
    }
}

fn check_rules(coin: &StoredCoin) -> Result<(), ApiError> {
    let issues = coin_rule_issues(coin.coin_type, coin.quantity, &coin.period);
    if issues.is_empty() {
        Ok(())
    } else {
        Err(ApiError::validation(issues))
    }
}

/// Coins, optionally filtered by type and country name.
#[utoipa::path(
    get,
    path = "/api/coins",
    tag = "Coins",
    params(CoinListQuery),
    responses(
        (status = 200, description = "Coins", body = Vec<StoredCoin>),
        (status = 400, description = "Unknown coin type", body = crate::error::ErrorBody),
        (status = 404, description = "Country not found", body = crate::error::ErrorBody)
    )
)]
pub async fn list_coins(
    State(state): State<AppState>,
    Query(query): Query<CoinListQuery>,
) -> Result<Json<Vec<StoredCoin>>, ApiError> {
    let mut filter = CoinFilter::default();

    if let Some(raw) = query.coin_type.as_deref().filter(|t| !t.trim().is_empty()) {
        let coin_type = raw.parse::<CoinType>().map_err(|reason| {
            ApiError::validation(vec![FieldIssue::new("invalid_enum", reason, "type")])
        })?;
        filter.coin_type = Some(coin_type);
    }
    if let Some(name) = query.country.as_deref().filter(|n| !n.trim().is_empty()) {
        filter.country_id = Some(find_country(&state, name)?.id);
    }

    Ok(Json(CoinRepository::new(&state.db).list(&filter)?))
}

/// A coin by id.
#[utoipa::path(
    get,
    path = "/api/coins/{id}",
    tag = "Coins",
    params(("id" = String, Path, description = "Coin id")),
    responses(
        (status = 200, description = "Coin", body = StoredCoin),
        (status = 404, description = "Coin not found", body = crate::error::ErrorBody)
    )
)]
pub async fn get_coin(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StoredCoin>, ApiError> {
    CoinRepository::new(&state.db)
        .find(&id)?
        .map(Json)
        .ok_or_else(coin_not_found)
}

/// Create a coin issued by the named country.
#[utoipa::path(
    post,
    path = "/api/countries/{name}/coins",
    tag = "Coins",
    params(("name" = String, Path, description = "Issuing country")),
    request_body = CreateCoinRequest,
    responses(
        (status = 201, description = "Coin created", body = StoredCoin),
        (status = 400, description = "Validation failed", body = crate::error::ErrorBody),
        (status = 403, description = "Missing coins:write", body = crate::error::ErrorBody),
        (status = 404, description = "Country not found", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_coin(
    RequirePermission(user, ..): RequirePermission<CoinsWrite>,
    State(state): State<AppState>,
    Path(country_name): Path<String>,
    ValidJson(request): ValidJson<CreateCoinRequest>,
) -> Result<(StatusCode, Json<StoredCoin>), ApiError> {
    let country = find_country(&state, &country_name)?;

    let mut coin = StoredCoin::new(
        request.coin_type,
        request.quantity,
        request.period,
        request.description,
        country.id,
    );
    coin.image = request.image;
    check_rules(&coin)?;

    CoinRepository::new(&state.db)
        .create(&coin)
        .map_err(coin_error)?;
    tracing::info!(user_id = %user.user_id, coin_id = %coin.id, "coin created");
    Ok((StatusCode::CREATED, Json(coin)))
}

/// Update a coin, optionally moving it to another country.
#[utoipa::path(
    patch,
    path = "/api/coins/{id}",
    tag = "Coins",
    params(("id" = String, Path, description = "Coin id")),
    request_body = UpdateCoinRequest,
    responses(
        (status = 200, description = "Coin updated", body = StoredCoin),
        (status = 400, description = "Validation failed", body = crate::error::ErrorBody),
        (status = 403, description = "Missing coins:update", body = crate::error::ErrorBody),
        (status = 404, description = "Coin or country not found", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_coin(
    RequirePermission(user, ..): RequirePermission<CoinsUpdate>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidJson(request): ValidJson<UpdateCoinRequest>,
) -> Result<Json<StoredCoin>, ApiError> {
    let repo = CoinRepository::new(&state.db);
    let mut coin = repo.find(&id)?.ok_or_else(coin_not_found)?;

    if let Some(coin_type) = request.coin_type {
        coin.coin_type = coin_type;
        // Changing the type resets the mintage unless a new one is given
        if coin_type != CoinType::Commemorative {
            coin.quantity = None;
        }
    }
    if request.quantity.is_some() {
        coin.quantity = request.quantity;
    }
    if request.image.is_some() {
        coin.image = request.image;
    }
    if let Some(period) = request.period {
        coin.period = period;
    }
    if let Some(description) = request.description {
        coin.description = description;
    }
    if let Some(country_name) = request.country {
        coin.country = find_country(&state, &country_name)?.id;
    }
    check_rules(&coin)?;

    let updated = repo.update(&coin).map_err(coin_error)?;
    tracing::info!(user_id = %user.user_id, coin_id = %updated.id, "coin updated");
    Ok(Json(updated))
}

/// Delete a coin and remove it from every collection.
#[utoipa::path(
    delete,
    path = "/api/coins/{id}",
    tag = "Coins",
    params(("id" = String, Path, description = "Coin id")),
    responses(
        (status = 204, description = "Coin deleted"),
        (status = 403, description = "Missing coins:delete", body = crate::error::ErrorBody),
        (status = 404, description = "Coin not found", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_coin(
    RequirePermission(user, ..): RequirePermission<CoinsDelete>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    CoinRepository::new(&state.db)
        .delete(&id)
        .map_err(coin_error)?;
    tracing::info!(user_id = %user.user_id, coin_id = %id, "coin deleted");
    Ok(StatusCode::NO_CONTENT)
}
