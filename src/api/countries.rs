// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};

use super::users::image_host;
use super::validation::ValidJson;
use crate::auth::extractor::{CountriesDelete, CountriesUpdate, CountriesWrite};
use crate::auth::RequirePermission;
use crate::error::{ApiError, ErrorCode, FieldIssue};
use crate::images;
use crate::models::{parse_joined_on, CreateCountryForm, UpdateCountryRequest};
use crate::state::AppState;
use crate::storage::{normalize_country_name, CountryRepository, StoreError, StoredCountry};

pub(crate) fn country_not_found() -> ApiError {
    ApiError::not_found(ErrorCode::CountryNotFound, "Country not found")
}

fn name_in_use() -> ApiError {
    ApiError::conflict(ErrorCode::CountryNameInUse, "Country name is already in use")
}

fn country_error(err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound { .. } => country_not_found(),
        StoreError::AlreadyExists { .. } => name_in_use(),
        StoreError::InUse { .. } => ApiError::conflict(
            ErrorCode::CountryHasCoins,
            "Country still has coins; delete them first",
        ),
        other => other.into(),
    }
}

pub(crate) fn find_country(state: &AppState, name: &str) -> Result<StoredCountry, ApiError> {
    CountryRepository::new(&state.db)
        .find_by_name(name)?
        .ok_or_else(country_not_found)
}

/// All countries ordered by name.
#[utoipa::path(
    get,
    path = "/api/countries",
    tag = "Countries",
    responses(
        (status = 200, description = "Countries", body = Vec<StoredCountry>)
    )
)]
pub async fn list_countries(
    State(state): State<AppState>,
) -> Result<Json<Vec<StoredCountry>>, ApiError> {
    Ok(Json(CountryRepository::new(&state.db).list()?))
}

/// A country by name (case-insensitive).
#[utoipa::path(
    get,
    path = "/api/countries/{name}",
    tag = "Countries",
    params(("name" = String, Path, description = "Country name")),
    responses(
        (status = 200, description = "Country", body = StoredCountry),
        (status = 404, description = "Country not found", body = crate::error::ErrorBody)
    )
)]
pub async fn get_country(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<StoredCountry>, ApiError> {
    Ok(Json(find_country(&state, &name)?))
}

/// Create a country and upload its flag.
#[utoipa::path(
    post,
    path = "/api/countries",
    tag = "Countries",
    request_body(content = CreateCountryForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Country created", body = StoredCountry),
        (status = 400, description = "Validation failed or no flag", body = crate::error::ErrorBody),
        (status = 403, description = "Missing countries:write", body = crate::error::ErrorBody),
        (status = 409, description = "Country name in use", body = crate::error::ErrorBody),
        (status = 413, description = "Image too big", body = crate::error::ErrorBody),
        (status = 415, description = "Unsupported image type", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_country(
    RequirePermission(user, ..): RequirePermission<CountriesWrite>,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<StoredCountry>), ApiError> {
    let mut form = images::read_upload_form(multipart, "flagImage").await?;

    let name = normalize_country_name(form.field("name").unwrap_or_default());
    let mut issues = Vec::new();
    if name.is_empty() {
        issues.push(FieldIssue::new("required", "Name is required", "name"));
    }
    let joined_on = match parse_joined_on(form.field("joinedOn")) {
        Ok(date) => Some(date),
        Err(issue) => {
            issues.push(issue);
            None
        }
    };
    let Some(joined_on) = joined_on.filter(|_| issues.is_empty()) else {
        return Err(ApiError::validation(issues));
    };

    let repo = CountryRepository::new(&state.db);
    if repo.find_by_name(&name)?.is_some() {
        return Err(name_in_use());
    }

    let flag = form.require_image("No flag image uploaded")?;
    let url = image_host(&state)?
        .upload(flag, &images::flag_public_id(&name))
        .await?;

    let country = StoredCountry::new(&name, url, joined_on);
    repo.create(&country).map_err(country_error)?;
    tracing::info!(user_id = %user.user_id, country = %country.name, "country created");
    Ok((StatusCode::CREATED, Json(country)))
}

/// Rename a country or change its joining date.
#[utoipa::path(
    patch,
    path = "/api/countries/{name}",
    tag = "Countries",
    params(("name" = String, Path, description = "Country name")),
    request_body = UpdateCountryRequest,
    responses(
        (status = 200, description = "Country updated", body = StoredCountry),
        (status = 403, description = "Missing countries:update", body = crate::error::ErrorBody),
        (status = 404, description = "Country not found", body = crate::error::ErrorBody),
        (status = 409, description = "Country name in use", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_country(
    RequirePermission(user, ..): RequirePermission<CountriesUpdate>,
    State(state): State<AppState>,
    Path(name): Path<String>,
    ValidJson(request): ValidJson<UpdateCountryRequest>,
) -> Result<Json<StoredCountry>, ApiError> {
    let mut country = find_country(&state, &name)?;
    if let Some(new_name) = request.name {
        let new_name = normalize_country_name(&new_name);
        if new_name.is_empty() {
            return Err(ApiError::validation(vec![FieldIssue::new(
                "required",
                "Name is required",
                "name",
            )]));
        }
        country.name = new_name;
    }
    if let Some(joined_on) = request.joined_on {
        country.joined_on = joined_on;
    }

    let updated = CountryRepository::new(&state.db)
        .update(&country)
        .map_err(country_error)?;
    tracing::info!(user_id = %user.user_id, country = %updated.name, "country updated");
    Ok(Json(updated))
}

/// Delete a country that has no coins.
#[utoipa::path(
    delete,
    path = "/api/countries/{name}",
    tag = "Countries",
    params(("name" = String, Path, description = "Country name")),
    responses(
        (status = 204, description = "Country deleted"),
        (status = 403, description = "Missing countries:delete", body = crate::error::ErrorBody),
        (status = 404, description = "Country not found", body = crate::error::ErrorBody),
        (status = 409, description = "Country still has coins", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_country(
    RequirePermission(user, ..): RequirePermission<CountriesDelete>,
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    let country = find_country(&state, &name)?;
    CountryRepository::new(&state.db)
        .delete(&country.id)
        .map_err(country_error)?;
    tracing::info!(user_id = %user.user_id, country = %country.name, "country deleted");
    Ok(StatusCode::NO_CONTENT)
}
