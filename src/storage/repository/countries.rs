// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Country repository.
//!
//! Country names are stored lower-case and are unique through the
//! `country_names` index.

use chrono::{DateTime, NaiveDate, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::super::database::{
    get_json, put_json, scan_json, Database, StoreError, StoreResult, COINS, COUNTRIES,
    COUNTRY_NAMES,
};
use super::coins::StoredCoin;

const ENTITY: &str = "Country";

/// Canonical form of a country name.
pub fn normalize_country_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A coin-issuing country.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoredCountry {
    pub id: String,
    /// Lower-case, unique.
    pub name: String,
    /// URL of the flag on the image host.
    pub flag_image: String,
    /// Date the country joined the eurozone.
    pub joined_on: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredCountry {
    pub fn new(name: &str, flag_image: impl Into<String>, joined_on: NaiveDate) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: normalize_country_name(name),
            flag_image: flag_image.into(),
            joined_on,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Repository for countries.
pub struct CountryRepository<'a> {
    db: &'a Database,
}

impl<'a> CountryRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// All countries ordered by name.
    pub fn list(&self) -> StoreResult<Vec<StoredCountry>> {
        let mut countries: Vec<StoredCountry> = self
            .db
            .read(|txn| scan_json(&txn.open_table(COUNTRIES)?))?;
        countries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(countries)
    }

    pub fn find(&self, country_id: &str) -> StoreResult<Option<StoredCountry>> {
        self.db
            .read(|txn| get_json(&txn.open_table(COUNTRIES)?, country_id))
    }

    /// Case-insensitive lookup by name.
    pub fn find_by_name(&self, name: &str) -> StoreResult<Option<StoredCountry>> {
        let name = normalize_country_name(name);
        self.db.read(|txn| {
            let index = txn.open_table(COUNTRY_NAMES)?;
            let country_id = match index.get(name.as_str())? {
                Some(id) => id.value().to_string(),
                None => return Ok(None),
            };
            get_json(&txn.open_table(COUNTRIES)?, &country_id)
        })
    }

    /// Insert a country. Fails with `AlreadyExists` if the name is taken.
    pub fn create(&self, country: &StoredCountry) -> StoreResult<()> {
        self.db.write(|txn| {
            let mut index = txn.open_table(COUNTRY_NAMES)?;
            if index.get(country.name.as_str())?.is_some() {
                return Err(StoreError::already_exists(ENTITY, country.name.clone()));
            }
            index.insert(country.name.as_str(), country.id.as_str())?;

            let mut countries = txn.open_table(COUNTRIES)?;
            put_json(&mut countries, &country.id, country)
        })
    }

    /// Overwrite a country, moving its name index entry on rename.
    pub fn update(&self, country: &StoredCountry) -> StoreResult<StoredCountry> {
        self.db.write(|txn| {
            let mut countries = txn.open_table(COUNTRIES)?;
            let existing: StoredCountry = get_json(&countries, &country.id)?
                .ok_or_else(|| StoreError::not_found(ENTITY, country.id.clone()))?;

            let mut updated = country.clone();
            updated.name = normalize_country_name(&country.name);
            updated.created_at = existing.created_at;
            updated.updated_at = Utc::now();

            if updated.name != existing.name {
                let mut index = txn.open_table(COUNTRY_NAMES)?;
                if index.get(updated.name.as_str())?.is_some() {
                    return Err(StoreError::already_exists(ENTITY, updated.name.clone()));
                }
                index.remove(existing.name.as_str())?;
                index.insert(updated.name.as_str(), updated.id.as_str())?;
            }

            put_json(&mut countries, &updated.id, &updated)?;
            Ok(updated)
        })
    }

    /// Delete a country that no coin references.
    pub fn delete(&self, country_id: &str) -> StoreResult<StoredCountry> {
        self.db.write(|txn| {
            let coins: Vec<StoredCoin> = scan_json(&txn.open_table(COINS)?)?;

            let mut countries = txn.open_table(COUNTRIES)?;
            let country: StoredCountry = get_json(&countries, country_id)?
                .ok_or_else(|| StoreError::not_found(ENTITY, country_id))?;

            if coins.iter().any(|c| c.country == country_id) {
                return Err(StoreError::InUse {
                    entity: ENTITY,
                    key: country.name,
                });
            }

            countries.remove(country_id)?;
            let mut index = txn.open_table(COUNTRY_NAMES)?;
            index.remove(country.name.as_str())?;
            Ok(country)
        })
    }
}
