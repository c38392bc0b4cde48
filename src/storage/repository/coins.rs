// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Coin repository and coin domain types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::super::database::{
    get_json, put_json, scan_json, Database, StoreError, StoreResult, COINS, COUNTRIES, USERS,
};
use super::users::StoredUser;

const ENTITY: &str = "Coin";

/// Denomination of a coin. Parsed case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
pub enum CoinType {
    #[serde(rename = "COMMEMORATIVE")]
    Commemorative,
    #[serde(rename = "2 EURO")]
    TwoEuro,
    #[serde(rename = "1 EURO")]
    OneEuro,
    #[serde(rename = "50 CENT")]
    FiftyCent,
    #[serde(rename = "20 CENT")]
    TwentyCent,
    #[serde(rename = "10 CENT")]
    TenCent,
    #[serde(rename = "5 CENT")]
    FiveCent,
    #[serde(rename = "2 CENT")]
    TwoCent,
    #[serde(rename = "1 CENT")]
    OneCent,
}

impl CoinType {
    pub const ALL: [CoinType; 9] = [
        CoinType::Commemorative,
        CoinType::TwoEuro,
        CoinType::OneEuro,
        CoinType::FiftyCent,
        CoinType::TwentyCent,
        CoinType::TenCent,
        CoinType::FiveCent,
        CoinType::TwoCent,
        CoinType::OneCent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CoinType::Commemorative => "COMMEMORATIVE",
            CoinType::TwoEuro => "2 EURO",
            CoinType::OneEuro => "1 EURO",
            CoinType::FiftyCent => "50 CENT",
            CoinType::TwentyCent => "20 CENT",
            CoinType::TenCent => "10 CENT",
            CoinType::FiveCent => "5 CENT",
            CoinType::TwoCent => "2 CENT",
            CoinType::OneCent => "1 CENT",
        }
    }
}

impl FromStr for CoinType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase();
        CoinType::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| {
                let allowed: Vec<&str> = CoinType::ALL.iter().map(|t| t.as_str()).collect();
                format!("unknown coin type '{s}', expected one of: {}", allowed.join(", "))
            })
    }
}

impl fmt::Display for CoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CoinType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Minting period of a coin.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CoinPeriod {
    pub start_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

/// A coin issued by a country.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoredCoin {
    pub id: String,
    #[serde(rename = "type")]
    pub coin_type: CoinType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Mintage; only commemorative coins carry one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u64>,
    pub period: CoinPeriod,
    pub description: String,
    /// Id of the issuing country.
    pub country: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredCoin {
    pub fn new(
        coin_type: CoinType,
        quantity: Option<u64>,
        period: CoinPeriod,
        description: impl Into<String>,
        country_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            coin_type,
            image: None,
            quantity,
            period,
            description: description.into(),
            country: country_id.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Listing criteria. Unset fields match anything.
#[derive(Debug, Clone, Default)]
pub struct CoinFilter {
    pub coin_type: Option<CoinType>,
    pub country_id: Option<String>,
}

/// Repository for coins.
pub struct CoinRepository<'a> {
    db: &'a Database,
}

impl<'a> CoinRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Coins matching `filter`, oldest first.
    pub fn list(&self, filter: &CoinFilter) -> StoreResult<Vec<StoredCoin>> {
        let mut coins: Vec<StoredCoin> = self
            .db
            .read(|txn| scan_json(&txn.open_table(COINS)?))?;
        coins.retain(|c| {
            filter.coin_type.map_or(true, |t| t == c.coin_type)
                && filter.country_id.as_ref().map_or(true, |id| *id == c.country)
        });
        coins.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(coins)
    }

    pub fn find(&self, coin_id: &str) -> StoreResult<Option<StoredCoin>> {
        self.db.read(|txn| get_json(&txn.open_table(COINS)?, coin_id))
    }

    /// Insert a coin. Fails with `NotFound` for a country that doesn't exist.
    pub fn create(&self, coin: &StoredCoin) -> StoreResult<()> {
        self.db.write(|txn| {
            let countries = txn.open_table(COUNTRIES)?;
            if countries.get(coin.country.as_str())?.is_none() {
                return Err(StoreError::not_found("Country", coin.country.clone()));
            }

            let mut coins = txn.open_table(COINS)?;
            if coins.get(coin.id.as_str())?.is_some() {
                return Err(StoreError::already_exists(ENTITY, coin.id.clone()));
            }
            put_json(&mut coins, &coin.id, coin)
        })
    }

    /// Overwrite an existing coin.
    pub fn update(&self, coin: &StoredCoin) -> StoreResult<StoredCoin> {
        self.db.write(|txn| {
            let countries = txn.open_table(COUNTRIES)?;
            if countries.get(coin.country.as_str())?.is_none() {
                return Err(StoreError::not_found("Country", coin.country.clone()));
            }

            let mut coins = txn.open_table(COINS)?;
            let existing: StoredCoin = get_json(&coins, &coin.id)?
                .ok_or_else(|| StoreError::not_found(ENTITY, coin.id.clone()))?;

            let mut updated = coin.clone();
            updated.created_at = existing.created_at;
            updated.updated_at = Utc::now();
            put_json(&mut coins, &updated.id, &updated)?;
            Ok(updated)
        })
    }

    /// Delete a coin and pull it from every collection that holds it.
    pub fn delete(&self, coin_id: &str) -> StoreResult<StoredCoin> {
        self.db.write(|txn| {
            let mut coins = txn.open_table(COINS)?;
            let coin: StoredCoin = get_json(&coins, coin_id)?
                .ok_or_else(|| StoreError::not_found(ENTITY, coin_id))?;
            coins.remove(coin_id)?;

            let mut users = txn.open_table(USERS)?;
            let holders: Vec<StoredUser> = scan_json(&users)?;
            let now = Utc::now();
            for mut user in holders
                .into_iter()
                .filter(|u| u.coins.iter().any(|c| c == coin_id))
            {
                user.coins.retain(|c| c != coin_id);
                user.updated_at = now;
                put_json(&mut users, &user.id, &user)?;
            }
            Ok(coin)
        })
    }
}
