// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistent storage in a single embedded redb file.
//!
//! ## Storage Layout
//!
//! ```text
//! users               user_id  -> user JSON
//! user_emails         email    -> user_id
//! sessions            id       -> session JSON
//! verification_codes  code     -> code JSON
//! countries           id       -> country JSON
//! country_names       name     -> country_id
//! coins               id       -> coin JSON
//! ```
//!
//! ## Referential Rules
//!
//! - Deleting a user removes its sessions and verification codes
//! - Deleting a coin removes it from every user's collection
//! - A country cannot be deleted while coins reference it

pub mod database;
pub mod repository;

pub use database::{Database, StoreError, StoreResult};
pub use repository::{
    normalize_country_name, normalize_email, CodeKind, CoinFilter, CoinPeriod, CoinRepository,
    CoinType, CountryRepository, SessionFilter, SessionPatch, SessionRepository, StoredCoin,
    StoredCountry, StoredSession, StoredUser, UserRepository, VerificationCode,
    VerificationCodeRepository,
};
