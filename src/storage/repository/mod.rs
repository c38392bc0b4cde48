// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Typed repositories over the embedded database.

pub mod coins;
pub mod countries;
pub mod sessions;
pub mod users;
pub mod verification_codes;

pub use coins::{CoinFilter, CoinPeriod, CoinRepository, CoinType, StoredCoin};
pub use countries::{normalize_country_name, CountryRepository, StoredCountry};
pub use sessions::{SessionFilter, SessionPatch, SessionRepository, StoredSession};
pub use users::{normalize_email, StoredUser, UserRepository};
pub use verification_codes::{CodeKind, VerificationCode, VerificationCodeRepository};
