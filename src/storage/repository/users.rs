// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User repository.
//!
//! Users are keyed by UUID. Email uniqueness is enforced through the
//! `user_emails` index, written in the same transaction as the user record.

use chrono::{DateTime, Utc};
use redb::{ReadableTable, WriteTransaction};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::super::database::{
    get_json, put_json, scan_json, Database, StoreError, StoreResult, COINS, SESSIONS,
    USERS, USER_EMAILS, VERIFICATION_CODES,
};
use super::sessions::StoredSession;
use super::verification_codes::VerificationCode;
use crate::auth::Role;

const ENTITY: &str = "User";

/// Remove every session and verification code owned by `user_id`.
fn purge_credentials(txn: &WriteTransaction, user_id: &str) -> StoreResult<()> {
    let mut sessions = txn.open_table(SESSIONS)?;
    let owned: Vec<StoredSession> = scan_json(&sessions)?;
    for session in owned.iter().filter(|s| s.user_id == user_id) {
        sessions.remove(session.id.as_str())?;
    }

    let mut codes = txn.open_table(VERIFICATION_CODES)?;
    let pending: Vec<VerificationCode> = scan_json(&codes)?;
    for code in pending.iter().filter(|c| c.user_id == user_id) {
        codes.remove(code.id.as_str())?;
    }
    Ok(())
}

/// Canonical form used for lookups and the uniqueness index.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// User record.
///
/// `password_hash` is an argon2 PHC string; accounts created through Google
/// have none and can only sign in through Google.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredUser {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub pfp: Option<String>,
    /// Owned coin ids, without duplicates.
    #[serde(default)]
    pub coins: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredUser {
    pub fn new(name: impl Into<String>, email: &str, password_hash: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            email: normalize_email(email),
            password_hash,
            role: Role::default(),
            email_verified: false,
            pfp: None,
            coins: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Repository for user records.
pub struct UserRepository<'a> {
    db: &'a Database,
}

impl<'a> UserRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Look up a user by id.
    pub fn find(&self, user_id: &str) -> StoreResult<Option<StoredUser>> {
        self.db
            .read(|txn| get_json(&txn.open_table(USERS)?, user_id))
    }

    /// Get a user by id, failing with `NotFound`.
    pub fn get(&self, user_id: &str) -> StoreResult<StoredUser> {
        self.find(user_id)?
            .ok_or_else(|| StoreError::not_found(ENTITY, user_id))
    }

    /// Look up a user through the email index.
    pub fn find_by_email(&self, email: &str) -> StoreResult<Option<StoredUser>> {
        let email = normalize_email(email);
        self.db.read(|txn| {
            let index = txn.open_table(USER_EMAILS)?;
            let user_id = match index.get(email.as_str())? {
                Some(id) => id.value().to_string(),
                None => return Ok(None),
            };
            get_json(&txn.open_table(USERS)?, &user_id)
        })
    }

    /// Insert a new user. Fails with `AlreadyExists` if the email is taken.
    pub fn create(&self, user: &StoredUser) -> StoreResult<()> {
        self.db.write(|txn| {
            let mut index = txn.open_table(USER_EMAILS)?;
            if index.get(user.email.as_str())?.is_some() {
                return Err(StoreError::already_exists(ENTITY, user.email.clone()));
            }
            index.insert(user.email.as_str(), user.id.as_str())?;

            let mut users = txn.open_table(USERS)?;
            put_json(&mut users, &user.id, user)
        })
    }

    /// Overwrite an existing user. The email is immutable.
    pub fn update(&self, user: &StoredUser) -> StoreResult<()> {
        self.db.write(|txn| {
            let mut users = txn.open_table(USERS)?;
            let existing: StoredUser = get_json(&users, &user.id)?
                .ok_or_else(|| StoreError::not_found(ENTITY, user.id.clone()))?;

            let mut updated = user.clone();
            updated.email = existing.email;
            updated.updated_at = Utc::now();
            put_json(&mut users, &user.id, &updated)
        })
    }

    /// Apply `change` to the stored user inside one write transaction.
    ///
    /// The email stays immutable whatever `change` does to it.
    pub fn modify<F>(&self, user_id: &str, change: F) -> StoreResult<StoredUser>
    where
        F: FnOnce(&mut StoredUser),
    {
        self.db.write(|txn| {
            let mut users = txn.open_table(USERS)?;
            let mut user: StoredUser = get_json(&users, user_id)?
                .ok_or_else(|| StoreError::not_found(ENTITY, user_id))?;

            let email = user.email.clone();
            change(&mut user);
            user.email = email;
            user.updated_at = Utc::now();
            put_json(&mut users, user_id, &user)?;
            Ok(user)
        })
    }

    /// Delete a user together with its sessions and verification codes.
    pub fn delete(&self, user_id: &str) -> StoreResult<StoredUser> {
        self.db.write(|txn| {
            let mut users = txn.open_table(USERS)?;
            let user: StoredUser = get_json(&users, user_id)?
                .ok_or_else(|| StoreError::not_found(ENTITY, user_id))?;
            users.remove(user_id)?;

            let mut index = txn.open_table(USER_EMAILS)?;
            index.remove(user.email.as_str())?;

            purge_credentials(txn, user_id)?;
            Ok(user)
        })
    }

    /// Add a coin to the user's collection. Adding an owned coin is a no-op.
    pub fn add_coin(&self, user_id: &str, coin_id: &str) -> StoreResult<StoredUser> {
        self.db.write(|txn| {
            let coins = txn.open_table(COINS)?;
            if coins.get(coin_id)?.is_none() {
                return Err(StoreError::not_found("Coin", coin_id));
            }

            let mut users = txn.open_table(USERS)?;
            let mut user: StoredUser = get_json(&users, user_id)?
                .ok_or_else(|| StoreError::not_found(ENTITY, user_id))?;
            if !user.coins.iter().any(|c| c == coin_id) {
                user.coins.push(coin_id.to_string());
                user.updated_at = Utc::now();
                put_json(&mut users, user_id, &user)?;
            }
            Ok(user)
        })
    }

    /// Remove a coin from the user's collection.
    ///
    /// Fails with `NotFound` for the coin when the user does not own it.
    pub fn remove_coin(&self, user_id: &str, coin_id: &str) -> StoreResult<StoredUser> {
        self.db.write(|txn| {
            let mut users = txn.open_table(USERS)?;
            let mut user: StoredUser = get_json(&users, user_id)?
                .ok_or_else(|| StoreError::not_found(ENTITY, user_id))?;
            let before = user.coins.len();
            user.coins.retain(|c| c != coin_id);
            if user.coins.len() == before {
                return Err(StoreError::not_found("Coin", coin_id));
            }
            user.updated_at = Utc::now();
            put_json(&mut users, user_id, &user)?;
            Ok(user)
        })
    }

    /// Create or refresh a user vouched for by an external identity provider.
    ///
    /// The account is marked verified. An existing password and role are kept.
    pub fn upsert_verified(
        &self,
        email: &str,
        name: &str,
        pfp: Option<String>,
    ) -> StoreResult<StoredUser> {
        let email = normalize_email(email);
        self.db.write(|txn| {
            let mut index = txn.open_table(USER_EMAILS)?;
            let mut users = txn.open_table(USERS)?;

            let existing_id = index.get(email.as_str())?.map(|id| id.value().to_string());
            let user = match existing_id {
                Some(user_id) => {
                    let mut user: StoredUser = get_json(&users, &user_id)?
                        .ok_or_else(|| StoreError::not_found(ENTITY, user_id.clone()))?;
                    // An unverified record was never proven to belong to this
                    // address owner, so nothing set through it may survive
                    if !user.email_verified {
                        user.password_hash = None;
                        purge_credentials(txn, &user.id)?;
                    }
                    user.name = name.to_string();
                    if pfp.is_some() {
                        user.pfp = pfp;
                    }
                    user.email_verified = true;
                    user.updated_at = Utc::now();
                    user
                }
                None => {
                    let mut user = StoredUser::new(name, &email, None);
                    user.pfp = pfp;
                    user.email_verified = true;
                    index.insert(user.email.as_str(), user.id.as_str())?;
                    user
                }
            };

            put_json(&mut users, &user.id, &user)?;
            Ok(user)
        })
    }

    /// Number of stored users.
    pub fn count(&self) -> StoreResult<usize> {
        self.db.read(|txn| {
            let users: Vec<StoredUser> = scan_json(&txn.open_table(USERS)?)?;
            Ok(users.len())
        })
    }
}
