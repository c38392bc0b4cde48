// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: user_id → serialized StoredUser
//! - `user_emails`: normalized email → user_id (uniqueness index)
//! - `sessions`: session_id → serialized StoredSession
//! - `verification_codes`: code → serialized VerificationCode
//! - `countries`: country_id → serialized StoredCountry
//! - `country_names`: lowercase name → country_id (uniqueness index)
//! - `coins`: coin_id → serialized StoredCoin
//!
//! Values are JSON bytes. Index tables are only ever written in the same
//! write transaction as the record they point to.

use std::path::Path;

use redb::{ReadTransaction, ReadableDatabase, ReadableTable, Table, TableDefinition, WriteTransaction};
use serde::{de::DeserializeOwned, Serialize};

// =============================================================================
// Table Definitions
// =============================================================================

pub(crate) const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");
pub(crate) const USER_EMAILS: TableDefinition<&str, &str> = TableDefinition::new("user_emails");
pub(crate) const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");
pub(crate) const VERIFICATION_CODES: TableDefinition<&str, &[u8]> =
    TableDefinition::new("verification_codes");
pub(crate) const COUNTRIES: TableDefinition<&str, &[u8]> = TableDefinition::new("countries");
pub(crate) const COUNTRY_NAMES: TableDefinition<&str, &str> =
    TableDefinition::new("country_names");
pub(crate) const COINS: TableDefinition<&str, &[u8]> = TableDefinition::new("coins");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{entity} {key} not found")]
    NotFound { entity: &'static str, key: String },

    #[error("{entity} {key} already exists")]
    AlreadyExists { entity: &'static str, key: String },

    #[error("{entity} {key} is still referenced")]
    InUse { entity: &'static str, key: String },
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity,
            key: key.into(),
        }
    }

    pub(crate) fn already_exists(entity: &'static str, key: impl Into<String>) -> Self {
        StoreError::AlreadyExists {
            entity,
            key: key.into(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// JSON Table Helpers
// =============================================================================

pub(crate) fn get_json<T, R>(table: &R, key: &str) -> StoreResult<Option<T>>
where
    T: DeserializeOwned,
    R: ReadableTable<&'static str, &'static [u8]>,
{
    match table.get(key)? {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}

pub(crate) fn scan_json<T, R>(table: &R) -> StoreResult<Vec<T>>
where
    T: DeserializeOwned,
    R: ReadableTable<&'static str, &'static [u8]>,
{
    let mut items = Vec::new();
    for entry in table.iter()? {
        let (_, value) = entry?;
        items.push(serde_json::from_slice(value.value())?);
    }
    Ok(items)
}

pub(crate) fn put_json<T: Serialize>(
    table: &mut Table<'_, &'static str, &'static [u8]>,
    key: &str,
    value: &T,
) -> StoreResult<()> {
    let json = serde_json::to_vec(value)?;
    table.insert(key, json.as_slice())?;
    Ok(())
}

// =============================================================================
// Database
// =============================================================================

/// Embedded ACID database shared by all repositories.
pub struct Database {
    db: redb::Database,
}

impl Database {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = redb::Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USER_EMAILS)?;
            let _ = write_txn.open_table(SESSIONS)?;
            let _ = write_txn.open_table(VERIFICATION_CODES)?;
            let _ = write_txn.open_table(COUNTRIES)?;
            let _ = write_txn.open_table(COUNTRY_NAMES)?;
            let _ = write_txn.open_table(COINS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Run `f` inside a read transaction.
    pub(crate) fn read<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&ReadTransaction) -> StoreResult<T>,
    {
        let read_txn = self.db.begin_read()?;
        f(&read_txn)
    }

    /// Run `f` inside a write transaction, committing only if it succeeds.
    pub(crate) fn write<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&WriteTransaction) -> StoreResult<T>,
    {
        let write_txn = self.db.begin_write()?;
        match f(&write_txn) {
            Ok(value) => {
                write_txn.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(abort_err) = write_txn.abort() {
                    tracing::warn!(error = %abort_err, "failed to abort write transaction");
                }
                Err(err)
            }
        }
    }

    /// Whether a read transaction can be opened.
    pub fn is_healthy(&self) -> bool {
        self.db.begin_read().is_ok()
    }
}
