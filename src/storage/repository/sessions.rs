// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session repository.
//!
//! A session anchors refresh tokens to a revocable `valid` flag. Sessions
//! are invalidated on logout and never expire in storage; only the tokens
//! referencing them carry a TTL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::super::database::{get_json, put_json, scan_json, Database, StoreResult, SESSIONS};

/// One authenticated device or browser context.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    pub id: String,
    #[serde(rename = "user")]
    pub user_id: String,
    pub valid: bool,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Selection criteria for [`SessionRepository::find`] and
/// [`SessionRepository::update`]. Unset fields match anything.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub id: Option<String>,
    pub user_id: Option<String>,
    pub valid: Option<bool>,
}

impl SessionFilter {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn valid(mut self, valid: bool) -> Self {
        self.valid = Some(valid);
        self
    }

    fn matches(&self, session: &StoredSession) -> bool {
        self.id.as_ref().map_or(true, |id| *id == session.id)
            && self.user_id.as_ref().map_or(true, |u| *u == session.user_id)
            && self.valid.map_or(true, |v| v == session.valid)
    }
}

/// Fields to change on matching sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub valid: Option<bool>,
}

impl SessionPatch {
    pub fn invalidate() -> Self {
        Self { valid: Some(false) }
    }
}

/// Repository for session records.
pub struct SessionRepository<'a> {
    db: &'a Database,
}

impl<'a> SessionRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Open a new valid session for a user.
    pub fn create(&self, user_id: &str, user_agent: &str) -> StoreResult<StoredSession> {
        let now = Utc::now();
        let session = StoredSession {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            valid: true,
            user_agent: user_agent.to_string(),
            created_at: now,
            updated_at: now,
        };

        self.db.write(|txn| {
            let mut table = txn.open_table(SESSIONS)?;
            put_json(&mut table, &session.id, &session)
        })?;
        Ok(session)
    }

    pub fn get(&self, session_id: &str) -> StoreResult<Option<StoredSession>> {
        self.db
            .read(|txn| get_json(&txn.open_table(SESSIONS)?, session_id))
    }

    /// Sessions matching `filter`, newest first.
    pub fn find(&self, filter: &SessionFilter) -> StoreResult<Vec<StoredSession>> {
        let mut sessions: Vec<StoredSession> = self.db.read(|txn| {
            let table = txn.open_table(SESSIONS)?;
            match &filter.id {
                Some(id) => Ok(get_json::<StoredSession, _>(&table, id)?.into_iter().collect()),
                None => scan_json(&table),
            }
        })?;
        sessions.retain(|s| filter.matches(s));
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    /// Apply `patch` to every matching session. Returns how many matched.
    pub fn update(&self, filter: &SessionFilter, patch: &SessionPatch) -> StoreResult<usize> {
        self.db.write(|txn| {
            let mut table = txn.open_table(SESSIONS)?;
            let candidates: Vec<StoredSession> = match &filter.id {
                Some(id) => get_json::<StoredSession, _>(&table, id)?.into_iter().collect(),
                None => scan_json(&table)?,
            };

            let now = Utc::now();
            let mut matched = 0;
            for mut session in candidates.into_iter().filter(|s| filter.matches(s)) {
                if let Some(valid) = patch.valid {
                    session.valid = valid;
                }
                session.updated_at = now;
                put_json(&mut table, &session.id, &session)?;
                matched += 1;
            }
            Ok(matched)
        })
    }

    /// Remove every session of a user. Returns how many were removed.
    pub fn delete_by_user(&self, user_id: &str) -> StoreResult<usize> {
        self.db.write(|txn| {
            let mut table = txn.open_table(SESSIONS)?;
            let sessions: Vec<StoredSession> = scan_json(&table)?;
            let mut removed = 0;
            for session in sessions.iter().filter(|s| s.user_id == user_id) {
                table.remove(session.id.as_str())?;
                removed += 1;
            }
            Ok(removed)
        })
    }
}
