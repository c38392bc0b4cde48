// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Single-use verification codes for email confirmation and password reset.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::super::database::{
    get_json, put_json, scan_json, Database, StoreResult, VERIFICATION_CODES,
};

/// What a verification code authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CodeKind {
    EmailVerification,
    PasswordReset,
}

/// A stored verification code. The id is the secret embedded in links.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerificationCode {
    pub id: String,
    pub user_id: String,
    pub kind: CodeKind,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl VerificationCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Repository for verification codes.
pub struct VerificationCodeRepository<'a> {
    db: &'a Database,
}

impl<'a> VerificationCodeRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Issue a new code for `user_id` that lives for `ttl`.
    pub fn create(
        &self,
        user_id: &str,
        kind: CodeKind,
        ttl: Duration,
    ) -> StoreResult<VerificationCode> {
        let now = Utc::now();
        let code = VerificationCode {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            kind,
            created_at: now,
            expires_at: now + ttl,
        };

        self.db.write(|txn| {
            let mut table = txn.open_table(VERIFICATION_CODES)?;
            put_json(&mut table, &code.id, &code)
        })?;
        Ok(code)
    }

    pub fn get(&self, code_id: &str) -> StoreResult<Option<VerificationCode>> {
        self.db
            .read(|txn| get_json(&txn.open_table(VERIFICATION_CODES)?, code_id))
    }

    /// Most recently issued code of `kind` for a user.
    pub fn latest_for_user(
        &self,
        user_id: &str,
        kind: CodeKind,
    ) -> StoreResult<Option<VerificationCode>> {
        let codes: Vec<VerificationCode> = self
            .db
            .read(|txn| scan_json(&txn.open_table(VERIFICATION_CODES)?))?;
        Ok(codes
            .into_iter()
            .filter(|c| c.user_id == user_id && c.kind == kind)
            .max_by_key(|c| c.created_at))
    }

    /// Atomically take a live code of `kind`.
    ///
    /// Returns `None` when the code does not exist, is of another kind or
    /// has expired. Expired codes are removed on the way.
    pub fn consume(
        &self,
        code_id: &str,
        kind: CodeKind,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<VerificationCode>> {
        self.db.write(|txn| {
            let mut table = txn.open_table(VERIFICATION_CODES)?;
            let code: VerificationCode = match get_json(&table, code_id)? {
                Some(code) => code,
                None => return Ok(None),
            };
            if code.kind != kind {
                return Ok(None);
            }
            table.remove(code_id)?;
            if code.is_expired(now) {
                return Ok(None);
            }
            Ok(Some(code))
        })
    }

    /// Remove every code of `kind` belonging to a user.
    pub fn delete_for_user(&self, user_id: &str, kind: CodeKind) -> StoreResult<usize> {
        self.db.write(|txn| {
            let mut table = txn.open_table(VERIFICATION_CODES)?;
            let codes: Vec<VerificationCode> = scan_json(&table)?;
            let mut removed = 0;
            for code in codes
                .iter()
                .filter(|c| c.user_id == user_id && c.kind == kind)
            {
                table.remove(code.id.as_str())?;
                removed += 1;
            }
            Ok(removed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (Database, TempDir) {
        let dir = TempDir::new().unwrap();
        let db = Database::open(&dir.path().join("test.redb")).unwrap();
        (db, dir)
    }

    #[test]
    fn consume_is_single_use() {
        let (db, _dir) = setup();
        let repo = VerificationCodeRepository::new(&db);
        let code = repo
            .create("user-1", CodeKind::PasswordReset, Duration::hours(1))
            .unwrap();

        let taken = repo
            .consume(&code.id, CodeKind::PasswordReset, Utc::now())
            .unwrap();
        assert_eq!(taken, Some(code.clone()));
        assert!(repo
            .consume(&code.id, CodeKind::PasswordReset, Utc::now())
            .unwrap()
            .is_none());
    }

    #[test]
    fn consume_rejects_wrong_kind_without_deleting() {
        let (db, _dir) = setup();
        let repo = VerificationCodeRepository::new(&db);
        let code = repo
            .create("user-1", CodeKind::EmailVerification, Duration::days(365))
            .unwrap();

        assert!(repo
            .consume(&code.id, CodeKind::PasswordReset, Utc::now())
            .unwrap()
            .is_none());
        assert!(repo.get(&code.id).unwrap().is_some());
    }

    #[test]
    fn consume_drops_expired_codes() {
        let (db, _dir) = setup();
        let repo = VerificationCodeRepository::new(&db);
        let code = repo
            .create("user-1", CodeKind::PasswordReset, Duration::hours(1))
            .unwrap();

        let later = Utc::now() + Duration::hours(2);
        assert!(repo
            .consume(&code.id, CodeKind::PasswordReset, later)
            .unwrap()
            .is_none());
        assert!(repo.get(&code.id).unwrap().is_none());
    }

    #[test]
    fn latest_for_user_picks_newest_of_kind() {
        let (db, _dir) = setup();
        let repo = VerificationCodeRepository::new(&db);
        repo.create("user-1", CodeKind::PasswordReset, Duration::hours(1))
            .unwrap();
        let newer = repo
            .create("user-1", CodeKind::PasswordReset, Duration::hours(1))
            .unwrap();
        repo.create("user-1", CodeKind::EmailVerification, Duration::hours(1))
            .unwrap();

        let latest = repo
            .latest_for_user("user-1", CodeKind::PasswordReset)
            .unwrap()
            .unwrap();
        assert!(latest.created_at >= newer.created_at);
        assert_eq!(latest.kind, CodeKind::PasswordReset);
        assert!(repo
            .latest_for_user("user-2", CodeKind::PasswordReset)
            .unwrap()
            .is_none());

        assert_eq!(repo.delete_for_user("user-1", CodeKind::PasswordReset).unwrap(), 2);
    }
}
