// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared fixtures for unit and router tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Duration;
use tempfile::TempDir;

use crate::auth::google::{GoogleProfile, OAuthError, OAuthProvider};
use crate::auth::password::hash_password;
use crate::auth::service::IssuedTokens;
use crate::auth::{AuthService, AuthSettings, Role, TokenCodec};
use crate::images::{ImageHost, ImageHostError, ImageUpload};
use crate::mail::{Email, MailError, Mailer};
use crate::state::AppState;
use crate::storage::{Database, StoredUser, UserRepository};

pub const PRIVATE_KEY: &str = include_str!("auth/testdata/private.pem");
pub const PUBLIC_KEY: &str = include_str!("auth/testdata/public.pem");

pub const ORIGIN: &str = "http://localhost:3000";
pub const PASSWORD: &str = "secret1";

/// Keeps every message instead of sending it.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
    fail_next: AtomicBool,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }

    /// Make the next send fail.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Code embedded in the link of the last message.
    pub fn last_code(&self) -> Option<String> {
        let text = self.sent.lock().unwrap().last()?.text.clone();
        if let Some((_, rest)) = text.split_once("/email/verify/") {
            return rest.split_whitespace().next().map(str::to_string);
        }
        let (_, rest) = text.split_once("code=")?;
        rest.split('&').next().map(str::to_string)
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(MailError::Address(lettre::address::AddressError::MissingParts));
        }
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

/// Accepts every upload and answers a predictable URL.
#[derive(Default)]
pub struct StubImageHost {
    uploads: Mutex<Vec<String>>,
}

impl StubImageHost {
    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageHost for StubImageHost {
    async fn upload(&self, _image: ImageUpload, public_id: &str) -> Result<String, ImageHostError> {
        self.uploads.lock().unwrap().push(public_id.to_string());
        Ok(format!("https://images.test/{public_id}.png"))
    }
}

/// Google stand-in returning a fixed profile.
pub struct StubGoogle(pub GoogleProfile);

#[async_trait]
impl OAuthProvider for StubGoogle {
    fn consent_url(&self) -> Result<String, OAuthError> {
        Ok("https://accounts.google.com/o/oauth2/v2/auth?client_id=test".to_string())
    }

    async fn fetch_profile(&self, code: &str) -> Result<GoogleProfile, OAuthError> {
        if code == "bad" {
            return Err(OAuthError::Status {
                status: 400,
                body: "invalid_grant".to_string(),
            });
        }
        Ok(self.0.clone())
    }
}

pub fn test_settings() -> AuthSettings {
    AuthSettings {
        access_token_ttl: Duration::minutes(15),
        refresh_token_ttl: Duration::days(365),
        origin: ORIGIN.to_string(),
        email_sender: "noreply@coinllector.test".to_string(),
    }
}

pub fn test_codec() -> TokenCodec {
    TokenCodec::from_pem(PRIVATE_KEY.as_bytes(), PUBLIC_KEY.as_bytes()).unwrap()
}

pub fn test_database() -> (Arc<Database>, TempDir) {
    let dir = TempDir::new().unwrap();
    let db = Database::open(&dir.path().join("test.redb")).unwrap();
    (Arc::new(db), dir)
}

pub fn test_auth_service() -> (AuthService, Arc<RecordingMailer>, Arc<Database>, TempDir) {
    let (db, dir) = test_database();
    let mailer = Arc::new(RecordingMailer::default());
    let service = AuthService::new(db.clone(), test_codec(), mailer.clone(), test_settings());
    (service, mailer, db, dir)
}

/// A full application state wired to in-process stand-ins.
pub struct TestApp {
    pub state: AppState,
    pub mailer: Arc<RecordingMailer>,
    pub images: Arc<StubImageHost>,
    _dir: TempDir,
}

pub fn test_app() -> TestApp {
    let (auth, mailer, db, dir) = test_auth_service();
    let images = Arc::new(StubImageHost::default());
    let google = Arc::new(StubGoogle(GoogleProfile {
        email: "google.user@gmail.com".to_string(),
        verified_email: true,
        name: "Google User".to_string(),
        picture: Some("https://lh3.googleusercontent.com/a/pic".to_string()),
    }));
    let state = AppState::new(db, auth, ORIGIN)
        .with_images(images.clone())
        .with_google(google);
    TestApp {
        state,
        mailer,
        images,
        _dir: dir,
    }
}

pub fn test_state() -> (AppState, TempDir) {
    let (auth, _mailer, db, dir) = test_auth_service();
    (AppState::new(db, auth, ORIGIN), dir)
}

/// Insert a verified user with [`PASSWORD`] and the given role.
pub fn verified_user(state: &AppState, email: &str, role: Role) -> StoredUser {
    let mut user = StoredUser::new("Tester", email, Some(hash_password(PASSWORD).unwrap()));
    user.email_verified = true;
    user.role = role;
    UserRepository::new(&state.db).create(&user).unwrap();
    user
}

/// Verified application user, logged in once.
pub fn login_fixture(state: &AppState, email: &str) -> IssuedTokens {
    login_as(state, email, Role::ApplicationUser)
}

pub fn login_as(state: &AppState, email: &str, role: Role) -> IssuedTokens {
    verified_user(state, email, role);
    state.auth.login_user(email, PASSWORD, "test-agent").unwrap()
}
