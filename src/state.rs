// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared application state.

use std::sync::Arc;

use chrono::Duration;

use crate::auth::cookies::CookieOptions;
use crate::auth::{AuthService, OAuthProvider, RateLimiter};
use crate::images::ImageHost;
use crate::storage::Database;

/// Per-route request limiters.
#[derive(Clone)]
pub struct RateLimits {
    pub global: Arc<RateLimiter>,
    pub login: Arc<RateLimiter>,
    pub password_reset: Arc<RateLimiter>,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            global: Arc::new(RateLimiter::global()),
            login: Arc::new(RateLimiter::login()),
            password_reset: Arc::new(RateLimiter::password_reset()),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub auth: Arc<AuthService>,
    /// Image host; uploads answer 503 without one.
    pub images: Option<Arc<dyn ImageHost>>,
    /// Google OAuth; the Google routes answer 503 without one.
    pub google: Option<Arc<dyn OAuthProvider>>,
    pub cookies: CookieOptions,
    pub limits: RateLimits,
    /// Frontend origin, target of OAuth redirects.
    pub origin: String,
}

impl AppState {
    pub fn new(db: Arc<Database>, auth: AuthService, origin: impl Into<String>) -> Self {
        Self {
            db,
            auth: Arc::new(auth),
            images: None,
            google: None,
            cookies: CookieOptions::default(),
            limits: RateLimits::default(),
            origin: origin.into(),
        }
    }

    pub fn with_images(mut self, images: Arc<dyn ImageHost>) -> Self {
        self.images = Some(images);
        self
    }

    pub fn with_google(mut self, google: Arc<dyn OAuthProvider>) -> Self {
        self.google = Some(google);
        self
    }

    pub fn with_cookies(mut self, cookies: CookieOptions) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn with_limits(mut self, limits: RateLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn access_token_ttl(&self) -> Duration {
        self.auth.settings().access_token_ttl
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        self.auth.settings().refresh_token_ttl
    }
}
