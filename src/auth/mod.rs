// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Self-issued RS256 tokens bound to server-side sessions.
//!
//! ## Auth Flow
//!
//! 1. `POST /api/sessions` checks credentials and opens a session
//! 2. The server signs an access token and a refresh token carrying the
//!    session id and the user's scopes, and sets both as httpOnly cookies
//! 3. On every request the identity middleware:
//!    - reads the access token (cookie, then `Authorization: Bearer`)
//!    - verifies it against the public key
//!    - if it has expired, reissues it from the refresh token while the
//!      session is still valid
//! 4. Route guards check the scopes embedded in the access token
//!
//! ## Security
//!
//! - Passwords are hashed with Argon2
//! - Logging out invalidates the session, which stops any further refresh
//! - Password reset deletes every session of the user
//! - Clock skew tolerance is 60 seconds

pub mod claims;
pub mod cookies;
pub mod extractor;
pub mod google;
pub mod middleware;
pub mod password;
pub mod rate_limit;
pub mod roles;
pub mod service;
pub mod tokens;

pub use claims::{AuthenticatedUser, SessionClaims, TokenKind};
pub use extractor::{Auth, OptionalAuth, RequirePermission};
pub use google::{GoogleOAuth, OAuthProvider};
pub use rate_limit::RateLimiter;
pub use roles::{Permission, Role};
pub use service::{AuthService, AuthSettings, Authentication};
pub use tokens::TokenCodec;
