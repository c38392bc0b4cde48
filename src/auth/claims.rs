// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token claims and authenticated user representation.

use serde::{Deserialize, Serialize};

use super::roles::Permission;
use crate::storage::StoredUser;

/// Which of the two token flavours a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims carried by access and refresh tokens.
///
/// Only the safe profile fields of a user are embedded. Password hash,
/// role, and verification state stay server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id.
    pub sub: String,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pfp: Option<String>,
    #[serde(default)]
    pub coins: Vec<String>,
    /// Permission strings derived from the role at issuance.
    pub scopes: Vec<String>,
    /// Session id.
    pub session: String,
    pub kind: TokenKind,
}

impl SessionClaims {
    pub fn for_user(user: &StoredUser, session_id: &str, kind: TokenKind) -> Self {
        Self {
            sub: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            pfp: user.pfp.clone(),
            coins: user.coins.clone(),
            scopes: user.role.scopes(),
            session: session_id.to_string(),
            kind,
        }
    }
}

/// Identity attached to a request once its access token verified.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub session_id: String,
    pub scopes: Vec<String>,
}

impl AuthenticatedUser {
    pub fn from_claims(claims: SessionClaims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            name: claims.name,
            session_id: claims.session,
            scopes: claims.scopes,
        }
    }

    /// Check a permission against the scopes embedded in the token.
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.scopes.iter().any(|s| s == permission.as_str())
    }
}
