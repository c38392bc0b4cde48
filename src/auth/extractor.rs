// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for route guards.
//!
//! The identity middleware has already resolved the caller; these extractors
//! only read the result from the request extensions.
//!
//! ```rust,ignore
//! async fn me(Auth(user): Auth) -> impl IntoResponse { /* 401 if anonymous */ }
//!
//! async fn create_coin(
//!     RequirePermission(user, ..): RequirePermission<CoinsWrite>,
//! ) -> impl IntoResponse { /* 403 without coins:write */ }
//! ```

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};

use super::{AuthenticatedUser, Permission};
use crate::error::ApiError;

/// Extractor for authenticated users. Rejects anonymous callers with 401.
pub struct Auth(pub AuthenticatedUser);

impl<S: Send + Sync> FromRequestParts<S> for Auth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .map(Auth)
            .ok_or_else(ApiError::unauthorized)
    }
}

/// Optional authentication extractor. Never rejects.
pub struct OptionalAuth(pub Option<AuthenticatedUser>);

impl<S: Send + Sync> FromRequestParts<S> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(parts.extensions.get::<AuthenticatedUser>().cloned()))
    }
}

/// Names the permission a [`RequirePermission`] guard checks.
pub trait RequiredPermission {
    const PERMISSION: Permission;
}

macro_rules! permission_markers {
    ($($marker:ident => $permission:ident),* $(,)?) => {
        $(
            pub struct $marker;

            impl RequiredPermission for $marker {
                const PERMISSION: Permission = Permission::$permission;
            }
        )*
    };
}

permission_markers! {
    CoinsWrite => CoinsWrite,
    CoinsUpdate => CoinsUpdate,
    CoinsDelete => CoinsDelete,
    CountriesWrite => CountriesWrite,
    CountriesUpdate => CountriesUpdate,
    CountriesDelete => CountriesDelete,
}

/// Extractor that requires a permission among the caller's token scopes.
///
/// Anonymous callers get 401, callers without the scope get 403.
pub struct RequirePermission<P>(pub AuthenticatedUser, pub PhantomData<P>);

impl<S, P> FromRequestParts<S> for RequirePermission<P>
where
    S: Send + Sync,
    P: RequiredPermission,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        if !user.has_permission(P::PERMISSION) {
            tracing::info!(
                user_id = %user.user_id,
                permission = %P::PERMISSION,
                "permission denied"
            );
            return Err(ApiError::forbidden());
        }

        Ok(RequirePermission(user, PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    fn parts() -> Parts {
        Request::builder()
            .uri("/test")
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    fn user(scopes: &[&str]) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: "user_123".to_string(),
            email: "a@b.com".to_string(),
            name: "A".to_string(),
            session_id: "session_1".to_string(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn auth_rejects_anonymous() {
        let mut parts = parts();
        let err = Auth::from_request_parts(&mut parts, &()).await.err().unwrap();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn auth_reads_extensions() {
        let mut parts = parts();
        parts.extensions.insert(user(&["coins:read"]));
        let Auth(found) = Auth::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(found.user_id, "user_123");
    }

    #[tokio::test]
    async fn optional_auth_returns_none_without_user() {
        let mut parts = parts();
        let OptionalAuth(found) = OptionalAuth::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn permission_guard_checks_scopes() {
        let mut parts = parts();
        parts.extensions.insert(user(&["coins:read"]));
        let err = RequirePermission::<CoinsWrite>::from_request_parts(&mut parts, &())
            .await
            .err()
            .unwrap();
        assert_eq!(err.status, StatusCode::FORBIDDEN);

        let mut parts = self::parts();
        parts.extensions.insert(user(&["coins:read", "coins:write"]));
        assert!(RequirePermission::<CoinsWrite>::from_request_parts(&mut parts, &())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn permission_guard_rejects_anonymous_with_401() {
        let mut parts = parts();
        let err = RequirePermission::<CountriesDelete>::from_request_parts(&mut parts, &())
            .await
            .err()
            .unwrap();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }
}
