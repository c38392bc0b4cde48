// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity middleware.
//!
//! Runs on every request. Resolves the caller from the access token (cookie
//! or `Authorization` header) and stores an [`AuthenticatedUser`] in the
//! request extensions. It never rejects a request: missing, forged, or
//! unrefreshable credentials leave the request anonymous and the route
//! guards decide.
//!
//! When the access token has expired and the refresh token still maps to a
//! valid session, a new access token is minted and returned both in the
//! `x-access-token` header and as the `accessToken` cookie, unless the
//! handler ended the session (see [`SessionEnded`]).

use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};

use super::cookies::{self, ACCESS_TOKEN_COOKIE, NEW_ACCESS_TOKEN_HEADER};
use super::service::Authentication;
use crate::state::AppState;

/// Response extension set by handlers that end the caller's session.
///
/// Suppresses the reissued access token so a logout cannot hand out a live
/// token on its way back.
#[derive(Debug, Clone, Copy)]
pub struct SessionEnded;

pub async fn deserialize_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let access = cookies::access_token(request.headers());
    let refresh = cookies::refresh_token(request.headers());

    let reissued = match state
        .auth
        .authenticate(access.as_deref(), refresh.as_deref())
    {
        Authentication::Anonymous => None,
        Authentication::Verified(user) => {
            request.extensions_mut().insert(user);
            None
        }
        Authentication::Refreshed { user, access_token } => {
            request.extensions_mut().insert(user);
            Some(access_token)
        }
    };

    let mut response = next.run(request).await;

    if response.extensions().get::<SessionEnded>().is_some() {
        return response;
    }

    if let Some(token) = reissued {
        let headers = response.headers_mut();
        match HeaderValue::from_str(&token) {
            Ok(value) => {
                headers.insert(NEW_ACCESS_TOKEN_HEADER, value);
            }
            Err(e) => tracing::warn!(error = %e, "reissued token is not a valid header value"),
        }
        let ttl = state.auth.settings().access_token_ttl;
        cookies::append_set_cookie(
            headers,
            state.cookies.build(ACCESS_TOKEN_COOKIE, &token, ttl),
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header::SET_COOKIE, Request, StatusCode},
        routing::get,
        Extension, Router,
    };
    use chrono::Duration;
    use tower::ServiceExt;

    use super::*;
    use crate::auth::claims::{AuthenticatedUser, SessionClaims, TokenKind};
    use crate::auth::OptionalAuth;
    use crate::test_support::{login_fixture, test_state};

    async fn whoami(OptionalAuth(user): OptionalAuth) -> String {
        user.map(|u| u.user_id).unwrap_or_else(|| "anonymous".into())
    }

    fn app(state: AppState) -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                deserialize_user,
            ))
            .with_state(state)
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn anonymous_without_credentials() {
        let (state, _dir) = test_state();
        let response = app(state)
            .oneshot(Request::get("/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "anonymous");
    }

    #[tokio::test]
    async fn bearer_token_identifies_user() {
        let (state, _dir) = test_state();
        let login = login_fixture(&state, "a@b.com");

        let response = app(state)
            .oneshot(
                Request::get("/whoami")
                    .header("Authorization", format!("Bearer {}", login.access_token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.headers().get(NEW_ACCESS_TOKEN_HEADER).is_none());
        assert_eq!(body_text(response).await, login.user.id);
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_from_cookie() {
        let (state, _dir) = test_state();
        let login = login_fixture(&state, "a@b.com");
        let claims = SessionClaims::for_user(&login.user, &login.session.id, TokenKind::Access);
        let expired = state
            .auth
            .codec()
            .sign(&claims, Duration::minutes(-10))
            .unwrap();

        let response = app(state)
            .oneshot(
                Request::get("/whoami")
                    .header(
                        "Cookie",
                        format!("accessToken={expired}; refreshToken={}", login.refresh_token),
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.headers().get(NEW_ACCESS_TOKEN_HEADER).is_some());
        let cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("accessToken="));
        assert_eq!(body_text(response).await, login.user.id);
    }

    #[tokio::test]
    async fn ended_session_suppresses_reissued_token() {
        let (state, _dir) = test_state();
        let login = login_fixture(&state, "a@b.com");
        let claims = SessionClaims::for_user(&login.user, &login.session.id, TokenKind::Access);
        let expired = state
            .auth
            .codec()
            .sign(&claims, Duration::minutes(-10))
            .unwrap();

        async fn sign_out() -> (Extension<SessionEnded>, &'static str) {
            (Extension(SessionEnded), "bye")
        }
        let router = Router::new()
            .route("/bye", get(sign_out))
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                deserialize_user,
            ))
            .with_state(state);

        let response = router
            .oneshot(
                Request::get("/bye")
                    .header(
                        "Cookie",
                        format!("accessToken={expired}; refreshToken={}", login.refresh_token),
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(NEW_ACCESS_TOKEN_HEADER).is_none());
        assert!(response.headers().get(SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn forged_token_stays_anonymous() {
        let (state, _dir) = test_state();
        let response = app(state)
            .oneshot(
                Request::get("/whoami")
                    .header("Authorization", "Bearer not.a.token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "anonymous");
    }

    #[tokio::test]
    async fn user_lands_in_extensions() {
        let (state, _dir) = test_state();
        let login = login_fixture(&state, "a@b.com");

        async fn ext(Extension(user): Extension<AuthenticatedUser>) -> String {
            user.session_id
        }
        let router = Router::new()
            .route("/ext", get(ext))
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                deserialize_user,
            ))
            .with_state(state);

        let response = router
            .oneshot(
                Request::get("/ext")
                    .header("Authorization", format!("Bearer {}", login.access_token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_text(response).await, login.session.id);
    }
}
