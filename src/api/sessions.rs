// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Query, State},
    http::{header::USER_AGENT, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Extension, Json,
};

use super::validation::ValidJson;
use crate::auth::cookies::{self, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::auth::middleware::SessionEnded;
use crate::auth::service::IssuedTokens;
use crate::auth::Auth;
use crate::error::ApiError;
use crate::models::{ClearedTokensResponse, LoginRequest, OAuthCallbackQuery, TokenPairResponse};
use crate::state::AppState;
use crate::storage::StoredSession;

pub(crate) fn user_agent(headers: &HeaderMap) -> &str {
    headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

/// `Set-Cookie` headers for both tokens.
pub(crate) fn auth_cookie_headers(state: &AppState, issued: &IssuedTokens) -> HeaderMap {
    let mut headers = HeaderMap::new();
    cookies::append_set_cookie(
        &mut headers,
        state
            .cookies
            .build(ACCESS_TOKEN_COOKIE, &issued.access_token, state.access_token_ttl()),
    );
    cookies::append_set_cookie(
        &mut headers,
        state
            .cookies
            .build(REFRESH_TOKEN_COOKIE, &issued.refresh_token, state.refresh_token_ttl()),
    );
    headers
}

/// `Set-Cookie` headers removing both tokens.
pub(crate) fn cleared_cookie_headers(state: &AppState) -> HeaderMap {
    let mut headers = HeaderMap::new();
    cookies::append_set_cookie(&mut headers, state.cookies.expire(ACCESS_TOKEN_COOKIE));
    cookies::append_set_cookie(&mut headers, state.cookies.expire(REFRESH_TOKEN_COOKIE));
    headers
}

/// Log in with email and password.
///
/// Opens a session and returns both tokens, also set as httpOnly cookies.
#[utoipa::path(
    post,
    path = "/api/sessions",
    tag = "Sessions",
    request_body = LoginRequest,
    responses(
        (status = 201, description = "Session created", body = TokenPairResponse),
        (status = 400, description = "Validation failed", body = crate::error::ErrorBody),
        (status = 401, description = "Invalid email or password", body = crate::error::ErrorBody),
        (status = 403, description = "Email not verified", body = crate::error::ErrorBody),
        (status = 429, description = "Too many login attempts", body = crate::error::ErrorBody)
    )
)]
pub async fn create_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidJson(request): ValidJson<LoginRequest>,
) -> Result<(StatusCode, HeaderMap, Json<TokenPairResponse>), ApiError> {
    let issued = state
        .auth
        .login_user(&request.email, &request.password, user_agent(&headers))?;

    let cookies = auth_cookie_headers(&state, &issued);
    Ok((
        StatusCode::CREATED,
        cookies,
        Json(TokenPairResponse {
            access_token: issued.access_token,
            refresh_token: issued.refresh_token,
        }),
    ))
}

/// List the caller's valid sessions, newest first.
#[utoipa::path(
    get,
    path = "/api/sessions",
    tag = "Sessions",
    responses(
        (status = 200, description = "Valid sessions", body = Vec<StoredSession>),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_sessions(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<Vec<StoredSession>>, ApiError> {
    Ok(Json(state.auth.list_sessions(&user.user_id)?))
}

/// Invalidate the caller's current session and clear the auth cookies.
#[utoipa::path(
    delete,
    path = "/api/sessions",
    tag = "Sessions",
    responses(
        (status = 200, description = "Session invalidated", body = ClearedTokensResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_session(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<(Extension<SessionEnded>, HeaderMap, Json<ClearedTokensResponse>), ApiError> {
    state.auth.logout(&user.session_id)?;
    Ok((
        Extension(SessionEnded),
        cleared_cookie_headers(&state),
        Json(ClearedTokensResponse {
            access_token: None,
            refresh_token: None,
        }),
    ))
}

/// Google OAuth callback.
///
/// Sets the auth cookies and redirects to the frontend, or redirects to
/// `{ORIGIN}/oauth/error` on any failure.
#[utoipa::path(
    get,
    path = "/api/sessions/oauth/google",
    tag = "Sessions",
    params(OAuthCallbackQuery),
    responses(
        (status = 303, description = "Redirect to the frontend")
    )
)]
pub async fn google_oauth_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<OAuthCallbackQuery>,
) -> Response {
    let failure = || Redirect::to(&format!("{}/oauth/error", state.origin)).into_response();

    let Some(google) = state.google.as_deref() else {
        tracing::warn!("google callback hit without google oauth configured");
        return failure();
    };
    let Some(code) = query.code.filter(|c| !c.is_empty()) else {
        tracing::info!("google callback without code");
        return failure();
    };

    match state
        .auth
        .google_login(google, &code, user_agent(&headers))
        .await
    {
        Ok(issued) => (
            auth_cookie_headers(&state, &issued),
            Redirect::to(&state.origin),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to authorize google user");
            failure()
        }
    }
}
