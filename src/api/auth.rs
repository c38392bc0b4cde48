// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Redirect,
    Extension, Json,
};

use super::sessions::{self, cleared_cookie_headers};
use super::validation::ValidJson;
use crate::auth::middleware::SessionEnded;
use crate::auth::OptionalAuth;
use crate::error::ApiError;
use crate::models::{
    ForgotPasswordRequest, LoginRequest, MessageResponse, RegisterRequest, ResetPasswordRequest,
    TokenPairResponse, UserResponse,
};
use crate::state::AppState;

/// Register an account and send the verification email.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = UserResponse),
        (status = 400, description = "Validation failed", body = crate::error::ErrorBody),
        (status = 409, description = "Email already in use", body = crate::error::ErrorBody)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let user = state
        .auth
        .create_account(&request.name, &request.email, &request.password)
        .await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Confirm an email address with the code from the verification link.
#[utoipa::path(
    post,
    path = "/api/auth/verify/{code}",
    tag = "Auth",
    params(("code" = String, Path, description = "Verification code")),
    responses(
        (status = 200, description = "Email verified", body = MessageResponse),
        (status = 400, description = "Invalid or expired code", body = crate::error::ErrorBody)
    )
)]
pub async fn verify_email(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.auth.verify_email(&code)?;
    Ok(Json(MessageResponse::new("Email was successfully verified")))
}

/// Log in with email and password.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 201, description = "Logged in", body = TokenPairResponse),
        (status = 401, description = "Invalid email or password", body = crate::error::ErrorBody),
        (status = 403, description = "Email not verified", body = crate::error::ErrorBody),
        (status = 429, description = "Too many login attempts", body = crate::error::ErrorBody)
    )
)]
pub async fn login(
    state: State<AppState>,
    headers: HeaderMap,
    request: ValidJson<LoginRequest>,
) -> Result<(StatusCode, HeaderMap, Json<TokenPairResponse>), ApiError> {
    sessions::create_session(state, headers, request).await
}

/// Request a password reset email.
///
/// The answer is the same whether or not the email is registered.
#[utoipa::path(
    post,
    path = "/api/auth/password/forgot",
    tag = "Auth",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Request accepted", body = MessageResponse),
        (status = 429, description = "A reset email was sent recently", body = crate::error::ErrorBody)
    )
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let message = state.auth.send_password_reset_email(&request.email).await?;
    Ok(Json(MessageResponse::new(message)))
}

/// Set a new password with a reset code. Signs the user out everywhere.
#[utoipa::path(
    post,
    path = "/api/auth/password/reset",
    tag = "Auth",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Invalid or expired code", body = crate::error::ErrorBody)
    )
)]
pub async fn reset_password(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<ResetPasswordRequest>,
) -> Result<(Extension<SessionEnded>, HeaderMap, Json<MessageResponse>), ApiError> {
    state
        .auth
        .reset_password(&request.verification_code, &request.password)?;
    Ok((
        Extension(SessionEnded),
        cleared_cookie_headers(&state),
        Json(MessageResponse::new("Password reset successful")),
    ))
}

/// Invalidate the current session, if any, and clear the auth cookies.
#[utoipa::path(
    get,
    path = "/api/auth/logout",
    tag = "Auth",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse)
    )
)]
pub async fn logout(
    OptionalAuth(user): OptionalAuth,
    State(state): State<AppState>,
) -> Result<(Extension<SessionEnded>, HeaderMap, Json<MessageResponse>), ApiError> {
    if let Some(user) = user {
        state.auth.logout(&user.session_id)?;
    }
    Ok((
        Extension(SessionEnded),
        cleared_cookie_headers(&state),
        Json(MessageResponse::new("Logout successful")),
    ))
}

/// Redirect to the Google consent screen.
#[utoipa::path(
    get,
    path = "/api/auth/google",
    tag = "Auth",
    responses(
        (status = 303, description = "Redirect to Google"),
        (status = 503, description = "Google login not configured", body = crate::error::ErrorBody)
    )
)]
pub async fn google_consent(State(state): State<AppState>) -> Result<Redirect, ApiError> {
    let google = state
        .google
        .as_deref()
        .ok_or_else(|| ApiError::external("Google login is not configured"))?;
    let url = google.consent_url().map_err(|e| {
        tracing::error!(error = %e, "failed to build google consent url");
        ApiError::internal()
    })?;
    Ok(Redirect::to(&url))
}
