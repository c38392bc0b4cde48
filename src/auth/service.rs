// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Auth Service
//!
//! Orchestrates the account lifecycle on top of the stores and the token
//! codec.
//!
//! ## Account States
//!
//! ```text
//! unregistered --createAccount--> registered (unverified) --verifyEmail--> verified
//! ```
//!
//! Only verified accounts may log in. Password reset is orthogonal to
//! verification state.
//!
//! ## Tokens
//!
//! Login opens a session and issues an access token and a refresh token,
//! both bound to the session id. An expired access token is reissued from a
//! refresh token only while its session is still valid. Scopes are
//! re-derived from the user's current role on every reissue.

use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{Duration, Utc};

use super::claims::{AuthenticatedUser, SessionClaims, TokenKind};
use super::google::OAuthProvider;
use super::password::{hash_password, verify_password};
use super::tokens::{TokenCodec, Verification};
use crate::error::{ApiError, ErrorCode};
use crate::mail::{self, Mailer};
use crate::storage::{
    CodeKind, Database, SessionFilter, SessionPatch, SessionRepository, StoreError,
    StoredSession, StoredUser, UserRepository, VerificationCodeRepository,
};

/// Lifetime of an email verification code.
const EMAIL_VERIFICATION_TTL_DAYS: i64 = 365;
/// Lifetime of a password reset code.
const PASSWORD_RESET_TTL_HOURS: i64 = 1;
/// Minimum spacing between two reset codes of one user.
const PASSWORD_RESET_WINDOW_MINUTES: i64 = 5;

/// Answer to every password reset request, whether or not the user exists.
pub const PASSWORD_RESET_MESSAGE: &str =
    "If a user with that email is registered you will receive a password reset email";

/// Tunables of the auth service.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    /// Frontend origin, used in email links.
    pub origin: String,
    pub email_sender: String,
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub session: StoredSession,
    pub user: StoredUser,
}

/// Identity resolved from request credentials.
#[derive(Debug, Clone, PartialEq)]
pub enum Authentication {
    Anonymous,
    /// The access token verified.
    Verified(AuthenticatedUser),
    /// The access token expired and a new one was minted from the refresh token.
    Refreshed {
        user: AuthenticatedUser,
        access_token: String,
    },
}

pub struct AuthService {
    db: Arc<Database>,
    codec: TokenCodec,
    mailer: Arc<dyn Mailer>,
    settings: AuthSettings,
}

impl AuthService {
    pub fn new(
        db: Arc<Database>,
        codec: TokenCodec,
        mailer: Arc<dyn Mailer>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            db,
            codec,
            mailer,
            settings,
        }
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    fn users(&self) -> UserRepository<'_> {
        UserRepository::new(&self.db)
    }

    fn sessions(&self) -> SessionRepository<'_> {
        SessionRepository::new(&self.db)
    }

    fn codes(&self) -> VerificationCodeRepository<'_> {
        VerificationCodeRepository::new(&self.db)
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register an unverified account and email it a verification link.
    pub async fn create_account(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<StoredUser, ApiError> {
        let email_in_use = || ApiError::conflict(ErrorCode::EmailInUse, "Email already in use");

        if self.users().find_by_email(email)?.is_some() {
            return Err(email_in_use());
        }

        let user = StoredUser::new(name.trim(), email, Some(hash_password(password)?));
        match self.users().create(&user) {
            Ok(()) => {}
            Err(StoreError::AlreadyExists { .. }) => return Err(email_in_use()),
            Err(e) => return Err(e.into()),
        }

        let code = self.codes().create(
            &user.id,
            CodeKind::EmailVerification,
            Duration::days(EMAIL_VERIFICATION_TTL_DAYS),
        )?;
        tracing::info!(user_id = %user.id, "account created");

        let link = mail::verification_link(&self.settings.origin, &code.id);
        let message =
            mail::verification_email(&self.settings.email_sender, &user.email, &user.name, &link);
        self.deliver(message).await;

        Ok(user)
    }

    /// Mark the owner of `code` as verified. The code is single-use.
    pub fn verify_email(&self, code: &str) -> Result<StoredUser, ApiError> {
        let invalid = || ApiError::bad_request("Invalid or expired verification code");

        let code = self
            .codes()
            .consume(code, CodeKind::EmailVerification, Utc::now())?
            .ok_or_else(invalid)?;
        let user = match self.users().modify(&code.user_id, |u| u.email_verified = true) {
            Ok(user) => user,
            Err(StoreError::NotFound { .. }) => return Err(invalid()),
            Err(e) => return Err(e.into()),
        };
        tracing::info!(user_id = %user.id, "email verified");
        Ok(user)
    }

    // =========================================================================
    // Login and tokens
    // =========================================================================

    /// Check credentials, open a session and issue both tokens.
    pub fn login_user(
        &self,
        email: &str,
        password: &str,
        user_agent: &str,
    ) -> Result<IssuedTokens, ApiError> {
        let invalid = || {
            ApiError::new(
                StatusCode::UNAUTHORIZED,
                ErrorCode::InvalidCredentials,
                "Invalid email or password",
            )
        };

        let user = self.users().find_by_email(email)?.ok_or_else(invalid)?;
        let hash = user.password_hash.as_deref().ok_or_else(invalid)?;
        if !verify_password(password, hash) {
            tracing::info!(user_id = %user.id, "login rejected: wrong password");
            return Err(invalid());
        }

        if !user.email_verified {
            return Err(ApiError::new(
                StatusCode::FORBIDDEN,
                ErrorCode::EmailNotVerified,
                "Please verify your email",
            ));
        }

        let session = self.sessions().create(&user.id, user_agent)?;
        tracing::info!(user_id = %user.id, session_id = %session.id, "user logged in");
        self.issue_tokens(user, session)
    }

    /// Log in or sign up through Google.
    pub async fn google_login(
        &self,
        provider: &dyn OAuthProvider,
        code: &str,
        user_agent: &str,
    ) -> Result<IssuedTokens, ApiError> {
        let profile = provider.fetch_profile(code).await.map_err(|e| {
            tracing::warn!(error = %e, "google oauth exchange failed");
            ApiError::new(
                StatusCode::BAD_GATEWAY,
                ErrorCode::ExternalServiceError,
                "Failed to authorize with Google",
            )
        })?;

        if !profile.verified_email {
            return Err(ApiError::new(
                StatusCode::FORBIDDEN,
                ErrorCode::Forbidden,
                "Google account is not verified",
            ));
        }

        let name = if profile.name.trim().is_empty() {
            profile.email.clone()
        } else {
            profile.name.clone()
        };
        let user = self
            .users()
            .upsert_verified(&profile.email, &name, profile.picture)?;
        let session = self.sessions().create(&user.id, user_agent)?;
        tracing::info!(user_id = %user.id, session_id = %session.id, "google login");
        self.issue_tokens(user, session)
    }

    fn issue_tokens(
        &self,
        user: StoredUser,
        session: StoredSession,
    ) -> Result<IssuedTokens, ApiError> {
        let access = SessionClaims::for_user(&user, &session.id, TokenKind::Access);
        let refresh = SessionClaims::for_user(&user, &session.id, TokenKind::Refresh);
        Ok(IssuedTokens {
            access_token: self.codec.sign(&access, self.settings.access_token_ttl)?,
            refresh_token: self.codec.sign(&refresh, self.settings.refresh_token_ttl)?,
            session,
            user,
        })
    }

    /// Mint a new access token from a refresh token.
    ///
    /// Returns `None` when the token is not a live refresh token or its
    /// session is gone or invalidated.
    pub fn reissue_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<(String, AuthenticatedUser)>, ApiError> {
        let claims = match self.codec.verify::<SessionClaims>(refresh_token) {
            Verification::Valid(claims) if claims.kind == TokenKind::Refresh => claims,
            _ => return Ok(None),
        };

        let session = match self.sessions().get(&claims.session)? {
            Some(session) if session.valid && session.user_id == claims.sub => session,
            _ => return Ok(None),
        };
        let Some(user) = self.users().find(&session.user_id)? else {
            return Ok(None);
        };

        let fresh = SessionClaims::for_user(&user, &session.id, TokenKind::Access);
        let token = self.codec.sign(&fresh, self.settings.access_token_ttl)?;
        tracing::debug!(user_id = %user.id, session_id = %session.id, "access token reissued");
        Ok(Some((token, AuthenticatedUser::from_claims(fresh))))
    }

    /// Resolve request credentials into an identity. Never fails.
    pub fn authenticate(&self, access: Option<&str>, refresh: Option<&str>) -> Authentication {
        let Some(access) = access else {
            return Authentication::Anonymous;
        };

        match self.codec.verify::<SessionClaims>(access) {
            Verification::Valid(claims) if claims.kind == TokenKind::Access => {
                Authentication::Verified(AuthenticatedUser::from_claims(claims))
            }
            Verification::Expired => {
                let Some(refresh) = refresh else {
                    return Authentication::Anonymous;
                };
                match self.reissue_access_token(refresh) {
                    Ok(Some((access_token, user))) => Authentication::Refreshed { user, access_token },
                    Ok(None) => Authentication::Anonymous,
                    Err(e) => {
                        tracing::warn!(error = %e, "token refresh failed");
                        Authentication::Anonymous
                    }
                }
            }
            _ => Authentication::Anonymous,
        }
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Valid sessions of a user, newest first.
    pub fn list_sessions(&self, user_id: &str) -> Result<Vec<StoredSession>, ApiError> {
        Ok(self
            .sessions()
            .find(&SessionFilter::default().user(user_id).valid(true))?)
    }

    /// Invalidate a session. Invalidating twice is harmless.
    pub fn logout(&self, session_id: &str) -> Result<usize, ApiError> {
        let changed = self.sessions().update(
            &SessionFilter::default().id(session_id),
            &SessionPatch::invalidate(),
        )?;
        tracing::info!(session_id = %session_id, "session invalidated");
        Ok(changed)
    }

    // =========================================================================
    // Password reset
    // =========================================================================

    /// Email a reset link if the address belongs to a user.
    ///
    /// The answer never reveals whether the user exists.
    pub async fn send_password_reset_email(&self, email: &str) -> Result<&'static str, ApiError> {
        let Some(user) = self.users().find_by_email(email)? else {
            tracing::debug!("password reset requested for unknown email");
            return Ok(PASSWORD_RESET_MESSAGE);
        };

        let now = Utc::now();
        if let Some(latest) = self.codes().latest_for_user(&user.id, CodeKind::PasswordReset)? {
            if now - latest.created_at < Duration::minutes(PASSWORD_RESET_WINDOW_MINUTES) {
                return Err(ApiError::too_many_requests());
            }
        }

        self.codes()
            .delete_for_user(&user.id, CodeKind::PasswordReset)?;
        let code = self.codes().create(
            &user.id,
            CodeKind::PasswordReset,
            Duration::hours(PASSWORD_RESET_TTL_HOURS),
        )?;

        let link = mail::password_reset_link(&self.settings.origin, &code.id, code.expires_at);
        let message =
            mail::password_reset_email(&self.settings.email_sender, &user.email, &user.name, &link);
        self.deliver(message).await;

        tracing::info!(user_id = %user.id, "password reset code issued");
        Ok(PASSWORD_RESET_MESSAGE)
    }

    /// Set a new password and sign the user out everywhere.
    pub fn reset_password(&self, code: &str, password: &str) -> Result<(), ApiError> {
        let invalid = || ApiError::bad_request("Invalid or expired password reset code");

        let code = self
            .codes()
            .consume(code, CodeKind::PasswordReset, Utc::now())?
            .ok_or_else(invalid)?;
        let hash = hash_password(password)?;
        let user = match self.users().modify(&code.user_id, |u| u.password_hash = Some(hash)) {
            Ok(user) => user,
            Err(StoreError::NotFound { .. }) => return Err(invalid()),
            Err(e) => return Err(e.into()),
        };
        let dropped = self.sessions().delete_by_user(&user.id)?;
        tracing::info!(user_id = %user.id, sessions = dropped, "password reset");
        Ok(())
    }

    async fn deliver(&self, message: mail::Email) {
        let to = message.to.clone();
        if let Err(e) = self.mailer.send(message).await {
            tracing::error!(error = %e, to = %to, "failed to send email");
        }
    }
}
