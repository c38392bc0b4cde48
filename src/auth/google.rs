// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Google OAuth client.
//!
//! ## Flow
//!
//! 1. `/api/auth/google` redirects to the consent URL
//! 2. Google calls back `/api/sessions/oauth/google?code=...`
//! 3. The code is exchanged for tokens, then the profile is fetched
//! 4. The auth service upserts the user and opens a session

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::config::GoogleOAuthConfig;

const CONSENT_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v1/userinfo";
const SCOPES: &str =
    "https://www.googleapis.com/auth/userinfo.profile https://www.googleapis.com/auth/userinfo.email";

/// HTTP timeout for Google requests.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("google request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("google answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

/// Profile of the Google account that granted consent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GoogleProfile {
    pub email: String,
    #[serde(default)]
    pub verified_email: bool,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    id_token: String,
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// URL the browser is sent to for consent.
    fn consent_url(&self) -> Result<String, OAuthError>;

    /// Exchange an authorization code and load the account profile.
    async fn fetch_profile(&self, code: &str) -> Result<GoogleProfile, OAuthError>;
}

/// Google implementation of [`OAuthProvider`].
pub struct GoogleOAuth {
    client: reqwest::Client,
    config: GoogleOAuthConfig,
}

impl GoogleOAuth {
    pub fn new(config: GoogleOAuthConfig) -> Result<Self, OAuthError> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self { client, config })
    }
}

/// Turn a non-success response into [`OAuthError::Status`].
async fn check(response: reqwest::Response) -> Result<reqwest::Response, OAuthError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(OAuthError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl OAuthProvider for GoogleOAuth {
    fn consent_url(&self) -> Result<String, OAuthError> {
        let url = Url::parse_with_params(
            CONSENT_URL,
            &[
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("client_id", self.config.client_id.as_str()),
                ("access_type", "offline"),
                ("response_type", "code"),
                ("prompt", "consent"),
                ("scope", SCOPES),
            ],
        )?;
        Ok(url.to_string())
    }

    async fn fetch_profile(&self, code: &str) -> Result<GoogleProfile, OAuthError> {
        let params = [
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_url.as_str()),
            ("grant_type", "authorization_code"),
        ];
        let response = self.client.post(TOKEN_URL).form(&params).send().await?;
        let tokens: TokenResponse = check(response).await?.json().await?;

        let url = Url::parse_with_params(
            USERINFO_URL,
            &[("alt", "json"), ("access_token", tokens.access_token.as_str())],
        )?;
        let response = self
            .client
            .get(url)
            .bearer_auth(&tokens.id_token)
            .send()
            .await?;
        let profile: GoogleProfile = check(response).await?.json().await?;

        tracing::debug!(email = %profile.email, "fetched google profile");
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GoogleOAuth {
        GoogleOAuth::new(GoogleOAuthConfig {
            client_id: "client-123".into(),
            client_secret: "secret".into(),
            redirect_url: "http://localhost:4004/api/sessions/oauth/google".into(),
        })
        .unwrap()
    }

    #[test]
    fn consent_url_carries_client_and_scopes() {
        let url = Url::parse(&provider().consent_url().unwrap()).unwrap();
        assert_eq!(url.host_str(), Some("accounts.google.com"));

        let params: std::collections::HashMap<String, String> =
            url.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "client-123");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["prompt"], "consent");
        assert_eq!(
            params["redirect_uri"],
            "http://localhost:4004/api/sessions/oauth/google"
        );
        assert!(params["scope"].contains("userinfo.email"));
    }

    #[test]
    fn profile_parses_userinfo_payload() {
        let json = r#"{
            "id": "1", "email": "g@mail.com", "verified_email": true,
            "name": "Gee", "given_name": "G", "picture": "https://img/1", "locale": "en"
        }"#;
        let profile: GoogleProfile = serde_json::from_str(json).unwrap();
        assert!(profile.verified_email);
        assert_eq!(profile.picture.as_deref(), Some("https://img/1"));
    }
}
