// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token transport over headers and cookies.
//!
//! - Access token: `accessToken` cookie or `Authorization: Bearer <token>`
//! - Refresh token: `refreshToken` cookie or `x-refresh` header
//! - A silently reissued access token is returned in `x-access-token`

use axum::http::{
    header::{AUTHORIZATION, COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};
use chrono::Duration;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";
pub const REFRESH_TOKEN_HEADER: &str = "x-refresh";
pub const NEW_ACCESS_TOKEN_HEADER: &str = "x-access-token";

/// Attributes shared by every auth cookie.
#[derive(Debug, Clone, Default)]
pub struct CookieOptions {
    pub domain: Option<String>,
    pub secure: bool,
}

impl CookieOptions {
    /// `Set-Cookie` value for an httpOnly cookie living `max_age`.
    pub fn build(&self, name: &str, value: &str, max_age: Duration) -> String {
        let mut cookie = format!(
            "{name}={value}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax",
            max_age.num_seconds().max(0)
        );
        if let Some(domain) = &self.domain {
            cookie.push_str("; Domain=");
            cookie.push_str(domain);
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// `Set-Cookie` value that removes a cookie.
    pub fn expire(&self, name: &str) -> String {
        self.build(name, "", Duration::zero())
    }
}

/// Append a `Set-Cookie` header, skipping values that are not valid header text.
pub fn append_set_cookie(headers: &mut HeaderMap, cookie: String) {
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            headers.append(SET_COOKIE, value);
        }
        Err(e) => tracing::warn!(error = %e, "dropping unencodable cookie"),
    }
}

/// Read a cookie value from the `Cookie` request headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Extract a `Bearer` token from the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Access token from cookie first, then the `Authorization` header.
pub fn access_token(headers: &HeaderMap) -> Option<String> {
    read_cookie(headers, ACCESS_TOKEN_COOKIE).or_else(|| bearer_token(headers))
}

/// Refresh token from cookie first, then the `x-refresh` header.
pub fn refresh_token(headers: &HeaderMap) -> Option<String> {
    read_cookie(headers, REFRESH_TOKEN_COOKIE).or_else(|| {
        headers
            .get(REFRESH_TOKEN_HEADER)?
            .to_str()
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_includes_security_attributes() {
        let options = CookieOptions {
            domain: Some("example.com".into()),
            secure: true,
        };
        let cookie = options.build(ACCESS_TOKEN_COOKIE, "abc", Duration::minutes(15));
        assert_eq!(
            cookie,
            "accessToken=abc; Max-Age=900; Path=/; HttpOnly; SameSite=Lax; Domain=example.com; Secure"
        );
    }

    #[test]
    fn expire_sets_zero_max_age() {
        let cookie = CookieOptions::default().expire(REFRESH_TOKEN_COOKIE);
        assert!(cookie.starts_with("refreshToken=; Max-Age=0;"));
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn tokens_prefer_cookies_over_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, "theme=dark; accessToken=from-cookie".parse().unwrap());
        headers.insert(AUTHORIZATION, "Bearer from-header".parse().unwrap());
        headers.insert(REFRESH_TOKEN_HEADER, "refresh-header".parse().unwrap());

        assert_eq!(access_token(&headers).as_deref(), Some("from-cookie"));
        assert_eq!(refresh_token(&headers).as_deref(), Some("refresh-header"));
    }

    #[test]
    fn bearer_requires_prefix() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Token abc".parse().unwrap());
        assert!(bearer_token(&headers).is_none());
        assert!(access_token(&headers).is_none());
    }

    #[test]
    fn empty_cookie_value_counts_as_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, "accessToken=; refreshToken=r1".parse().unwrap());
        assert!(read_cookie(&headers, ACCESS_TOKEN_COOKIE).is_none());
        assert_eq!(refresh_token(&headers).as_deref(), Some("r1"));
    }
}
