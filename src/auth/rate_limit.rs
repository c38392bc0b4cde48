// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fixed-window request limiting per client address.
//!
//! Windows live in an in-process LRU so memory stays bounded however many
//! clients show up. Limits are per instance.

use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use lru::LruCache;

use crate::error::ApiError;

/// Max number of client windows tracked per limiter.
const DEFAULT_CAPACITY: usize = 10_000;

const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

struct Window {
    started_at: Instant,
    hits: u32,
}

/// Allows `max_requests` per client within each `window`.
pub struct RateLimiter {
    windows: Mutex<LruCache<String, Window>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self::with_capacity(max_requests, window, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(max_requests: u32, window: Duration, capacity: usize) -> Self {
        Self {
            windows: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            max_requests,
            window,
        }
    }

    /// Global API limit: 100 requests per 15 minutes.
    pub fn global() -> Self {
        Self::new(100, Duration::from_secs(15 * 60))
    }

    /// Login attempts: 5 per 5 minutes.
    pub fn login() -> Self {
        Self::new(5, Duration::from_secs(5 * 60))
    }

    /// Password reset requests: 1 per minute.
    pub fn password_reset() -> Self {
        Self::new(1, Duration::from_secs(60))
    }

    /// Record a hit for `client`. Returns `false` once the window is spent.
    pub fn check(&self, client: &str) -> bool {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: &str, now: Instant) -> bool {
        let Ok(mut windows) = self.windows.lock() else {
            // A poisoned lock only means another request panicked mid-update
            return true;
        };

        match windows.get_mut(client) {
            Some(window) if now.duration_since(window.started_at) < self.window => {
                window.hits += 1;
                window.hits <= self.max_requests
            }
            _ => {
                windows.put(
                    client.to_string(),
                    Window {
                        started_at: now,
                        hits: 1,
                    },
                );
                self.max_requests > 0
            }
        }
    }
}

/// Best-effort client address: socket peer, then `X-Forwarded-For`.
pub fn client_key(request: &Request) -> String {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    request
        .headers()
        .get(FORWARDED_FOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware rejecting requests over the limiter's budget with 429.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_key(&request);
    if !limiter.check(&client) {
        tracing::info!(client = %client, path = %request.uri().path(), "rate limited");
        return ApiError::too_many_requests().into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    #[test]
    fn allows_up_to_max_then_blocks() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.check("1.2.3.4"));
        assert!(limiter.check("1.2.3.4"));
        assert!(!limiter.check("1.2.3.4"));
        // Other clients are unaffected
        assert!(limiter.check("5.6.7.8"));
    }

    #[test]
    fn window_resets_after_expiry() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();
        assert!(limiter.check_at("c", start));
        assert!(!limiter.check_at("c", start + Duration::from_secs(30)));
        assert!(limiter.check_at("c", start + Duration::from_secs(61)));
    }

    #[test]
    fn client_key_prefers_socket_then_forwarded_header() {
        let request = Request::builder()
            .header("x-forwarded-for", "9.9.9.9, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_key(&request), "9.9.9.9");

        let mut request = Request::builder()
            .header("x-forwarded-for", "9.9.9.9")
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4004))));
        assert_eq!(client_key(&request), "127.0.0.1");

        let request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_key(&request), "unknown");
    }

    #[tokio::test]
    async fn middleware_answers_429() {
        let limiter = Arc::new(RateLimiter::new(1, Duration::from_secs(60)));
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(limiter, rate_limit));

        let first = app
            .clone()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = axum::body::to_bytes(second.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["codeName"], "TOO_MANY_REQUESTS");
        assert_eq!(json["message"], "Too many requests! Try again later.");
    }
}
