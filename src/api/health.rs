// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Body of `/healthcheck`.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok", or "degraded" when the database is unreachable.
    pub status: String,
    pub checks: HealthChecks,
}

/// Per-component status.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthChecks {
    pub service: String,
    /// Whether the database answers reads.
    pub database: String,
    /// Image uploads ("ok" or "disabled").
    pub image_host: String,
    /// Google login ("ok" or "disabled").
    pub google_oauth: String,
}

fn enabled(flag: bool) -> String {
    if flag { "ok" } else { "disabled" }.to_string()
}

/// Returns 200 while the database is reachable, 503 otherwise. Optional
/// integrations that are switched off do not degrade the status.
#[utoipa::path(
    get,
    path = "/healthcheck",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse)
    )
)]
pub async fn healthcheck(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database_ok = state.db.is_healthy();

    let response = HealthResponse {
        status: if database_ok { "ok" } else { "degraded" }.to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            database: if database_ok { "ok" } else { "unavailable" }.to_string(),
            image_host: enabled(state.images.is_some()),
            google_oauth: enabled(state.google.is_some()),
        },
    };

    let status = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_app, test_state};

    #[tokio::test]
    async fn healthy_with_all_integrations() {
        let app = test_app();
        let (status, Json(body)) = healthcheck(State(app.state.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ok");
        assert_eq!(body.checks.database, "ok");
        assert_eq!(body.checks.image_host, "ok");
    }

    #[tokio::test]
    async fn missing_integrations_do_not_degrade() {
        let (state, _dir) = test_state();
        let (status, Json(body)) = healthcheck(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.checks.image_host, "disabled");
        assert_eq!(body.checks.google_oauth, "disabled");
    }
}
