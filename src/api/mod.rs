// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{
        cookies::{NEW_ACCESS_TOKEN_HEADER, REFRESH_TOKEN_HEADER},
        middleware::deserialize_user,
        rate_limit::rate_limit,
        Permission, Role,
    },
    error::{ErrorBody, ErrorCode, FieldIssue},
    images::UPLOAD_BODY_LIMIT,
    models::{
        ClearedTokensResponse, CoinIdRequest, CreateCoinRequest, CreateCountryForm,
        ForgotPasswordRequest, LoginRequest, MessageResponse, RegisterRequest,
        ResetPasswordRequest, TokenPairResponse, UpdateCoinRequest, UpdateCountryRequest,
        UserResponse,
    },
    state::AppState,
    storage::{CoinPeriod, CoinType, StoredCoin, StoredCountry, StoredSession},
};

pub mod auth;
pub mod coins;
pub mod countries;
pub mod health;
pub mod sessions;
pub mod users;
pub mod validation;

pub fn router(state: AppState) -> Router {
    let login_limit = middleware::from_fn_with_state(state.limits.login.clone(), rate_limit);
    let reset_limit =
        middleware::from_fn_with_state(state.limits.password_reset.clone(), rate_limit);
    let upload_limit = DefaultBodyLimit::max(UPLOAD_BODY_LIMIT);

    let api_routes = Router::new()
        .route("/healthcheck", get(health::healthcheck))
        // Auth
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/verify/{code}", post(auth::verify_email))
        .route(
            "/api/auth/login",
            post(auth::login).layer(login_limit.clone()),
        )
        .route(
            "/api/auth/password/forgot",
            post(auth::forgot_password).layer(reset_limit),
        )
        .route("/api/auth/password/reset", post(auth::reset_password))
        .route("/api/auth/logout", get(auth::logout))
        .route("/api/auth/google", get(auth::google_consent))
        // Sessions
        .route(
            "/api/sessions",
            post(sessions::create_session)
                .layer(login_limit)
                .get(sessions::list_sessions)
                .delete(sessions::delete_session),
        )
        .route(
            "/api/sessions/oauth/google",
            get(sessions::google_oauth_callback),
        )
        // Users
        .route(
            "/api/users/me",
            get(users::get_me).delete(users::delete_me),
        )
        .route(
            "/api/users/me/pfp",
            put(users::upload_profile_picture).layer(upload_limit),
        )
        .route(
            "/api/users/me/coins",
            post(users::add_coin).delete(users::remove_coin),
        )
        // Countries
        .route(
            "/api/countries",
            post(countries::create_country)
                .layer(upload_limit)
                .get(countries::list_countries),
        )
        .route(
            "/api/countries/{name}",
            get(countries::get_country)
                .patch(countries::update_country)
                .delete(countries::delete_country),
        )
        .route("/api/countries/{name}/coins", post(coins::create_coin))
        // Coins
        .route("/api/coins", get(coins::list_coins))
        .route(
            "/api/coins/{id}",
            get(coins::get_coin)
                .patch(coins::update_coin)
                .delete(coins::delete_coin),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            deserialize_user,
        ))
        .layer(middleware::from_fn_with_state(
            state.limits.global.clone(),
            rate_limit,
        ))
        .with_state(state.clone());

    Router::new()
        .merge(api_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(cors_layer(&state.origin))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Credentialed CORS for the configured frontend origin.
fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static(REFRESH_TOKEN_HEADER),
        ])
        .expose_headers([HeaderName::from_static(NEW_ACCESS_TOKEN_HEADER)]);

    match HeaderValue::from_str(origin.trim_end_matches('/')) {
        Ok(origin) => layer.allow_origin(origin),
        Err(e) => {
            tracing::warn!(error = %e, origin, "invalid CORS origin; cross-origin requests disabled");
            layer
        }
    }
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthcheck,
        auth::register,
        auth::verify_email,
        auth::login,
        auth::forgot_password,
        auth::reset_password,
        auth::logout,
        auth::google_consent,
        sessions::create_session,
        sessions::list_sessions,
        sessions::delete_session,
        sessions::google_oauth_callback,
        users::get_me,
        users::delete_me,
        users::upload_profile_picture,
        users::add_coin,
        users::remove_coin,
        countries::list_countries,
        countries::get_country,
        countries::create_country,
        countries::update_country,
        countries::delete_country,
        coins::list_coins,
        coins::get_coin,
        coins::create_coin,
        coins::update_coin,
        coins::delete_coin
    ),
    components(
        schemas(
            RegisterRequest,
            LoginRequest,
            ForgotPasswordRequest,
            ResetPasswordRequest,
            TokenPairResponse,
            ClearedTokensResponse,
            MessageResponse,
            UserResponse,
            CoinIdRequest,
            CreateCountryForm,
            UpdateCountryRequest,
            CreateCoinRequest,
            UpdateCoinRequest,
            StoredCoin,
            CoinPeriod,
            CoinType,
            StoredCountry,
            StoredSession,
            Role,
            Permission,
            ErrorBody,
            ErrorCode,
            FieldIssue,
            health::HealthResponse,
            health::HealthChecks
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Auth", description = "Registration, verification, and password recovery"),
        (name = "Sessions", description = "Login sessions and Google OAuth"),
        (name = "Users", description = "The caller's profile and coin collection"),
        (name = "Countries", description = "Coin-issuing countries"),
        (name = "Coins", description = "Coin catalogue")
    )
)]
pub struct ApiDoc;
