// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the REST API. Requests derive `Validate`;
//! field errors surface as `VALIDATION_FAILED` with camelCase paths. All
//! types derive `ToSchema` for the OpenAPI document.
//!
//! ## Model Categories
//!
//! - **Auth**: registration, login, password reset
//! - **Users**: the public view of a user and collection changes
//! - **Countries / Coins**: create and patch bodies plus the coin rules

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::auth::Role;
use crate::error::FieldIssue;
use crate::storage::{CoinPeriod, CoinType, StoredUser};

// =============================================================================
// Auth Models
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[serde(default)]
    #[validate(email(message = "Not a valid email"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 6, message = "Password to short - should be 6 chars minimum"))]
    pub password: String,
    #[serde(default)]
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub password_confirmation: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(email(message = "Not a valid email"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    #[validate(email(message = "Not a valid email"))]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Verification code is required"))]
    pub verification_code: String,
    #[serde(default)]
    #[validate(length(min = 6, message = "Password to short - should be 6 chars minimum"))]
    pub password: String,
    #[serde(default)]
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub password_confirmation: String,
}

/// Both tokens, as returned by login.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// Body of `DELETE /api/sessions`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClearedTokensResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OAuthCallbackQuery {
    /// Authorization code from Google.
    pub code: Option<String>,
}

// =============================================================================
// User Models
// =============================================================================

/// Public view of a user. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub email_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pfp: Option<String>,
    pub coins: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<StoredUser> for UserResponse {
    fn from(user: StoredUser) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            email_verified: user.email_verified,
            pfp: user.pfp,
            coins: user.coins,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CoinIdRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Coin ID is required"))]
    pub coin_id: String,
}

// =============================================================================
// Country Models
// =============================================================================

/// Multipart body of `POST /api/countries`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCountryForm {
    #[schema(example = "spain")]
    pub name: String,
    #[schema(example = "1999-01-01")]
    pub joined_on: NaiveDate,
    #[schema(value_type = String, format = Binary)]
    pub flag_image: Vec<u8>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCountryRequest {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    pub joined_on: Option<NaiveDate>,
}

/// Parse the `joinedOn` form field (YYYY-MM-DD).
pub fn parse_joined_on(raw: Option<&str>) -> Result<NaiveDate, FieldIssue> {
    let raw = raw.map(str::trim).filter(|r| !r.is_empty()).ok_or_else(|| {
        FieldIssue::new("required", "JoinedOn is required", "joinedOn")
    })?;
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        FieldIssue::new("invalid_date", "JoinedOn must be a valid date format", "joinedOn")
    })
}

// =============================================================================
// Coin Models
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCoinRequest {
    #[serde(rename = "type")]
    pub coin_type: CoinType,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: Option<u64>,
    #[validate(url(message = "Image must be a URL"))]
    pub image: Option<String>,
    pub period: CoinPeriod,
    #[serde(default)]
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCoinRequest {
    #[serde(rename = "type")]
    pub coin_type: Option<CoinType>,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: Option<u64>,
    #[validate(url(message = "Image must be a URL"))]
    pub image: Option<String>,
    pub period: Option<CoinPeriod>,
    #[validate(length(min = 1, message = "Description cannot be empty"))]
    pub description: Option<String>,
    /// Name of the country to move the coin to.
    #[validate(length(min = 1, message = "Country name cannot be empty"))]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CoinListQuery {
    /// Coin type, case-insensitive (e.g. `2 euro`).
    #[serde(rename = "type")]
    pub coin_type: Option<String>,
    /// Country name.
    pub country: Option<String>,
}

/// Rules every stored coin satisfies:
///
/// - commemorative coins carry a quantity, other types never do
/// - a period's end date is not before its start date
pub fn coin_rule_issues(
    coin_type: CoinType,
    quantity: Option<u64>,
    period: &CoinPeriod,
) -> Vec<FieldIssue> {
    let mut issues = Vec::new();

    match (coin_type, quantity) {
        (CoinType::Commemorative, None) => issues.push(FieldIssue::new(
            "required",
            "Quantity is required for commemorative coins",
            "quantity",
        )),
        (CoinType::Commemorative, Some(_)) | (_, None) => {}
        (_, Some(_)) => issues.push(FieldIssue::new(
            "not_allowed",
            "Only commemorative coins have a quantity",
            "quantity",
        )),
    }

    if let Some(end) = period.end_date {
        if end < period.start_date {
            issues.push(FieldIssue::new(
                "invalid_period",
                "End date cannot be before start date",
                "period.endDate",
            ));
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApiError, ErrorCode};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn register_request_checks_fields() {
        let request: RegisterRequest = serde_json::from_value(serde_json::json!({
            "name": "A",
            "email": "not-an-email",
            "password": "abc",
            "passwordConfirmation": "abd"
        }))
        .unwrap();

        let err = ApiError::from(request.validate().unwrap_err());
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        let paths: Vec<&str> = err.errors.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["email", "password", "passwordConfirmation"]);
        assert!(err
            .errors
            .iter()
            .any(|i| i.message == "Passwords do not match"));
    }

    #[test]
    fn register_request_accepts_valid_body() {
        let request: RegisterRequest = serde_json::from_value(serde_json::json!({
            "name": "A",
            "email": "a@b.com",
            "password": "secret1",
            "passwordConfirmation": "secret1"
        }))
        .unwrap();
        assert!(request.validate().is_ok());
    }

    #[test]
    fn user_response_hides_password_hash() {
        let user = StoredUser::new("A", "a@b.com", Some("$argon2id$hash".into()));
        let json = serde_json::to_value(UserResponse::from(user)).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["emailVerified"], false);
        assert_eq!(json["role"], "APPLICATION_USER");
    }

    #[test]
    fn coin_type_is_case_insensitive_in_bodies() {
        let request: CreateCoinRequest = serde_json::from_value(serde_json::json!({
            "type": "2 euro",
            "period": { "startDate": "2002-01-01" },
            "description": "Standard issue"
        }))
        .unwrap();
        assert_eq!(request.coin_type, CoinType::TwoEuro);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn commemorative_coins_need_quantity() {
        let period = CoinPeriod {
            start_date: date(2022, 1, 1),
            end_date: None,
        };
        let issues = coin_rule_issues(CoinType::Commemorative, None, &period);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "quantity");

        assert!(coin_rule_issues(CoinType::Commemorative, Some(1_000), &period).is_empty());
        assert_eq!(
            coin_rule_issues(CoinType::OneEuro, Some(5), &period)[0].code,
            "not_allowed"
        );
        assert!(coin_rule_issues(CoinType::OneEuro, None, &period).is_empty());
    }

    #[test]
    fn period_end_must_not_precede_start() {
        let period = CoinPeriod {
            start_date: date(2022, 1, 1),
            end_date: Some(date(2021, 12, 31)),
        };
        let issues = coin_rule_issues(CoinType::TenCent, None, &period);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "period.endDate");

        let same_day = CoinPeriod {
            start_date: date(2022, 1, 1),
            end_date: Some(date(2022, 1, 1)),
        };
        assert!(coin_rule_issues(CoinType::TenCent, None, &same_day).is_empty());
    }

    #[test]
    fn joined_on_is_parsed_strictly() {
        assert_eq!(parse_joined_on(Some("1999-01-01")).unwrap(), date(1999, 1, 1));
        assert_eq!(parse_joined_on(None).unwrap_err().message, "JoinedOn is required");
        assert_eq!(parse_joined_on(Some("01/01/1999")).unwrap_err().path, "joinedOn");
    }
}
