// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Uniform API error envelope.
//!
//! Every failure leaves the service as
//! `{ statusCode, codeName, message, isOperational, errors? }`.
//! Operational errors are expected domain outcomes and are serialized as is.
//! Anything else is logged and collapsed into a generic 500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::auth::password::PasswordError;
use crate::auth::tokens::TokenError;
use crate::storage::StoreError;

/// Stable machine-readable error names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    BadRequest,
    CoinNotFound,
    CountryHasCoins,
    CountryNameInUse,
    CountryNotFound,
    EmailInUse,
    EmailNotVerified,
    ExternalServiceError,
    FileNotFound,
    FileTooBig,
    Forbidden,
    InternalServerError,
    InvalidCredentials,
    InvalidFileType,
    TooManyRequests,
    Unauthorized,
    UnexpectedFile,
    UserNotFound,
    ValidationFailed,
}

/// A single field-level problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldIssue {
    pub code: String,
    pub message: String,
    pub path: String,
}

impl FieldIssue {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            path: path.into(),
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: ErrorCode,
    pub message: String,
    pub errors: Vec<FieldIssue>,
    pub operational: bool,
}

/// Wire form of [`ApiError`].
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub code_name: ErrorCode,
    pub message: String,
    pub is_operational: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldIssue>>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            errors: Vec::new(),
            operational: true,
        }
    }

    pub fn with_errors(mut self, errors: Vec<FieldIssue>) -> Self {
        self.errors = errors;
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorCode::BadRequest, message)
    }

    pub fn not_found(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, code, message)
    }

    pub fn conflict(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, code, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            ErrorCode::Unauthorized,
            "You must be authenticated to access this route",
        )
    }

    pub fn forbidden() -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            ErrorCode::Forbidden,
            "You are not allowed to access this route",
        )
    }

    pub fn too_many_requests() -> Self {
        Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::TooManyRequests,
            "Too many requests! Try again later.",
        )
    }

    pub fn validation(errors: Vec<FieldIssue>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            ErrorCode::ValidationFailed,
            "Validation failed",
        )
        .with_errors(errors)
    }

    /// An outbound dependency failed or is not configured.
    pub fn external(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::ExternalServiceError,
            message,
        )
    }

    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: ErrorCode::InternalServerError,
            message: "An unexpected error occurred".to_string(),
            errors: Vec::new(),
            operational: false,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:?}: {}", self.status.as_u16(), self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            status_code: self.status.as_u16(),
            code_name: self.code,
            message: self.message,
            is_operational: self.operational,
            errors: (!self.errors.is_empty()).then_some(self.errors),
        });
        (self.status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "storage failure");
        ApiError::internal()
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        tracing::error!(error = %err, "token signing failure");
        ApiError::internal()
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        tracing::error!(error = %err, "password hashing failure");
        ApiError::internal()
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut issues = Vec::new();
        flatten_validation_errors(&errors, "", &mut issues);
        issues.sort_by(|a, b| a.path.cmp(&b.path));
        ApiError::validation(issues)
    }
}

/// Collect nested validator output as dotted camelCase paths.
fn flatten_validation_errors(errors: &ValidationErrors, prefix: &str, out: &mut Vec<FieldIssue>) {
    for (field, kind) in errors.errors() {
        let field: &str = field;
        let name = if field == "__all__" {
            String::new()
        } else {
            camel_case(field)
        };
        let path = match (prefix.is_empty(), name.is_empty()) {
            (true, _) => name,
            (false, true) => prefix.to_string(),
            (false, false) => format!("{prefix}.{name}"),
        };

        match kind {
            ValidationErrorsKind::Field(list) => {
                for error in list {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value ({})", error.code));
                    out.push(FieldIssue::new(error.code.to_string(), message, path.clone()));
                }
            }
            ValidationErrorsKind::Struct(nested) => {
                flatten_validation_errors(nested, &path, out);
            }
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    flatten_validation_errors(nested, &format!("{path}.{index}"), out);
                }
            }
        }
    }
}

fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
