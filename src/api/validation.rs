// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON body extractor that runs `validator` rules.

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::{ApiError, FieldIssue};

/// Like [`Json`], but malformed bodies and rule violations both answer
/// 400 `VALIDATION_FAILED`.
pub struct ValidJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(rejection_to_error)?;
        value.validate()?;
        Ok(ValidJson(value))
    }
}

fn rejection_to_error(rejection: JsonRejection) -> ApiError {
    let code = match &rejection {
        JsonRejection::MissingJsonContentType(_) => "invalid_content_type",
        JsonRejection::JsonSyntaxError(_) => "invalid_json",
        _ => "invalid_body",
    };
    ApiError::validation(vec![FieldIssue::new(code, rejection.body_text(), "")])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::models::LoginRequest;
    use axum::body::Body;
    use axum::http::{header::CONTENT_TYPE, StatusCode};

    fn json_request(body: &str) -> Request {
        axum::http::Request::builder()
            .method("POST")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn accepts_valid_body() {
        let ValidJson(login) = ValidJson::<LoginRequest>::from_request(
            json_request(r#"{"email":"a@b.com","password":"secret1"}"#),
            &(),
        )
        .await
        .unwrap();
        assert_eq!(login.email, "a@b.com");
    }

    #[tokio::test]
    async fn rule_violation_is_validation_failed() {
        let err = ValidJson::<LoginRequest>::from_request(
            json_request(r#"{"email":"nope","password":""}"#),
            &(),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert_eq!(err.errors.len(), 2);
    }

    #[tokio::test]
    async fn malformed_json_is_validation_failed() {
        let err = ValidJson::<LoginRequest>::from_request(json_request("{not json"), &())
            .await
            .err()
            .unwrap();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert_eq!(err.errors[0].code, "invalid_json");
    }
}
