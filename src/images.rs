// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Image uploads.
//!
//! Country flags and profile pictures arrive as multipart form data, are
//! checked against the image rules, and are pushed to Cloudinary, which
//! crops them to a 250x250 face-centred square. Only the hosted URL is
//! stored.
//!
//! ## Rules
//!
//! - MIME type: `image/jpeg`, `image/jpg` or `image/png` (415 otherwise)
//! - Size: at most 2 MB (413 otherwise)
//! - Exactly the expected file field; any other file field is rejected

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{multipart::MultipartError, Multipart};
use axum::http::StatusCode;
use chrono::Utc;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::config::CloudinaryConfig;
use crate::error::{ApiError, ErrorCode, FieldIssue};

pub const ACCEPTED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png"];

/// Largest accepted image, in bytes.
pub const MAX_IMAGE_SIZE: usize = 2_000_000;

/// Request body limit for upload routes; leaves room for the multipart framing
/// so an oversized image still reaches the size check.
pub const UPLOAD_BODY_LIMIT: usize = MAX_IMAGE_SIZE + 64 * 1024;

/// Cloudinary transformation applied to every upload.
const TRANSFORMATION: &str = "w_250,h_250,c_fill,g_face,q_auto";

/// HTTP timeout for upload requests.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum ImageHostError {
    #[error("image host request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("image host answered {status}: {body}")]
    Status { status: u16, body: String },
}

impl From<ImageHostError> for ApiError {
    fn from(err: ImageHostError) -> Self {
        tracing::error!(error = %err, "image upload failed");
        ApiError::external("Failed to upload image")
    }
}

/// An image read from a multipart request.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Store `image` under `public_id`, replacing any previous image with that
    /// id. Returns the public HTTPS URL.
    async fn upload(&self, image: ImageUpload, public_id: &str) -> Result<String, ImageHostError>;
}

/// Public id of a country's flag.
pub fn flag_public_id(country_name: &str) -> String {
    format!("country_flag_{country_name}")
}

/// Public id of a user's profile picture.
pub fn profile_public_id(user_id: &str) -> String {
    format!("profile_{user_id}")
}

// =============================================================================
// Cloudinary
// =============================================================================

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

/// Signed uploads to the Cloudinary upload API.
pub struct CloudinaryHost {
    client: reqwest::Client,
    config: CloudinaryConfig,
}

impl CloudinaryHost {
    pub fn new(config: CloudinaryConfig) -> Result<Self, ImageHostError> {
        let client = reqwest::Client::builder().timeout(UPLOAD_TIMEOUT).build()?;
        Ok(Self { client, config })
    }

    fn upload_url(&self) -> String {
        format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            self.config.cloud_name
        )
    }
}

/// Cloudinary request signature: SHA-256 over the sorted signed parameters
/// followed by the API secret, hex encoded.
pub fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let digest = Sha256::digest(format!("{joined}{api_secret}").as_bytes());
    format!("{digest:x}")
}

#[async_trait]
impl ImageHost for CloudinaryHost {
    async fn upload(&self, image: ImageUpload, public_id: &str) -> Result<String, ImageHostError> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[
                ("overwrite", "true"),
                ("public_id", public_id),
                ("timestamp", &timestamp),
                ("transformation", TRANSFORMATION),
            ],
            &self.config.api_secret,
        );

        let file = reqwest::multipart::Part::bytes(image.bytes)
            .file_name(image.file_name)
            .mime_str(&image.content_type)?;
        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("api_key", self.config.api_key.clone())
            .text("overwrite", "true")
            .text("public_id", public_id.to_string())
            .text("timestamp", timestamp)
            .text("transformation", TRANSFORMATION)
            .text("signature_algorithm", "sha256")
            .text("signature", signature);

        let response = self
            .client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ImageHostError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let uploaded: UploadResponse = response.json().await?;
        tracing::info!(public_id = %public_id, "image uploaded");
        Ok(uploaded.secure_url)
    }
}

// =============================================================================
// Multipart forms
// =============================================================================

/// Text fields and the single image of a multipart request.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub fields: HashMap<String, String>,
    pub image: Option<ImageUpload>,
}

impl UploadForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// The image, or 400 `FILE_NOT_FOUND`.
    pub fn require_image(&mut self, message: &str) -> Result<ImageUpload, ApiError> {
        self.image.take().ok_or_else(|| {
            ApiError::new(StatusCode::BAD_REQUEST, ErrorCode::FileNotFound, message)
        })
    }
}

pub fn invalid_file_type(field: &str) -> ApiError {
    let message = "Invalid file type. Only JPEG, JPG and PNG are allowed.";
    ApiError::new(
        StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ErrorCode::InvalidFileType,
        message,
    )
    .with_errors(vec![FieldIssue::new("INVALID_FILE", message, field)])
}

pub fn file_too_big(field: &str) -> ApiError {
    let message = "Image is too big. Max is 2mb";
    ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, ErrorCode::FileTooBig, message)
        .with_errors(vec![FieldIssue::new("FILE_TOO_LARGE", message, field)])
}

pub fn unexpected_file(field: &str) -> ApiError {
    ApiError::new(
        StatusCode::BAD_REQUEST,
        ErrorCode::UnexpectedFile,
        format!("Unexpected file field '{field}'"),
    )
}

fn multipart_error(err: MultipartError, file_field: &str) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return file_too_big(file_field);
    }
    tracing::debug!(error = %err, "malformed multipart body");
    ApiError::bad_request("Malformed multipart body")
}

/// Check an image against the type and size rules.
pub fn check_image(image: &ImageUpload, field: &str) -> Result<(), ApiError> {
    if !ACCEPTED_IMAGE_TYPES.contains(&image.content_type.as_str()) {
        return Err(invalid_file_type(field));
    }
    if image.bytes.len() > MAX_IMAGE_SIZE {
        return Err(file_too_big(field));
    }
    Ok(())
}

/// Read a multipart body holding text fields and at most one image under
/// `file_field`.
pub async fn read_upload_form(
    mut multipart: Multipart,
    file_field: &str,
) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, file_field))?
    {
        let name = field.name().unwrap_or_default().to_string();

        let Some(file_name) = field.file_name().map(str::to_string) else {
            let value = field
                .text()
                .await
                .map_err(|e| multipart_error(e, file_field))?;
            form.fields.insert(name, value);
            continue;
        };

        if name != file_field || form.image.is_some() {
            return Err(unexpected_file(&name));
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !ACCEPTED_IMAGE_TYPES.contains(&content_type.as_str()) {
            return Err(invalid_file_type(file_field));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, file_field))?;
        let image = ImageUpload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        };
        check_image(&image, file_field)?;
        form.image = Some(image);
    }

    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(content_type: &str, len: usize) -> ImageUpload {
        ImageUpload {
            file_name: "flag.png".into(),
            content_type: content_type.into(),
            bytes: vec![0; len],
        }
    }

    #[test]
    fn public_ids() {
        assert_eq!(flag_public_id("spain"), "country_flag_spain");
        assert_eq!(profile_public_id("u1"), "profile_u1");
    }

    #[test]
    fn signature_sorts_params_and_appends_secret() {
        let a = sign_params(&[("timestamp", "1"), ("public_id", "x")], "secret");
        let b = sign_params(&[("public_id", "x"), ("timestamp", "1")], "secret");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let expected = format!("{:x}", Sha256::digest(b"public_id=x&timestamp=1secret"));
        assert_eq!(a, expected);
    }

    #[test]
    fn check_image_enforces_type_then_size() {
        assert!(check_image(&image("image/png", 10), "pfp").is_ok());
        assert!(check_image(&image("image/jpg", MAX_IMAGE_SIZE), "pfp").is_ok());

        let err = check_image(&image("image/gif", 10), "pfp").unwrap_err();
        assert_eq!(err.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(err.code, ErrorCode::InvalidFileType);
        assert_eq!(err.errors[0].code, "INVALID_FILE");

        let err = check_image(&image("image/jpeg", MAX_IMAGE_SIZE + 1), "pfp").unwrap_err();
        assert_eq!(err.status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(err.code, ErrorCode::FileTooBig);
        assert_eq!(err.errors[0].code, "FILE_TOO_LARGE");
        assert_eq!(err.errors[0].path, "pfp");
    }

    #[test]
    fn missing_image_is_file_not_found() {
        let mut form = UploadForm::default();
        let err = form.require_image("No file uploaded").unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, ErrorCode::FileNotFound);
    }
}
