//! Media host client
//!
//! Signed multipart uploads and deletions against a Cloudinary-compatible
//! image host. Each request carries `api_key`, `timestamp` and a signature
//! over the sorted signed parameters (see [`aac_common::signing`]).

use aac_common::config::MediaConfig;
use aac_common::signing::{sign_params, unix_timestamp};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

const USER_AGENT: &str = concat!("aac-board/", env!("CARGO_PKG_VERSION"));

/// Media pipeline and media host errors
#[derive(Debug, Error)]
pub enum MediaError {
    /// Declared or sniffed type is not an image
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("Could not read image: {0}")]
    Decode(String),

    #[error("Could not encode image: {0}")]
    Encode(String),

    /// Malformed data URI or image source
    #[error("Invalid image source: {0}")]
    InvalidSource(String),

    #[error("Image too large after compression: {size} bytes (limit {limit})")]
    TooLarge { size: usize, limit: usize },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Media host error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    /// Upload requested but no media host is configured
    #[error("Media host not configured")]
    NotConfigured,
}

/// Hosted image reference returned by an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedMedia {
    /// Deletion handle
    pub public_id: String,
    pub url: String,
}

/// Remote image host
#[async_trait]
pub trait MediaHost: Send + Sync {
    async fn upload(&self, bytes: Vec<u8>, mime: &str, folder: &str) -> Result<UploadedMedia, MediaError>;

    async fn destroy(&self, public_id: &str) -> Result<(), MediaError>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: String,
}

/// Cloudinary-compatible signed upload client
pub struct CloudinaryHost {
    http_client: reqwest::Client,
    api_base: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

impl CloudinaryHost {
    pub fn new(config: &MediaConfig) -> Result<Self, MediaError> {
        if config.cloud_name.is_empty() || config.api_key.is_empty() || config.api_secret.is_empty() {
            return Err(MediaError::NotConfigured);
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MediaError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            cloud_name: config.cloud_name.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
        })
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/{}/image/{}", self.api_base, self.cloud_name, action)
    }

    /// Form with the signed parameters plus key, timestamp and signature
    fn signed_form(&self, params: &[(&str, &str)], timestamp: &str) -> Form {
        let mut signed: Vec<(&str, &str)> = params.to_vec();
        signed.push(("timestamp", timestamp));
        let signature = sign_params(&signed, &self.api_secret);

        let mut form = Form::new();
        for (key, value) in params {
            form = form.text(key.to_string(), value.to_string());
        }
        form.text("api_key", self.api_key.clone())
            .text("timestamp", timestamp.to_string())
            .text("signature", signature)
            .text("signature_algorithm", "sha256")
    }

    async fn post(&self, url: &str, form: Form) -> Result<reqwest::Response, MediaError> {
        let response = self
            .http_client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| MediaError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&error_text)
            .map(|body| body.error.message)
            .unwrap_or(error_text);
        Err(MediaError::Api(status.as_u16(), message))
    }
}

#[async_trait]
impl MediaHost for CloudinaryHost {
    async fn upload(&self, bytes: Vec<u8>, mime: &str, folder: &str) -> Result<UploadedMedia, MediaError> {
        let timestamp = unix_timestamp().to_string();
        let size = bytes.len();

        let file = Part::bytes(bytes)
            .file_name("card-image")
            .mime_str(mime)
            .map_err(|e| MediaError::UnsupportedType(e.to_string()))?;
        let form = self.signed_form(&[("folder", folder)], &timestamp).part("file", file);

        debug!(size, folder = %folder, "Uploading image to media host");
        let response = self.post(&self.endpoint("upload"), form).await?;
        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| MediaError::Parse(e.to_string()))?;

        info!(public_id = %uploaded.public_id, size, "Image uploaded");
        Ok(UploadedMedia {
            public_id: uploaded.public_id,
            url: uploaded.secure_url,
        })
    }

    async fn destroy(&self, public_id: &str) -> Result<(), MediaError> {
        let timestamp = unix_timestamp().to_string();
        let form = self.signed_form(&[("public_id", public_id)], &timestamp);

        let response = self.post(&self.endpoint("destroy"), form).await?;
        let outcome: DestroyResponse = response
            .json()
            .await
            .map_err(|e| MediaError::Parse(e.to_string()))?;

        match outcome.result.as_str() {
            "ok" => {
                debug!(public_id = %public_id, "Image destroyed");
                Ok(())
            }
            // Already gone is the state we wanted
            "not found" => {
                debug!(public_id = %public_id, "Image already absent on media host");
                Ok(())
            }
            other => Err(MediaError::Api(200, other.to_string())),
        }
    }
}
