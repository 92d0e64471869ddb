//! Media upload bridge
//!
//! Attachments and avatars are uploaded before anything referencing them is
//! written. The bridge takes a file and returns a durable URL, or fails with
//! `Error::Upload` and the caller writes nothing.

use crate::{config::UploadSettings, model::MessageKind, Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A file picked by the user
#[derive(Debug, Clone, PartialEq)]
pub struct MediaFile {
    /// Original file name
    pub file_name: String,
    /// MIME type (`image/png`, `video/mp4`, ...)
    pub content_type: String,
    /// File contents
    pub bytes: Bytes,
}

impl MediaFile {
    /// Build a file from its parts
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Message kind this file renders as
    ///
    /// # Errors
    /// `Error::UnsupportedMedia` for anything but `image/*` and `video/*`
    pub fn kind(&self) -> Result<MessageKind> {
        MessageKind::from_content_type(&self.content_type)
            .ok_or_else(|| Error::UnsupportedMedia(self.content_type.clone()))
    }

    /// Whether this is an image
    pub fn is_image(&self) -> bool {
        matches!(self.kind(), Ok(MessageKind::Image))
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the file is empty
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Upload endpoint consumed by the sync engine and profile settings
#[async_trait]
pub trait MediaUploader: Send + Sync {
    /// Upload a file and return its durable URL
    async fn upload(&self, file: MediaFile) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
}

/// Unsigned multipart uploader for a Cloudinary-style endpoint
///
/// Posts `file` and `upload_preset` to `{base_url}/v1_1/{cloud_name}/auto/upload`
/// and reads `secure_url` from the JSON reply.
#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: reqwest::Client,
    endpoint: String,
    upload_preset: String,
}

impl HttpUploader {
    /// Build an uploader from settings
    ///
    /// # Errors
    /// `Error::Upload` if the endpoint is not configured or the client cannot be built
    pub fn new(settings: &UploadSettings) -> Result<Self> {
        if !settings.is_configured() {
            return Err(Error::Upload(
                "upload endpoint is not configured (cloud name and preset required)".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::Upload(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: settings.endpoint(),
            upload_preset: settings.upload_preset.clone(),
        })
    }

    /// Upload URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl MediaUploader for HttpUploader {
    async fn upload(&self, file: MediaFile) -> Result<String> {
        debug!(
            "Uploading {} ({}, {} bytes) to {}",
            file.file_name,
            file.content_type,
            file.len(),
            self.endpoint
        );

        let part = reqwest::multipart::Part::bytes(file.bytes.to_vec())
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)
            .map_err(|e| Error::Upload(format!("Invalid content type: {}", e)))?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("upload_preset", self.upload_preset.clone());

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                warn!("Upload of {} failed: {}", file.file_name, e);
                Error::Upload(format!("Upload failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!("Upload of {} rejected with {}", file.file_name, status);
            return Err(Error::Upload(format!("Upload failed with status {}", status)));
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| Error::Upload(format!("Invalid upload response: {}", e)))?;

        match body.secure_url {
            Some(url) if !url.is_empty() => {
                info!("Uploaded {} to {}", file.file_name, url);
                Ok(url)
            }
            _ => Err(Error::Upload("Upload response has no secure_url".to_string())),
        }
    }
}
