// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! File pinning API client.
//!
//! The relay re-posts uploaded files to the pinning service with the
//! resolved DNAS credential as a bearer token and translates the response
//! into this service's own shape. No retries and no chunking; a rejection
//! from the pinning API passes through with its original status.

use std::env;

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

use crate::config::{DEFAULT_PINNER_BASE_URL, PINNER_BASE_URL_ENV};
use crate::models::PinnedFile;

#[derive(Debug, thiserror::Error)]
pub enum PinnerError {
    #[error("pinning request failed: {0}")]
    Request(String),

    #[error("pinning response was invalid: {0}")]
    InvalidResponse(String),

    #[error("invalid file part: {0}")]
    InvalidFile(String),
}

/// A file extracted from the inbound multipart body, ready to re-post.
#[derive(Debug, Clone)]
pub struct RelayFile {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Outcome of an upload: pinned, or rejected upstream.
#[derive(Debug)]
pub enum PinUpload {
    Pinned(Vec<PinnedFile>),
    Rejected { status: u16, message: String },
}

/// Success row of the pinning API's multi-file upload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PinSuccessRow {
    cid: String,
    #[serde(default)]
    file_type: String,
    #[serde(default)]
    file_id: String,
}

/// Error body of the pinning API.
#[derive(Debug, Deserialize)]
struct PinErrorBody {
    message: String,
}

/// HTTP client for the pinning API.
#[derive(Debug, Clone)]
pub struct PinnerClient {
    base_url: String,
    http: Client,
}

impl PinnerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    pub fn from_env() -> Self {
        let base_url =
            env::var(PINNER_BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_PINNER_BASE_URL.into());
        let parsed: url::Url = base_url
            .parse()
            .expect("PINNER_BASE_URL must be a valid URL");
        Self::new(parsed.as_str())
    }

    /// Upload files with the given credential as a bearer token.
    pub async fn upload_files(
        &self,
        bearer_token: &str,
        files: Vec<RelayFile>,
    ) -> Result<PinUpload, PinnerError> {
        let mut form = Form::new();
        for file in files {
            let mut part = Part::bytes(file.bytes).file_name(file.name);
            if let Some(content_type) = &file.content_type {
                part = part
                    .mime_str(content_type)
                    .map_err(|e| PinnerError::InvalidFile(e.to_string()))?;
            }
            form = form.part("files", part);
        }

        let response = self
            .http
            .post(format!("{}/api/v1/files", self.base_url))
            .bearer_auth(bearer_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PinnerError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let rows: Vec<PinSuccessRow> = response
                .json()
                .await
                .map_err(|e| PinnerError::InvalidResponse(e.to_string()))?;
            Ok(PinUpload::Pinned(
                rows.into_iter().map(PinnedFile::from).collect(),
            ))
        } else {
            // 401 bad credential, 413 over the key's size limit, etc.
            let message = match response.json::<PinErrorBody>().await {
                Ok(body) => body.message,
                Err(_) => "Unknown error.".to_string(),
            };
            Ok(PinUpload::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }
}

impl From<PinSuccessRow> for PinnedFile {
    fn from(row: PinSuccessRow) -> Self {
        Self {
            success: true,
            cid: row.cid,
            kind: row.file_type,
            id: row.file_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rows_translate_to_pinned_files() {
        let raw = r#"[{"cid":"bafy123","fileType":"image/png","fileId":"f-1"}]"#;
        let rows: Vec<PinSuccessRow> = serde_json::from_str(raw).unwrap();
        let files: Vec<PinnedFile> = rows.into_iter().map(PinnedFile::from).collect();

        assert_eq!(files.len(), 1);
        assert!(files[0].success);
        assert_eq!(files[0].cid, "bafy123");
        assert_eq!(files[0].kind, "image/png");
        assert_eq!(files[0].id, "f-1");
    }

    #[test]
    fn success_rows_tolerate_missing_optional_fields() {
        let raw = r#"[{"cid":"bafy456"}]"#;
        let rows: Vec<PinSuccessRow> = serde_json::from_str(raw).unwrap();
        assert_eq!(rows[0].cid, "bafy456");
        assert_eq!(rows[0].file_type, "");
    }

    #[test]
    fn error_body_parses_message() {
        let raw = r#"{"message":"file too large","maxSize":1048576}"#;
        let body: PinErrorBody = serde_json::from_str(raw).unwrap();
        assert_eq!(body.message, "file too large");
    }
}
