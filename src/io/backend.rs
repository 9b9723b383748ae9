//! Reporting backend over HTTP
//!
//! Four form endpoints, all authenticated with the account email and
//! password in the request body:
//! - `main/identify-camera/` checks credentials ("user identified")
//! - `main/my-endpoint/` receives an alert for one region
//! - `main/user-incorrect-postures/` receives one evidence image per request
//! - `main/video-data/` receives the end-of-session summary
//!
//! JSON endpoints answer `{"status": "..."}`. Uploads only look at the HTTP
//! status.

use crate::domain::posture::Region;
use crate::domain::session::SessionSummary;
use crate::infra::config::{Config, Credentials};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

pub const IDENTIFY_PATH: &str = "main/identify-camera/";
pub const NOTIFY_PATH: &str = "main/my-endpoint/";
pub const UPLOAD_PATH: &str = "main/user-incorrect-postures/";
pub const SUMMARY_PATH: &str = "main/video-data/";

const STATUS_SUCCESS: &str = "success";
const STATUS_IDENTIFIED: &str = "user identified";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("request to {endpoint} failed")]
    Request {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} answered HTTP {status}")]
    HttpStatus { endpoint: &'static str, status: u16 },

    #[error("{endpoint} answered status \"{status}\"")]
    Rejected { endpoint: &'static str, status: String },

    #[error("failed to read evidence file {path}")]
    ReadEvidence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{failed} of {total} evidence uploads failed")]
    UploadIncomplete { failed: usize, total: usize },
}

/// Result of an evidence upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Every file was accepted
    Uploaded(usize),
    /// Nothing to send; no request was made
    NoEvidence,
}

/// Remote reporting service
#[async_trait]
pub trait Backend: Send + Sync {
    /// Check the configured credentials. `Ok(false)` means the backend
    /// answered but did not recognise the account.
    async fn identify(&self) -> Result<bool, BackendError>;

    async fn notify(&self, region: Region) -> Result<(), BackendError>;

    async fn upload_evidence(&self, files: &[PathBuf]) -> Result<UploadOutcome, BackendError>;

    async fn push_summary(&self, summary: &SessionSummary) -> Result<(), BackendError>;
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

/// `Backend` implementation using reqwest
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl HttpBackend {
    pub fn new(
        base_url: &str,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        // One client for the whole session (connection pooling)
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .http1_only()
            .build()
            .map_err(BackendError::Client)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, BackendError> {
        Self::new(
            config.backend_url(),
            config.credentials().clone(),
            Duration::from_millis(config.backend_timeout_ms()),
        )
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    /// POST a form and decode the `{"status": ...}` answer
    async fn post_form(
        &self,
        endpoint: &'static str,
        fields: &[(&str, String)],
    ) -> Result<StatusResponse, BackendError> {
        let start = Instant::now();
        let response = self
            .client
            .post(self.url(endpoint))
            .form(fields)
            .send()
            .await
            .map_err(|source| BackendError::Request { endpoint, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::HttpStatus { endpoint, status: status.as_u16() });
        }

        let body: StatusResponse = response
            .json()
            .await
            .map_err(|source| BackendError::Request { endpoint, source })?;

        debug!(
            endpoint = %endpoint,
            status = %body.status,
            latency_us = %(start.elapsed().as_micros() as u64),
            "backend_response"
        );
        Ok(body)
    }

    async fn upload_one(&self, path: &Path) -> Result<(), BackendError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| BackendError::ReadEvidence { path: path.to_path_buf(), source })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "evidence".to_string());

        let form = Form::new()
            .text("email", self.credentials.email.clone())
            .text("password", self.credentials.password.clone())
            .part("image", Part::bytes(bytes).file_name(file_name));

        let response = self
            .client
            .post(self.url(UPLOAD_PATH))
            .multipart(form)
            .send()
            .await
            .map_err(|source| BackendError::Request { endpoint: UPLOAD_PATH, source })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(BackendError::HttpStatus { endpoint: UPLOAD_PATH, status: status.as_u16() })
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn identify(&self) -> Result<bool, BackendError> {
        let body = self.post_form(IDENTIFY_PATH, &credential_fields(&self.credentials)).await?;
        if body.status != STATUS_IDENTIFIED {
            warn!(
                status = %body.status,
                message = %body.message.as_deref().unwrap_or(""),
                "backend_identify_rejected"
            );
        }
        Ok(body.status == STATUS_IDENTIFIED)
    }

    async fn notify(&self, region: Region) -> Result<(), BackendError> {
        let body = self.post_form(NOTIFY_PATH, &notify_fields(&self.credentials, region)).await?;
        expect_status(NOTIFY_PATH, body, STATUS_SUCCESS)
    }

    async fn upload_evidence(&self, files: &[PathBuf]) -> Result<UploadOutcome, BackendError> {
        if files.is_empty() {
            return Ok(UploadOutcome::NoEvidence);
        }

        // Keep going after a failure so one bad file does not hide the rest
        let mut failed = 0;
        for path in files {
            if let Err(e) = self.upload_one(path).await {
                warn!(path = %path.display(), error = %e, "evidence_upload_failed");
                failed += 1;
            }
        }

        if failed > 0 {
            return Err(BackendError::UploadIncomplete { failed, total: files.len() });
        }
        Ok(UploadOutcome::Uploaded(files.len()))
    }

    async fn push_summary(&self, summary: &SessionSummary) -> Result<(), BackendError> {
        let body = self.post_form(SUMMARY_PATH, &summary_fields(&self.credentials, summary)).await?;
        expect_status(SUMMARY_PATH, body, STATUS_SUCCESS)
    }
}

fn expect_status(
    endpoint: &'static str,
    body: StatusResponse,
    expected: &str,
) -> Result<(), BackendError> {
    if body.status == expected {
        Ok(())
    } else {
        Err(BackendError::Rejected { endpoint, status: body.status })
    }
}

fn credential_fields(credentials: &Credentials) -> Vec<(&'static str, String)> {
    vec![("email", credentials.email.clone()), ("password", credentials.password.clone())]
}

fn notify_fields(credentials: &Credentials, region: Region) -> Vec<(&'static str, String)> {
    let mut fields = credential_fields(credentials);
    fields.push(("alert", region.as_str().to_string()));
    fields
}

fn summary_fields(
    credentials: &Credentials,
    summary: &SessionSummary,
) -> Vec<(&'static str, String)> {
    let mut fields = credential_fields(credentials);
    fields.extend([
        ("start_time", summary.start_time.to_string()),
        ("end_time", summary.end_time.to_string()),
        ("total_alerts", summary.total_alerts.to_string()),
        ("incorrect_postures", summary.incorrect_postures_json()),
    ]);
    fields
}
