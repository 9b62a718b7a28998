//! Upload the persisted image as a `multipart/form-data` POST.
//!
//! The [`UploadBackend`] trait is the seam the pipeline talks to. The
//! production implementation is [`HttpUploader`], a blocking `reqwest`
//! client; tests substitute a recording mock.
//!
//! ## Request
//!
//! | Header | Value |
//! |---|---|
//! | `Content-Type` | `multipart/form-data; boundary=*****<millis>*****` |
//! | `Content-Length` | head + file + tail, known before sending |
//! | `Connection` | `Keep-Alive` |
//! | `Cache-Control` | `no-cache` |
//! | `User-Agent` | configured, default `Android Multipart HTTP Client 1.0` |
//!
//! The body layout is described in [`multipart`].
//!
//! ## Resources
//!
//! The file handle is moved into the request body and the response is
//! consumed before returning, so both are released on every path: success,
//! HTTP error status, transport failure and cancellation.

pub mod multipart;

use crate::cancel::CancelToken;
use crate::config::UploadConfig;
use crate::error::ErrorKind;
use multipart::{MultipartForm, boundary_now, parse_form_fields};
use reqwest::blocking::{Body, Client};
use reqwest::header;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Value reported in place of a response body when an upload fails.
pub const ERROR_SENTINEL: &str = "error";

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Malformed form field '{segment}', expected key=value")]
    MalformedFields { segment: String },
    #[error("Invalid upload URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Cannot read {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP client setup failed: {0}")]
    Client(#[source] reqwest::Error),
    #[error("Connection to {url} failed: {source}")]
    Connect {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Upload to {url} timed out: {source}")]
    Timeout {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Upload to {url} failed: {source}")]
    Transfer {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Server answered {status}")]
    Status { status: u16, body: String },
    #[error("Upload cancelled")]
    Cancelled,
}

impl UploadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedFields { .. } | Self::InvalidUrl { .. } => ErrorKind::MalformedInput,
            Self::File { .. } => ErrorKind::FileIoFailure,
            Self::Client(_)
            | Self::Connect { .. }
            | Self::Timeout { .. }
            | Self::Transfer { .. }
            | Self::Status { .. } => ErrorKind::ConnectionFailure,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// Collapse an upload outcome to the response body or [`ERROR_SENTINEL`].
pub fn response_or_sentinel(result: &Result<String, UploadError>) -> &str {
    match result {
        Ok(body) => body,
        Err(_) => ERROR_SENTINEL,
    }
}

/// Everything needed for one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub url: String,
    /// Text parts as `key=value&key=value`.
    pub form_fields: String,
    pub file_path: PathBuf,
    /// Name of the file part.
    pub field_name: String,
}

impl UploadRequest {
    /// Build a request for `file_path` from the `[upload]` config section.
    /// Returns `None` when no URL is configured.
    pub fn from_config(config: &UploadConfig, file_path: &Path) -> Option<Self> {
        let url = config.url.clone()?;
        Some(Self {
            url,
            form_fields: config.form_fields.clone(),
            file_path: file_path.to_path_buf(),
            field_name: config.field_name.clone(),
        })
    }
}

/// Anything that can deliver an [`UploadRequest`].
pub trait UploadBackend: Sync {
    /// Upload the file and return the response body.
    fn upload(&self, request: &UploadRequest, cancel: &CancelToken) -> Result<String, UploadError>;
}

/// Blocking HTTP uploader.
pub struct HttpUploader {
    client: Client,
}

impl HttpUploader {
    pub fn new(config: &UploadConfig) -> Result<Self, UploadError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(UploadError::Client)?;
        Ok(Self { client })
    }

    fn map_send_error(err: reqwest::Error, url: &str, cancel: &CancelToken) -> UploadError {
        let url = url.to_string();
        if cancel.is_cancelled() {
            UploadError::Cancelled
        } else if err.is_timeout() {
            UploadError::Timeout { url, source: err }
        } else if err.is_connect() {
            UploadError::Connect { url, source: err }
        } else {
            UploadError::Transfer { url, source: err }
        }
    }
}

impl UploadBackend for HttpUploader {
    fn upload(&self, request: &UploadRequest, cancel: &CancelToken) -> Result<String, UploadError> {
        send(&self.client, request, cancel)
    }
}

fn send(client: &Client, request: &UploadRequest, cancel: &CancelToken) -> Result<String, UploadError> {
    let fields = parse_form_fields(&request.form_fields)?;
    let url = reqwest::Url::parse(&request.url).map_err(|e| UploadError::InvalidUrl {
        url: request.url.clone(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(UploadError::InvalidUrl {
            url: request.url.clone(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    if cancel.is_cancelled() {
        return Err(UploadError::Cancelled);
    }

    let file_err = |source| UploadError::File {
        path: request.file_path.clone(),
        source,
    };
    let file = File::open(&request.file_path).map_err(file_err)?;
    let file_len = file.metadata().map_err(file_err)?.len();
    let file_name = request
        .file_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| request.file_path.to_string_lossy().into_owned());

    let form = MultipartForm::new(&boundary_now(), &request.field_name, &file_name, &fields);
    let content_type = form.content_type();
    let content_length = form.content_length(file_len);
    debug!(
        url = %url,
        boundary = form.boundary(),
        file = %request.file_path.display(),
        content_length,
        "sending multipart upload"
    );
    let body = Body::sized(form.into_reader(file, cancel.clone()), content_length);

    let response = client
        .post(url)
        .header(header::CONNECTION, "Keep-Alive")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONTENT_TYPE, content_type)
        .body(body)
        .send()
        .map_err(|e| HttpUploader::map_send_error(e, &request.url, cancel))?;

    let status = response.status();
    let text = response
        .text()
        .map_err(|e| HttpUploader::map_send_error(e, &request.url, cancel))?;
    // Only 4xx and 5xx fail; a redirect the streamed body cannot follow
    // comes back as-is and its body is the response.
    if status.is_client_error() || status.is_server_error() {
        return Err(UploadError::Status {
            status: status.as_u16(),
            body: text,
        });
    }

    info!(url = %request.url, status = status.as_u16(), bytes = file_len, "image uploaded");
    Ok(text)
}
