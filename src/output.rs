//! CLI output formatting for pipeline runs.
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions do no I/O.
//!
//! ```text
//! Save    cache/IMG.jpeg
//!     Format: jpeg, 48213 bytes
//! Upload  http://127.0.0.1:8088/upload.php
//!     Response: stored
//! ```
//!
//! `--json` output goes through [`RunSummary`] instead.

use crate::config::{Config, SaveFailurePolicy};
use crate::error::ErrorKind;
use crate::pipeline::{PipelineReport, SaveOutcome, SkipReason, UploadOutcome};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Longest response body echoed verbatim; longer ones are truncated.
const MAX_RESPONSE_CHARS: usize = 200;

/// Serializable view of a [`PipelineReport`].
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub target: PathBuf,
    pub save: StepSummary,
    pub upload: StepSummary,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepSummary {
    Ok {
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    Failed {
        kind: ErrorKind,
        message: String,
    },
    Skipped {
        reason: SkipReason,
    },
}

impl RunSummary {
    pub fn from_report(report: &PipelineReport) -> Self {
        let save = match &report.save {
            SaveOutcome::Saved(file) => StepSummary::Ok {
                detail: Some(format!("{}, {} bytes", file.format, file.bytes)),
            },
            SaveOutcome::Failed(e) => StepSummary::Failed {
                kind: e.kind(),
                message: e.to_string(),
            },
            SaveOutcome::Cancelled => StepSummary::Skipped {
                reason: SkipReason::Cancelled,
            },
        };
        let upload = match &report.upload {
            UploadOutcome::Uploaded(body) => StepSummary::Ok {
                detail: Some(body.clone()),
            },
            UploadOutcome::Failed(e) => StepSummary::Failed {
                kind: e.kind(),
                message: e.to_string(),
            },
            UploadOutcome::Skipped(reason) => StepSummary::Skipped { reason: *reason },
        };
        Self {
            target: report.target.clone(),
            save,
            upload,
        }
    }
}

fn skip_reason_text(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::NoEndpoint => "no upload url configured",
        SkipReason::SaveFailed => "save failed and policy is abort",
        SkipReason::Cancelled => "cancelled",
    }
}

fn truncate_response(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= MAX_RESPONSE_CHARS {
        return body.to_string();
    }
    let cut: String = body.chars().take(MAX_RESPONSE_CHARS).collect();
    format!("{cut}…")
}

/// Format the save step.
pub fn format_save(target: &Path, save: &SaveOutcome) -> Vec<String> {
    let mut lines = vec![format!("Save    {}", target.display())];
    match save {
        SaveOutcome::Saved(file) => {
            lines.push(format!("    Format: {}, {} bytes", file.format, file.bytes));
        }
        SaveOutcome::Failed(e) => {
            lines.push(format!("    Failed ({}): {}", e.kind(), e));
        }
        SaveOutcome::Cancelled => lines.push("    Cancelled".to_string()),
    }
    lines
}

/// Format the upload step.
pub fn format_upload(upload: &UploadOutcome, config: &Config) -> Vec<String> {
    let endpoint = config.upload.url.as_deref().unwrap_or("-");
    let mut lines = vec![format!("Upload  {endpoint}")];
    match upload {
        UploadOutcome::Uploaded(body) if body.trim().is_empty() => {
            lines.push("    Response: (empty)".to_string());
        }
        UploadOutcome::Uploaded(body) => {
            lines.push(format!("    Response: {}", truncate_response(body)));
        }
        UploadOutcome::Failed(e) => lines.push(format!("    Failed ({}): {}", e.kind(), e)),
        UploadOutcome::Skipped(reason) => {
            lines.push(format!("    Skipped: {}", skip_reason_text(*reason)));
        }
    }
    lines
}

/// Format a full run.
pub fn format_report(report: &PipelineReport, config: &Config) -> Vec<String> {
    let mut lines = format_save(&report.target, &report.save);
    lines.extend(format_upload(&report.upload, config));
    lines
}

/// Format the effective configuration for `check`.
pub fn format_config(config: &Config) -> Vec<String> {
    vec![
        format!(
            "Storage   <target dir>/{}/{}",
            config.storage.cache_dir, config.storage.file_name
        ),
        format!(
            "Encoding  {} (quality {}, rotation {})",
            config.encoding.format, config.encoding.quality, config.encoding.rotation
        ),
        format!(
            "Upload    {} as '{}' with '{}' (connect {}s, total {}s)",
            config.upload.url.as_deref().unwrap_or("disabled"),
            config.upload.field_name,
            config.upload.form_fields,
            config.upload.connect_timeout_secs,
            config.upload.timeout_secs,
        ),
        format!(
            "Pipeline  on save failure: {}",
            match config.pipeline.on_save_failure {
                SaveFailurePolicy::Continue => "continue",
                SaveFailurePolicy::Abort => "abort",
            }
        ),
    ]
}

pub fn print_report(report: &PipelineReport, config: &Config) {
    for line in format_report(report, config) {
        println!("{}", line);
    }
}

pub fn print_save(target: &Path, save: &SaveOutcome) {
    for line in format_save(target, save) {
        println!("{}", line);
    }
}

pub fn print_upload(upload: &UploadOutcome, config: &Config) {
    for line in format_upload(upload, config) {
        println!("{}", line);
    }
}

pub fn print_config(config: &Config) {
    for line in format_config(config) {
        println!("{}", line);
    }
}
