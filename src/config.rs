//! Pipeline configuration module.
//!
//! Handles loading and validating `imgpost.toml`. Stock defaults are the base
//! layer; the user file only needs the keys it wants to change. Command-line
//! flags override both.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [storage]
//! cache_dir = "cache"        # Subdirectory next to the requested target
//! file_name = "IMG.jpeg"     # Fixed name, overwritten on every save
//!
//! [encoding]
//! format = "jpeg"            # jpeg | webp | png (anything else → png)
//! quality = 100              # JPEG quality (1-100)
//! rotation = 0               # Extra clockwise rotation: 0 | 90 | 180 | 270
//!
//! [upload]
//! url = "http://127.0.0.1:8088/upload.php"   # No default: uploads skipped
//! field_name = "fileToUpload"
//! form_fields = "submit=Upload"
//! user_agent = "Android Multipart HTTP Client 1.0"
//! connect_timeout_secs = 10
//! timeout_secs = 60
//!
//! [pipeline]
//! on_save_failure = "continue"   # continue | abort
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{ImageFormat, Quality, Rotation};
use crate::upload::multipart::parse_form_fields;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path};
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "imgpost.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `imgpost.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Where the persisted image lives.
    pub storage: StorageConfig,
    /// Codec, quality and rotation.
    pub encoding: EncodingConfig,
    /// Endpoint and request shape.
    pub upload: UploadConfig,
    /// Stage sequencing policy.
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.encoding.quality) {
            return Err(ConfigError::Validation(
                "encoding.quality must be 1-100".into(),
            ));
        }
        let name = &self.storage.file_name;
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(ConfigError::Validation(format!(
                "storage.file_name must be a plain file name, got '{name}'"
            )));
        }
        let cache_dir = Path::new(&self.storage.cache_dir);
        if cache_dir
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(ConfigError::Validation(format!(
                "storage.cache_dir must be a relative path below the target directory, got '{}'",
                self.storage.cache_dir
            )));
        }
        if self.upload.field_name.is_empty() {
            return Err(ConfigError::Validation(
                "upload.field_name must not be empty".into(),
            ));
        }
        if let Err(e) = parse_form_fields(&self.upload.form_fields) {
            return Err(ConfigError::Validation(format!("upload.form_fields: {e}")));
        }
        if let Some(url) = &self.upload.url {
            let parsed = reqwest::Url::parse(url)
                .map_err(|e| ConfigError::Validation(format!("upload.url '{url}': {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::Validation(format!(
                    "upload.url must be http or https, got '{url}'"
                )));
            }
        }
        if self.upload.connect_timeout_secs == 0 || self.upload.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "upload timeouts must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Location of the persisted image relative to the requested target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Subdirectory of the requested target's parent.
    pub cache_dir: String,
    /// File name used for every save; the requested name is ignored.
    pub file_name: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_dir: "cache".to_string(),
            file_name: "IMG.jpeg".to_string(),
        }
    }
}

/// Encoder settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodingConfig {
    /// Output codec. Unknown names fall back to PNG.
    pub format: ImageFormat,
    /// JPEG quality (1 = worst, 100 = best). Ignored by PNG and WEBP.
    pub quality: u32,
    /// Extra clockwise rotation applied after the capture's own orientation.
    pub rotation: Rotation,
}

impl EncodingConfig {
    pub fn quality(&self) -> Quality {
        Quality::new(self.quality)
    }
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            format: ImageFormat::Jpeg,
            quality: 100,
            rotation: Rotation::Deg0,
        }
    }
}

/// Upload endpoint and request shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    /// Endpoint URL. When absent, the upload stage is skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Name of the multipart file part.
    pub field_name: String,
    /// Extra text parts as `key=value&key=value`.
    pub form_fields: String,
    pub user_agent: String,
    pub connect_timeout_secs: u64,
    /// Whole-request timeout, including streaming the body.
    pub timeout_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            url: None,
            field_name: "fileToUpload".to_string(),
            form_fields: "submit=Upload".to_string(),
            user_agent: "Android Multipart HTTP Client 1.0".to_string(),
            connect_timeout_secs: 10,
            timeout_secs: 60,
        }
    }
}

/// What the pipeline does when the save stage fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveFailurePolicy {
    /// Upload whatever file already sits at the persisted path.
    #[default]
    Continue,
    /// Skip the upload.
    Abort,
}

/// Stage sequencing settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub on_save_failure: SaveFailurePolicy,
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged on top of.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(Config::default())
        .unwrap_or_else(|_| toml::Value::Table(toml::map::Map::new()))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<Config, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config file at `path`, falling back to stock defaults when it
/// does not exist.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    resolve_config(stock_defaults_value(), load_raw_config(path)?)
}

/// Returns a fully-commented stock `imgpost.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# imgpost configuration
# =====================
# All keys are optional; the values below are the defaults.

# ---------------------------------------------------------------------------
# Storage
# ---------------------------------------------------------------------------
[storage]
# The image is written to <target parent>/<cache_dir>/<file_name>. The file
# name of the requested target is ignored, and every save replaces the
# previous image.
cache_dir = "cache"
file_name = "IMG.jpeg"

# ---------------------------------------------------------------------------
# Encoding
# ---------------------------------------------------------------------------
[encoding]
# jpeg | webp | png. Unrecognised values fall back to png.
format = "jpeg"

# JPEG quality (1 = worst, 100 = best). PNG and WEBP are lossless.
quality = 100

# Extra clockwise rotation in degrees: 0, 90, 180 or 270.
rotation = 0

# ---------------------------------------------------------------------------
# Upload
# ---------------------------------------------------------------------------
[upload]
# Endpoint receiving the multipart POST. Uploads are skipped when unset.
# url = "http://127.0.0.1:8088/upload.php"

# Name of the file part.
field_name = "fileToUpload"

# Extra text parts, as key=value pairs joined with '&'.
form_fields = "submit=Upload"

user_agent = "Android Multipart HTTP Client 1.0"

# Seconds to wait for the TCP/TLS connection, and for the whole request.
connect_timeout_secs = 10
timeout_secs = 60

# ---------------------------------------------------------------------------
# Pipeline
# ---------------------------------------------------------------------------
[pipeline]
# What to do when saving fails:
#   continue - still upload whatever file is already at the persisted path
#   abort    - skip the upload
on_save_failure = "continue"
"##
}
