//! Persist an encoded image to its single, fixed location.
//!
//! The caller names a target file, but only its **directory** is used: the
//! image always lands at `<parent>/<cache_dir>/<file_name>` (by default
//! `<parent>/cache/IMG.jpeg`). Every save overwrites the previous one, so
//! there is at most one persisted image per target directory.
//!
//! ## Atomic replacement
//!
//! The image is encoded into a temporary file next to the destination and
//! then renamed over it. A reader (such as the uploader) therefore always
//! sees a complete file: either the previous image or the new one. With
//! concurrent saves the last rename wins. A failed save removes its
//! temporary file and leaves the previous image untouched.

use crate::config::StorageConfig;
use crate::error::ErrorKind;
use crate::imaging::{EncodeError, ImageFormat, Quality, write_encoded};
use image::DynamicImage;
use serde::Serialize;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

/// Mode requested for the persisted image, before the process umask.
#[cfg(unix)]
const PERSISTED_MODE: u32 = 0o644;

#[derive(Error, Debug)]
pub enum SaveError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

impl SaveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } => ErrorKind::FileIoFailure,
            Self::Encode(EncodeError::EmptyImage { .. }) => ErrorKind::MalformedInput,
            Self::Encode(EncodeError::Codec {
                source: image::ImageError::IoError(_),
                ..
            }) => ErrorKind::FileIoFailure,
            Self::Encode(EncodeError::Codec { .. }) => ErrorKind::EncodingFailure,
        }
    }
}

/// A successfully written image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersistedFile {
    pub path: PathBuf,
    pub bytes: u64,
    pub format: ImageFormat,
}

/// Resolve where an image requested at `requested` is actually stored.
///
/// The requested file name is discarded; only its parent directory counts.
pub fn resolve_target(requested: &Path, storage: &StorageConfig) -> PathBuf {
    let parent = requested.parent().unwrap_or_else(|| Path::new(""));
    parent.join(&storage.cache_dir).join(&storage.file_name)
}

/// Encode `image` and atomically replace the file at the resolved target.
pub fn save_image(
    image: &DynamicImage,
    requested: &Path,
    format: ImageFormat,
    quality: Quality,
    storage: &StorageConfig,
) -> Result<PersistedFile, SaveError> {
    let target = resolve_target(requested, storage);
    debug!(requested = %requested.display(), target = %target.display(), "resolved image path");

    let dir = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|source| SaveError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let io_err = |source| SaveError::Io {
        path: target.clone(),
        source,
    };

    // Dropping `tmp` on any early return deletes the temporary file.
    let mut tmp = temp_file_in(dir).map_err(io_err)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write_encoded(image, format, quality, &mut writer)?;
        writer.flush().map_err(io_err)?;
    }
    let bytes = tmp.as_file().metadata().map_err(io_err)?.len();
    tmp.persist(&target).map_err(|e| io_err(e.error))?;

    info!(path = %target.display(), bytes, %format, "image saved");
    Ok(PersistedFile {
        path: target,
        bytes,
        format,
    })
}

/// Temporary file for the next image. The rename keeps its mode, so it is
/// created readable by other users like a plain `File::create` would be.
fn temp_file_in(dir: &Path) -> std::io::Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(".imgpost");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(PERSISTED_MODE));
    }
    builder.tempfile_in(dir)
}
