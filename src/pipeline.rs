//! Save-then-upload orchestration.
//!
//! A run takes one [`CapturedImage`] through three steps:
//!
//! ```text
//! 1. Orient   capture    →  upright pixels   (capture orientation + configured rotation)
//! 2. Save     pixels     →  <parent>/cache/IMG.jpeg
//! 3. Upload   that file  →  multipart POST to [upload] url
//! ```
//!
//! Nothing in a run panics or returns `Err`: each step's outcome is recorded
//! in the [`PipelineReport`]. Whether a failed save still leads to an upload
//! is decided by [`SaveFailurePolicy`]. With `continue` the uploader sends
//! whatever image is already at the persisted path from an earlier run.
//!
//! All work happens on the calling thread. Callers that must not block
//! run the pipeline on a worker and cancel it through a [`CancelToken`].

use crate::cancel::CancelToken;
use crate::capture::CapturedImage;
use crate::config::{Config, SaveFailurePolicy};
use crate::error::ErrorKind;
use crate::imaging::ImageFormat;
use crate::persist::{PersistedFile, SaveError, resolve_target, save_image};
use crate::upload::{HttpUploader, UploadBackend, UploadError, UploadRequest};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Outcome of the save step.
#[derive(Debug)]
pub enum SaveOutcome {
    Saved(PersistedFile),
    Failed(SaveError),
    Cancelled,
}

/// Outcome of the upload step.
#[derive(Debug)]
pub enum UploadOutcome {
    /// Response body returned by the endpoint.
    Uploaded(String),
    Failed(UploadError),
    /// Not attempted, with the reason.
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoEndpoint,
    SaveFailed,
    Cancelled,
}

/// Everything a run did.
#[derive(Debug)]
pub struct PipelineReport {
    /// Where the image was (or would have been) stored.
    pub target: PathBuf,
    pub save: SaveOutcome,
    pub upload: UploadOutcome,
}

impl PipelineReport {
    pub fn saved(&self) -> bool {
        matches!(self.save, SaveOutcome::Saved(_))
    }

    pub fn uploaded(&self) -> bool {
        matches!(self.upload, UploadOutcome::Uploaded(_))
    }

    /// Error class of the save step, if it failed.
    pub fn save_error_kind(&self) -> Option<ErrorKind> {
        match &self.save {
            SaveOutcome::Saved(_) => None,
            SaveOutcome::Failed(e) => Some(e.kind()),
            SaveOutcome::Cancelled => Some(ErrorKind::Cancelled),
        }
    }

    /// Error class of the upload step, if it was attempted and failed.
    pub fn upload_error_kind(&self) -> Option<ErrorKind> {
        match &self.upload {
            UploadOutcome::Failed(e) => Some(e.kind()),
            _ => None,
        }
    }
}

/// The configured pipeline.
pub struct Pipeline<U: UploadBackend = HttpUploader> {
    config: Config,
    uploader: U,
}

impl Pipeline<HttpUploader> {
    /// Build a pipeline with the HTTP uploader described by `config.upload`.
    pub fn from_config(config: Config) -> Result<Self, UploadError> {
        let uploader = HttpUploader::new(&config.upload)?;
        Ok(Self::new(config, uploader))
    }
}

impl<U: UploadBackend> Pipeline<U> {
    pub fn new(config: Config, uploader: U) -> Self {
        Self { config, uploader }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the whole pipeline.
    ///
    /// `requested` only contributes its parent directory; see
    /// [`resolve_target`]. `format` overrides the configured format.
    pub fn run(
        &self,
        image: CapturedImage,
        requested: &Path,
        format: Option<ImageFormat>,
        cancel: &CancelToken,
    ) -> PipelineReport {
        let target = resolve_target(requested, &self.config.storage);
        let save = self.save(image, requested, format, cancel);

        let upload = match (&save, self.config.pipeline.on_save_failure) {
            (SaveOutcome::Cancelled, _) => UploadOutcome::Skipped(SkipReason::Cancelled),
            (SaveOutcome::Failed(_), SaveFailurePolicy::Abort) => {
                warn!(target = %target.display(), "save failed, upload aborted by policy");
                UploadOutcome::Skipped(SkipReason::SaveFailed)
            }
            _ => self.upload(&target, cancel),
        };

        PipelineReport {
            target,
            save,
            upload,
        }
    }

    /// Run the pipeline and report only whether the image was saved.
    ///
    /// The upload outcome is logged, not returned.
    pub fn save_and_upload(&self, image: CapturedImage, requested: &Path, format: ImageFormat) -> bool {
        self.run(image, requested, Some(format), &CancelToken::new())
            .saved()
    }

    /// Orient, encode and persist without uploading.
    pub fn save(
        &self,
        image: CapturedImage,
        requested: &Path,
        format: Option<ImageFormat>,
        cancel: &CancelToken,
    ) -> SaveOutcome {
        if cancel.is_cancelled() {
            return SaveOutcome::Cancelled;
        }
        let encoding = &self.config.encoding;
        let upright = image.upright(encoding.rotation);
        match save_image(
            upright.pixels(),
            requested,
            format.unwrap_or(encoding.format),
            encoding.quality(),
            &self.config.storage,
        ) {
            Ok(file) => SaveOutcome::Saved(file),
            Err(e) => {
                error!(requested = %requested.display(), kind = %e.kind(), "saving image failed: {e}");
                SaveOutcome::Failed(e)
            }
        }
    }

    /// Upload the file at `path` to the configured endpoint.
    pub fn upload(&self, path: &Path, cancel: &CancelToken) -> UploadOutcome {
        if cancel.is_cancelled() {
            return UploadOutcome::Skipped(SkipReason::Cancelled);
        }
        let Some(request) = UploadRequest::from_config(&self.config.upload, path) else {
            warn!("no upload url configured, skipping upload");
            return UploadOutcome::Skipped(SkipReason::NoEndpoint);
        };
        match self.uploader.upload(&request, cancel) {
            Ok(body) => {
                info!(url = %request.url, response_bytes = body.len(), "upload finished");
                UploadOutcome::Uploaded(body)
            }
            Err(e) => {
                error!(url = %request.url, kind = %e.kind(), "upload failed: {e}");
                UploadOutcome::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{Rotation, decode};
    use crate::upload::tests::MockUploader;
    use std::fs;
    use tempfile::TempDir;

    fn config_with_url() -> Config {
        let mut config = Config::default();
        config.upload.url = Some("http://127.0.0.1:8088/upload.php".into());
        config
    }

    fn capture(width: u32, height: u32) -> CapturedImage {
        let pixels = vec![128u8; (width * height * 4) as usize];
        CapturedImage::from_rgba8(width, height, pixels, Rotation::Deg0).unwrap()
    }

    fn blocked_target(dir: &Path) -> PathBuf {
        // A regular file where the cache directory should go makes the save fail.
        fs::write(dir.join("cache"), b"blocker").unwrap();
        dir.join("shot.png")
    }

    #[test]
    fn run_saves_then_uploads_persisted_path() {
        let tmp = TempDir::new().unwrap();
        let pipeline = Pipeline::new(config_with_url(), MockUploader::new());

        let report = pipeline.run(
            capture(8, 4),
            &tmp.path().join("IMG_0001.jpg"),
            None,
            &CancelToken::new(),
        );

        assert!(report.saved());
        assert!(report.uploaded());
        assert_eq!(report.target, tmp.path().join("cache/IMG.jpeg"));

        let requests = pipeline.uploader.get_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].file_path, report.target);
        assert_eq!(requests[0].field_name, "fileToUpload");
        assert_eq!(requests[0].form_fields, "submit=Upload");
    }

    #[test]
    fn run_applies_orientation_and_configured_rotation() {
        let tmp = TempDir::new().unwrap();
        let mut config = config_with_url();
        config.encoding.format = ImageFormat::Png;
        config.encoding.rotation = Rotation::Deg180;
        let pipeline = Pipeline::new(config, MockUploader::new());

        let image =
            CapturedImage::from_rgba8(6, 2, vec![10u8; 48], Rotation::Deg90).unwrap();
        let report = pipeline.run(image, &tmp.path().join("x"), None, &CancelToken::new());

        let stored = decode(&fs::read(&report.target).unwrap(), ImageFormat::Png).unwrap();
        // 90° + 180° = 270°: width and height swap.
        assert_eq!((stored.width(), stored.height()), (2, 6));
    }

    #[test]
    fn format_override_wins_over_config() {
        let tmp = TempDir::new().unwrap();
        let pipeline = Pipeline::new(config_with_url(), MockUploader::new());
        let report = pipeline.run(
            capture(3, 3),
            &tmp.path().join("x"),
            Some(ImageFormat::Webp),
            &CancelToken::new(),
        );
        let SaveOutcome::Saved(file) = &report.save else {
            panic!("save failed: {:?}", report.save);
        };
        assert_eq!(file.format, ImageFormat::Webp);
        let bytes = fs::read(&file.path).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), image::ImageFormat::WebP);
    }

    #[test]
    fn failed_save_still_uploads_with_continue_policy() {
        let tmp = TempDir::new().unwrap();
        let requested = blocked_target(tmp.path());
        let pipeline = Pipeline::new(config_with_url(), MockUploader::new());

        let report = pipeline.run(capture(2, 2), &requested, None, &CancelToken::new());

        assert!(!report.saved());
        assert_eq!(report.save_error_kind(), Some(ErrorKind::FileIoFailure));
        assert_eq!(pipeline.uploader.get_requests().len(), 1);
    }

    #[test]
    fn failed_save_skips_upload_with_abort_policy() {
        let tmp = TempDir::new().unwrap();
        let requested = blocked_target(tmp.path());
        let mut config = config_with_url();
        config.pipeline.on_save_failure = SaveFailurePolicy::Abort;
        let pipeline = Pipeline::new(config, MockUploader::new());

        let report = pipeline.run(capture(2, 2), &requested, None, &CancelToken::new());

        assert!(matches!(
            report.upload,
            UploadOutcome::Skipped(SkipReason::SaveFailed)
        ));
        assert!(pipeline.uploader.get_requests().is_empty());
    }

    #[test]
    fn missing_url_skips_upload() {
        let tmp = TempDir::new().unwrap();
        let pipeline = Pipeline::new(Config::default(), MockUploader::new());
        let report = pipeline.run(capture(2, 2), &tmp.path().join("x"), None, &CancelToken::new());

        assert!(report.saved());
        assert!(matches!(
            report.upload,
            UploadOutcome::Skipped(SkipReason::NoEndpoint)
        ));
        assert!(pipeline.uploader.get_requests().is_empty());
    }

    #[test]
    fn upload_failure_is_reported_not_raised() {
        let tmp = TempDir::new().unwrap();
        let pipeline = Pipeline::new(
            config_with_url(),
            MockUploader::failing(UploadError::Status {
                status: 503,
                body: String::new(),
            }),
        );

        let report = pipeline.run(capture(2, 2), &tmp.path().join("x"), None, &CancelToken::new());
        assert!(report.saved());
        assert_eq!(report.upload_error_kind(), Some(ErrorKind::ConnectionFailure));
    }

    #[test]
    fn save_and_upload_returns_save_outcome_only() {
        let tmp = TempDir::new().unwrap();
        let pipeline = Pipeline::new(
            config_with_url(),
            MockUploader::failing(UploadError::Cancelled),
        );
        assert!(pipeline.save_and_upload(capture(2, 2), &tmp.path().join("x"), ImageFormat::Png));

        let blocked = TempDir::new().unwrap();
        let requested = blocked_target(blocked.path());
        let pipeline = Pipeline::new(config_with_url(), MockUploader::new());
        assert!(!pipeline.save_and_upload(capture(2, 2), &requested, ImageFormat::Png));
    }

    #[test]
    fn cancelled_run_does_nothing() {
        let tmp = TempDir::new().unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let pipeline = Pipeline::new(config_with_url(), MockUploader::new());

        let report = pipeline.run(capture(2, 2), &tmp.path().join("x"), None, &cancel);

        assert!(matches!(report.save, SaveOutcome::Cancelled));
        assert!(matches!(
            report.upload,
            UploadOutcome::Skipped(SkipReason::Cancelled)
        ));
        assert!(!report.target.exists());
        assert!(pipeline.uploader.get_requests().is_empty());
    }

    #[test]
    fn repeated_runs_overwrite_single_file() {
        let tmp = TempDir::new().unwrap();
        let mut config = config_with_url();
        config.encoding.format = ImageFormat::Png;
        let pipeline = Pipeline::new(config, MockUploader::new());

        pipeline.run(capture(4, 4), &tmp.path().join("a.png"), None, &CancelToken::new());
        let report = pipeline.run(capture(7, 5), &tmp.path().join("b.png"), None, &CancelToken::new());

        let entries: Vec<_> = fs::read_dir(tmp.path().join("cache")).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let stored = decode(&fs::read(&report.target).unwrap(), ImageFormat::Png).unwrap();
        assert_eq!((stored.width(), stored.height()), (7, 5));
    }
}
