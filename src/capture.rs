//! The captured frame handed to the pipeline.
//!
//! A [`CapturedImage`] owns its pixels and records the orientation the
//! producer reported. The pipeline consumes it by value: it is rotated and
//! encoded once, then dropped.

use crate::error::ErrorKind;
use crate::imaging::{Rotation, rotate};
use image::{DynamicImage, ImageReader, RgbImage, RgbaImage};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("image dimensions must be positive, got {width}x{height}")]
    EmptyImage { width: u32, height: u32 },
    #[error("pixel buffer holds {actual} bytes, {width}x{height} needs {expected}")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

impl CaptureError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } => ErrorKind::FileIoFailure,
            _ => ErrorKind::MalformedInput,
        }
    }
}

/// An in-memory frame with its reported orientation.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pixels: DynamicImage,
    orientation: Rotation,
}

impl CapturedImage {
    /// Wrap an already decoded image.
    pub fn new(pixels: DynamicImage, orientation: Rotation) -> Result<Self, CaptureError> {
        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(CaptureError::EmptyImage {
                width: pixels.width(),
                height: pixels.height(),
            });
        }
        Ok(Self {
            pixels,
            orientation,
        })
    }

    /// Build from a tightly packed RGBA8 buffer.
    pub fn from_rgba8(
        width: u32,
        height: u32,
        buffer: Vec<u8>,
        orientation: Rotation,
    ) -> Result<Self, CaptureError> {
        check_buffer(width, height, 4, buffer.len())?;
        let pixels = RgbaImage::from_raw(width, height, buffer)
            .map(DynamicImage::ImageRgba8)
            .ok_or(CaptureError::EmptyImage { width, height })?;
        Self::new(pixels, orientation)
    }

    /// Build from a tightly packed RGB8 buffer.
    pub fn from_rgb8(
        width: u32,
        height: u32,
        buffer: Vec<u8>,
        orientation: Rotation,
    ) -> Result<Self, CaptureError> {
        check_buffer(width, height, 3, buffer.len())?;
        let pixels = RgbImage::from_raw(width, height, buffer)
            .map(DynamicImage::ImageRgb8)
            .ok_or(CaptureError::EmptyImage { width, height })?;
        Self::new(pixels, orientation)
    }

    /// Decode an image file from disk, sniffing the format from its content.
    pub fn open(path: &Path, orientation: Rotation) -> Result<Self, CaptureError> {
        let io_err = |source| CaptureError::Io {
            path: path.to_path_buf(),
            source,
        };
        let pixels = ImageReader::open(path)
            .map_err(io_err)?
            .with_guessed_format()
            .map_err(io_err)?
            .decode()
            .map_err(|source| CaptureError::Decode {
                path: path.to_path_buf(),
                source,
            })?;
        Self::new(pixels, orientation)
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn orientation(&self) -> Rotation {
        self.orientation
    }

    pub fn pixels(&self) -> &DynamicImage {
        &self.pixels
    }

    /// Apply the recorded orientation plus `extra`, returning an image
    /// whose orientation is 0°.
    pub fn upright(self, extra: Rotation) -> Self {
        let total = self.orientation.then(extra);
        let pixels = match total {
            Rotation::Deg0 => self.pixels,
            _ => rotate(&self.pixels, total),
        };
        Self {
            pixels,
            orientation: Rotation::Deg0,
        }
    }
}

fn check_buffer(width: u32, height: u32, channels: usize, actual: usize) -> Result<(), CaptureError> {
    if width == 0 || height == 0 {
        return Err(CaptureError::EmptyImage { width, height });
    }
    let expected = width as usize * height as usize * channels;
    if actual != expected {
        return Err(CaptureError::BufferSize {
            width,
            height,
            expected,
            actual,
        });
    }
    Ok(())
}
