//! Encode a pixel buffer as JPEG, WEBP or PNG.
//!
//! | Format | Codec | Notes |
//! |---|---|---|
//! | JPEG | `image::codecs::jpeg::JpegEncoder` | Lossy, honours [`Quality`]; alpha is dropped |
//! | WEBP | `image::codecs::webp::WebPEncoder` | Lossless only, quality ignored |
//! | PNG  | `image::codecs::png::PngEncoder` | Lossless, quality ignored |
//!
//! Each codec only accepts some colour types, so the buffer is converted to
//! a supported one first. With that conversion in place, any buffer with
//! positive dimensions encodes successfully in all three formats.

use super::params::{ImageFormat, Quality};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ColorType, DynamicImage};
use std::io::Write;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("cannot encode an empty {width}x{height} image")]
    EmptyImage { width: u32, height: u32 },
    #[error("{format} encoding failed: {source}")]
    Codec {
        format: ImageFormat,
        #[source]
        source: image::ImageError,
    },
}

/// Encode `image` into `writer`.
pub fn write_encoded<W: Write>(
    image: &DynamicImage,
    format: ImageFormat,
    quality: Quality,
    writer: W,
) -> Result<(), EncodeError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(EncodeError::EmptyImage {
            width: image.width(),
            height: image.height(),
        });
    }

    let result = match format {
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(writer, quality.value() as u8);
            DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)
        }
        ImageFormat::Webp => {
            let encoder = WebPEncoder::new_lossless(writer);
            if image.color().has_alpha() {
                DynamicImage::ImageRgba8(image.to_rgba8()).write_with_encoder(encoder)
            } else {
                DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)
            }
        }
        ImageFormat::Png => {
            let encoder = PngEncoder::new(writer);
            match image.color() {
                ColorType::Rgb32F | ColorType::Rgba32F => {
                    DynamicImage::ImageRgba8(image.to_rgba8()).write_with_encoder(encoder)
                }
                _ => image.write_with_encoder(encoder),
            }
        }
    };

    result.map_err(|source| EncodeError::Codec { format, source })
}

/// Encode `image` into an in-memory buffer.
pub fn encode(
    image: &DynamicImage,
    format: ImageFormat,
    quality: Quality,
) -> Result<Vec<u8>, EncodeError> {
    let mut bytes = Vec::new();
    write_encoded(image, format, quality, &mut bytes)?;
    Ok(bytes)
}

/// Decode bytes previously produced by [`encode`].
pub fn decode(bytes: &[u8], format: ImageFormat) -> Result<DynamicImage, EncodeError> {
    image::load_from_memory_with_format(bytes, format.codec())
        .map_err(|source| EncodeError::Codec { format, source })
}
