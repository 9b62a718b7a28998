//! Image operations in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Rotate** | `DynamicImage::rotate90` / `rotate180` / `rotate270` |
//! | **Encode → JPEG** | `JpegEncoder` at the configured quality |
//! | **Encode → WEBP** | `WebPEncoder` (lossless) |
//! | **Encode → PNG** | `PngEncoder` |
//!
//! The module is split into:
//! - **Parameters**: [`Quality`], [`ImageFormat`], [`Rotation`]
//! - **Transform**: rotation about the centre
//! - **Encoder**: codec selection and colour-type conversion

pub mod encoder;
mod params;
pub mod transform;

pub use encoder::{EncodeError, decode, encode, write_encoded};
pub use params::{ImageFormat, Quality, Rotation};
pub use transform::{rotate, rotated_bounds};
