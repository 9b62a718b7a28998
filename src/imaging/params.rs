//! Parameter types for image operations.
//!
//! These types describe *what* to produce, not *how*. They are shared by the
//! [`transform`](super::transform) and [`encoder`](super::encoder) modules,
//! the persister, and the config file.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 100). Clamped on construction.
//! - [`ImageFormat`]: Output codec: JPEG, WEBP or PNG. Unknown names fall back to PNG.
//! - [`Rotation`]: Clockwise quarter turn from the closed set {0, 90, 180, 270}.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(100)
    }
}

/// Output codec for the persisted image.
///
/// Parsing is deliberately lenient: anything that is not a recognised name
/// becomes [`ImageFormat::Png`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Webp,
    #[default]
    Png,
}

impl ImageFormat {
    /// Resolve a format name (`jpeg`, `jpg`, `webp`, `png`), case-insensitive.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Self::Jpeg,
            "webp" => Self::Webp,
            _ => Self::Png,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Webp => "webp",
            Self::Png => "png",
        }
    }

    /// Matching `image` crate codec.
    pub(crate) fn codec(self) -> image::ImageFormat {
        match self {
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Webp => image::ImageFormat::WebP,
            Self::Png => image::ImageFormat::Png,
        }
    }
}

impl From<String> for ImageFormat {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Clockwise rotation in quarter turns.
///
/// Arbitrary angles are not representable, so rotation never fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn from_degrees(degrees: u32) -> Option<Self> {
        match degrees {
            0 => Some(Self::Deg0),
            90 => Some(Self::Deg90),
            180 => Some(Self::Deg180),
            270 => Some(Self::Deg270),
            _ => None,
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// Compose two rotations (applying `self` then `other`).
    pub fn then(self, other: Rotation) -> Self {
        // Sum of two members of the set modulo 360 is always in the set.
        Self::from_degrees((self.degrees() + other.degrees()) % 360).unwrap_or_default()
    }

    /// Whether this rotation swaps width and height.
    pub fn swaps_dimensions(self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }
}

impl TryFrom<u32> for Rotation {
    type Error = String;

    fn try_from(degrees: u32) -> Result<Self, Self::Error> {
        Self::from_degrees(degrees)
            .ok_or_else(|| format!("unsupported rotation {degrees}, expected 0, 90, 180 or 270"))
    }
}

impl From<Rotation> for u32 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_max() {
        assert_eq!(Quality::default().value(), 100);
    }

    #[test]
    fn format_names_resolve() {
        assert_eq!(ImageFormat::from_name("JPEG"), ImageFormat::Jpeg);
        assert_eq!(ImageFormat::from_name("jpg"), ImageFormat::Jpeg);
        assert_eq!(ImageFormat::from_name("webp"), ImageFormat::Webp);
        assert_eq!(ImageFormat::from_name("png"), ImageFormat::Png);
    }

    #[test]
    fn unknown_format_falls_back_to_png() {
        assert_eq!(ImageFormat::from_name("tiff"), ImageFormat::Png);
        assert_eq!(ImageFormat::from_name(""), ImageFormat::Png);
        assert_eq!(ImageFormat::default(), ImageFormat::Png);
        assert_eq!(ImageFormat::from_name("JPG"), ImageFormat::Jpeg);
    }

    #[test]
    fn rotation_rejects_unsupported_degrees() {
        assert_eq!(Rotation::from_degrees(90), Some(Rotation::Deg90));
        assert_eq!(Rotation::from_degrees(45), None);
        assert_eq!(Rotation::from_degrees(360), None);
        assert!(Rotation::try_from(91).is_err());
    }

    #[test]
    fn rotation_composition_wraps() {
        assert_eq!(Rotation::Deg90.then(Rotation::Deg270), Rotation::Deg0);
        assert_eq!(Rotation::Deg180.then(Rotation::Deg270), Rotation::Deg90);
        assert_eq!(Rotation::Deg0.then(Rotation::Deg180), Rotation::Deg180);
    }

    #[test]
    fn rotation_swaps_only_on_odd_quarters() {
        assert!(!Rotation::Deg0.swaps_dimensions());
        assert!(Rotation::Deg90.swaps_dimensions());
        assert!(!Rotation::Deg180.swaps_dimensions());
        assert!(Rotation::Deg270.swaps_dimensions());
    }
}
