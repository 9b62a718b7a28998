//! Quarter-turn rotation about the image centre.
//!
//! Rotation always produces a new buffer sized to the rotated bounding box:
//! 90° and 270° swap width and height, 0° and 180° keep them. Nothing is
//! cropped, and the input is never mutated.

use super::params::Rotation;
use image::DynamicImage;

/// Rotate `image` clockwise by `rotation`.
pub fn rotate(image: &DynamicImage, rotation: Rotation) -> DynamicImage {
    match rotation {
        Rotation::Deg0 => image.clone(),
        Rotation::Deg90 => image.rotate90(),
        Rotation::Deg180 => image.rotate180(),
        Rotation::Deg270 => image.rotate270(),
    }
}

/// Dimensions of `(width, height)` after `rotation`.
pub fn rotated_bounds(width: u32, height: u32, rotation: Rotation) -> (u32, u32) {
    if rotation.swaps_dimensions() {
        (height, width)
    } else {
        (width, height)
    }
}
