//! Generation-specific cropping of stitched panoramas
//!
//! Older grids carry padding below (and for generation 1, right of) the
//! imagery. Crops always keep the top-left corner and never upscale.

use image::imageops;

use super::Panorama;

/// Largest canvas generation 1 imagery fills
pub const GEN1_MAX_WIDTH: u32 = 3328;
pub const GEN1_MAX_HEIGHT: u32 = 1664;

/// Output size of `crop` for a `width`×`height` panorama
pub fn crop_dimensions(width: u32, height: u32, generation: u8) -> (u32, u32) {
    if generation == 1 {
        return (width.min(GEN1_MAX_WIDTH), height.min(GEN1_MAX_HEIGHT));
    }

    // Enforce 2:1 by trimming the bottom
    let target_height = width / 2;
    if height > target_height {
        (width, target_height)
    } else {
        (width, height)
    }
}

/// Crop a panorama for its generation
pub fn crop(panorama: &Panorama, generation: u8) -> Panorama {
    let (width, height) = crop_dimensions(panorama.width(), panorama.height(), generation);
    if (width, height) == panorama.dimensions() {
        return panorama.clone();
    }
    imageops::crop_imm(panorama, 0, 0, width, height).to_image()
}
