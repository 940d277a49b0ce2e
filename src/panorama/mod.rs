//! Panorama assembly
//!
//! This module handles:
//! - Stitching downloaded tiles into one canvas (`stitch`)
//! - Debug labels drawn over each tile (`label`)
//! - Generation-specific cropping (`crop`)

pub mod band;
pub mod crop;
pub mod label;
pub mod stitch;

use image::RgbImage;

/// Equirectangular panorama: full 360° horizontally, 180° vertically
pub type Panorama = RgbImage;

pub use crop::{crop, crop_dimensions};
pub use stitch::{stitch, SENTINEL};
