//! Tile stitching
//!
//! Pastes the valid tiles of a scene into one equirectangular canvas.
//! Cells without a tile keep the sentinel color.

use image::{Rgb, RgbImage};
use rayon::prelude::*;
use tracing::{debug, warn};

use super::band::{Band, Rect};
use super::label::draw_tile_label;
use super::Panorama;
use crate::error::SceneError;
use crate::scheduler::TileMap;

/// Fill color of cells that never received a tile (magenta)
pub const SENTINEL: Rgb<u8> = Rgb([255, 0, 255]);

/// Assemble a panorama from a grid of tiles
///
/// # Arguments
/// * `tiles` - Valid tiles keyed by grid position `(x, y)`
/// * `grid_width`, `grid_height` - Grid size in tiles
/// * `zoom` - Zoom level, only used for the debug labels
/// * `draw_labels` - Draw borders and coordinates on every pasted tile
///
/// # Returns
/// * A `grid_width * tile_w` by `grid_height * tile_h` canvas; tile size is
///   taken from the first tile in coordinate order
///
/// Tile rows are filled in parallel. Each row owns a disjoint band of the
/// canvas, so pasting and labeling need no lock.
pub fn stitch(
    tiles: &TileMap,
    grid_width: u32,
    grid_height: u32,
    zoom: u32,
    draw_labels: bool,
) -> Result<Panorama, SceneError> {
    let Some(first) = tiles.values().next() else {
        return Err(SceneError::EmptyCanvas);
    };
    let (tile_width, tile_height) = first.dimensions();

    let canvas_width = grid_width * tile_width;
    let canvas_height = grid_height * tile_height;
    if canvas_width == 0 || canvas_height == 0 {
        return Err(SceneError::EmptyCanvas);
    }

    let mut canvas = RgbImage::from_pixel(canvas_width, canvas_height, SENTINEL);
    let band_bytes = canvas_width as usize * tile_height as usize * 3;

    canvas
        .par_chunks_mut(band_bytes)
        .enumerate()
        .for_each(|(row, data)| {
            let row = row as u32;
            let mut band = Band::new(data, canvas_width);

            for x in 0..grid_width {
                let Some(tile) = tiles.get(&(x, row)) else {
                    continue;
                };
                if tile.dimensions() != (tile_width, tile_height) {
                    warn!(
                        x,
                        y = row,
                        "Skipping tile of size {}x{} (expected {}x{})",
                        tile.width(),
                        tile.height(),
                        tile_width,
                        tile_height
                    );
                    continue;
                }

                let left = x * tile_width;
                band.paste(tile, left);
                if draw_labels {
                    let rect = Rect::new(left, 0, tile_width, tile_height);
                    draw_tile_label(&mut band, rect, x, row, zoom);
                }
            }
        });

    let outside = tiles
        .keys()
        .filter(|(x, y)| *x >= grid_width || *y >= grid_height)
        .count();
    if outside > 0 {
        debug!(outside, "Ignored tiles outside the grid");
    }

    Ok(canvas)
}
