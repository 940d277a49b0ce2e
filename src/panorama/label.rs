//! Debug overlay: tile borders and grid coordinates
//!
//! Everything is drawn inside the tile's own rectangle, so labeling one tile
//! never touches pixels that belong to another.

use font8x8::legacy::BASIC_LEGACY;
use image::Rgb;

use super::band::{Band, Rect};

const BORDER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BORDER_WIDTH: u32 = 2;

const BOX_OFFSET: u32 = 5;
const BOX_WIDTH: u32 = 120;
const BOX_HEIGHT: u32 = 45;
const BOX_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const BOX_ALPHA: f32 = 0.5;

const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const OUTLINE_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const GLYPH_SIZE: i64 = 8;
const LINE_OFFSETS: [i64; 2] = [10, 28];
const TEXT_INSET: i64 = 8;

fn glyph_for_char(ch: char) -> [u8; 8] {
    let index = ch as usize;
    if index < BASIC_LEGACY.len() {
        BASIC_LEGACY[index]
    } else {
        BASIC_LEGACY[b'?' as usize]
    }
}

/// Pixels set by `text` when drawn with its top-left corner at `(x, y)`
fn text_pixels(text: &str, x: i64, y: i64) -> impl Iterator<Item = (i64, i64)> + '_ {
    text.chars().enumerate().flat_map(move |(i, ch)| {
        let glyph = glyph_for_char(ch);
        let origin_x = x + i as i64 * GLYPH_SIZE;
        (0..8).flat_map(move |row| {
            let bits = glyph[row as usize];
            (0..8)
                .filter(move |col| bits & (1 << *col) != 0)
                .map(move |col| (origin_x + col, y + row))
        })
    })
}

/// Draw text with a one-pixel outline for legibility on any background
fn draw_outlined_text(band: &mut Band, text: &str, x: i64, y: i64, clip: Rect) {
    for (px, py) in text_pixels(text, x, y) {
        for dy in -1..=1 {
            for dx in -1..=1 {
                band.put_clipped(px + dx, py + dy, OUTLINE_COLOR, clip);
            }
        }
    }
    for (px, py) in text_pixels(text, x, y) {
        band.put_clipped(px, py, TEXT_COLOR, clip);
    }
}

/// Border, translucent box and `x:X, y:Y` / `z:Z` lines for one tile
pub fn draw_tile_label(band: &mut Band, tile: Rect, grid_x: u32, grid_y: u32, zoom: u32) {
    // ========== Border ==========
    for y in tile.y..tile.y + tile.height {
        for x in tile.x..tile.x + tile.width {
            let on_border = x < tile.x + BORDER_WIDTH
                || y < tile.y + BORDER_WIDTH
                || x + BORDER_WIDTH >= tile.x + tile.width
                || y + BORDER_WIDTH >= tile.y + tile.height;
            if on_border {
                band.put_clipped(x as i64, y as i64, BORDER_COLOR, tile);
            }
        }
    }

    // ========== Label box ==========
    let box_x = tile.x + BOX_OFFSET;
    let box_y = tile.y + BOX_OFFSET;
    for y in box_y..box_y + BOX_HEIGHT {
        for x in box_x..box_x + BOX_WIDTH {
            band.blend_clipped(x as i64, y as i64, BOX_COLOR, BOX_ALPHA, tile);
        }
    }

    // ========== Text ==========
    let lines = [format!("x:{}, y:{}", grid_x, grid_y), format!("z:{}", zoom)];
    for (line, offset) in lines.iter().zip(LINE_OFFSETS) {
        draw_outlined_text(
            band,
            line,
            box_x as i64 + TEXT_INSET,
            box_y as i64 + offset,
            tile,
        );
    }
}
