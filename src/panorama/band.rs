//! Mutable view over one horizontal strip of an RGB canvas
//!
//! The stitcher splits the canvas into one band per tile row. Bands never
//! overlap, so they can be filled on different threads without locking.

use image::{Rgb, RgbImage};

/// Pixel rectangle, in band-local coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= self.x as i64
            && y >= self.y as i64
            && x < (self.x + self.width) as i64
            && y < (self.y + self.height) as i64
    }
}

pub struct Band<'a> {
    data: &'a mut [u8],
    width: u32,
    height: u32,
}

impl<'a> Band<'a> {
    /// Wrap raw RGB8 rows; `data.len()` must be `width * height * 3`
    pub fn new(data: &'a mut [u8], width: u32) -> Self {
        let row_bytes = width as usize * 3;
        let height = if row_bytes == 0 {
            0
        } else {
            (data.len() / row_bytes) as u32
        };
        Self {
            data,
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 3
    }

    pub fn get(&self, x: u32, y: u32) -> Rgb<u8> {
        let i = self.offset(x, y);
        Rgb([self.data[i], self.data[i + 1], self.data[i + 2]])
    }

    /// Write a pixel if it lies inside `clip`
    pub fn put_clipped(&mut self, x: i64, y: i64, color: Rgb<u8>, clip: Rect) {
        if !clip.contains(x, y) || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let i = self.offset(x as u32, y as u32);
        self.data[i..i + 3].copy_from_slice(&color.0);
    }

    /// Mix `color` into a pixel with weight `alpha`
    pub fn blend_clipped(&mut self, x: i64, y: i64, color: Rgb<u8>, alpha: f32, clip: Rect) {
        if !clip.contains(x, y) || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let i = self.offset(x as u32, y as u32);
        for channel in 0..3 {
            let current = self.data[i + channel] as f32;
            let mixed = current * (1.0 - alpha) + color.0[channel] as f32 * alpha;
            self.data[i + channel] = mixed.round().clamp(0.0, 255.0) as u8;
        }
    }

    /// Copy a whole image to `(x, 0)`; rows beyond the band are dropped
    pub fn paste(&mut self, image: &RgbImage, x: u32) {
        if x >= self.width {
            return;
        }
        let copy_width = image.width().min(self.width - x) as usize;
        let rows = image.height().min(self.height);
        let src_row_bytes = image.width() as usize * 3;
        let src = image.as_raw();

        for row in 0..rows {
            let dst = self.offset(x, row);
            let src_start = row as usize * src_row_bytes;
            self.data[dst..dst + copy_width * 3]
                .copy_from_slice(&src[src_start..src_start + copy_width * 3]);
        }
    }
}
