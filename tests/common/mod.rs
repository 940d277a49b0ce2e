//! Shared fixtures: an in-memory tile service and synthetic tiles

#![allow(dead_code)]

use image::{ImageFormat, Rgb, RgbImage};
use std::collections::HashSet;
use std::io::Cursor;
use std::sync::Mutex;
use std::time::Duration;

use pano_views::error::TileError;
use pano_views::state::{SceneId, TileCoord};
use pano_views::tiles::{Backoff, TileResponse, TileSource};

pub const SCENE: &str = "TestScene_0123456789ab";

/// Encode a flat-colored tile as PNG
pub fn png_tile(size: u32, color: Rgb<u8>) -> Vec<u8> {
    let mut body = Vec::new();
    RgbImage::from_pixel(size, size, color)
        .write_to(&mut Cursor::new(&mut body), ImageFormat::Png)
        .unwrap();
    body
}

/// Millisecond backoff so retry tests stay fast
pub fn fast_backoff() -> Backoff {
    Backoff {
        unit: Duration::from_millis(1),
        cap: 2.0,
    }
}

/// Serves tiles for a fixed set of coordinates and records every request
pub struct MockTileService {
    valid: HashSet<TileCoord>,
    tile_size: u32,
    panic_on: Option<TileCoord>,
    requests: Mutex<Vec<TileCoord>>,
}

impl MockTileService {
    pub fn new(valid: impl IntoIterator<Item = TileCoord>, tile_size: u32) -> Self {
        Self {
            valid: valid.into_iter().collect(),
            tile_size,
            panic_on: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Make one coordinate blow up inside the tile task
    pub fn panicking_at(mut self, coord: TileCoord) -> Self {
        self.panic_on = Some(coord);
        self
    }

    pub fn requests(&self) -> Vec<TileCoord> {
        self.requests.lock().unwrap().clone()
    }
}

impl TileSource for MockTileService {
    fn get(&self, _scene: &SceneId, coord: TileCoord) -> Result<TileResponse, TileError> {
        self.requests.lock().unwrap().push(coord);

        if self.panic_on == Some(coord) {
            panic!("mock failure at {:?}", coord);
        }
        if !self.valid.contains(&coord) {
            return Ok(TileResponse {
                status: 404,
                body: Vec::new(),
            });
        }

        let shade = 60 + (coord.x * 10 + coord.y * 3) as u8;
        Ok(TileResponse {
            status: 200,
            body: png_tile(self.tile_size, Rgb([shade, 120, 90])),
        })
    }
}
