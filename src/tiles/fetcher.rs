//! Single-tile download with retry, decoding and blank-tile rejection

use image::RgbImage;
use rand::Rng;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::warn;

use super::source::{TileResponse, TileSource};
use crate::error::TileError;
use crate::state::data::{SceneId, TileCoord};

/// Tiles smaller than this on either side are rejected
const MIN_TILE_SIDE: u32 = 10;

/// Mean luminance (0-255) a tile must exceed to count as real imagery.
/// Slightly above zero so JPEG noise on an all-black tile still fails.
pub const BLANK_LUMINANCE_THRESHOLD: f64 = 0.1;

/// A downloaded tile; invalid tiles carry no pixels
#[derive(Debug, Clone)]
pub struct TileImage {
    pub coord: TileCoord,
    pub image: Option<RgbImage>,
}

impl TileImage {
    pub fn valid(coord: TileCoord, image: RgbImage) -> Self {
        Self {
            coord,
            image: Some(image),
        }
    }

    pub fn invalid(coord: TileCoord) -> Self {
        Self { coord, image: None }
    }

    pub fn is_valid(&self) -> bool {
        self.image.is_some()
    }
}

/// Mean luminance of an RGB image using BT.601 weights
pub fn mean_luminance(image: &RgbImage) -> f64 {
    let pixel_count = image.width() as u64 * image.height() as u64;
    if pixel_count == 0 {
        return 0.0;
    }

    let sum: f64 = image
        .pixels()
        .map(|p| 0.299 * p[0] as f64 + 0.587 * p[1] as f64 + 0.114 * p[2] as f64)
        .sum();
    sum / pixel_count as f64
}

/// Reject tiles that are too small or (nearly) uniformly black
pub fn check_tile(image: &RgbImage) -> Result<(), TileError> {
    if image.width() < MIN_TILE_SIDE || image.height() < MIN_TILE_SIDE {
        return Err(TileError::Invalid { mean: 0.0 });
    }

    let mean = mean_luminance(image);
    if mean > BLANK_LUMINANCE_THRESHOLD {
        Ok(())
    } else {
        Err(TileError::Invalid { mean })
    }
}

/// Turn a raw response into a usable tile, or say why it is not one
pub fn classify_response(response: TileResponse) -> Result<RgbImage, TileError> {
    if response.status != 200 {
        return Err(TileError::Status(response.status));
    }
    if response.body.is_empty() {
        return Err(TileError::EmptyBody);
    }

    let image = image::load_from_memory(&response.body)
        .map_err(|e| TileError::Decode(e.to_string()))?
        .to_rgb8();

    check_tile(&image)?;
    Ok(image)
}

/// Exponential backoff with jitter: `min(2^attempt + jitter, cap)` time units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// Length of one backoff unit (one second in production)
    pub unit: Duration,
    /// Upper bound in units
    pub cap: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            unit: Duration::from_secs(1),
            cap: 10.0,
        }
    }
}

impl Backoff {
    /// Delay in units before retry `attempt` (attempt 0 never waits).
    /// `jitter` is expected in [0, 1).
    pub fn delay_units(&self, attempt: u32, jitter: f64) -> f64 {
        if attempt == 0 {
            return 0.0;
        }
        let exponent = attempt.min(31) as i32;
        (2f64.powi(exponent) + jitter.clamp(0.0, 1.0)).min(self.cap)
    }

    pub fn delay(&self, attempt: u32, jitter: f64) -> Duration {
        self.unit.mul_f64(self.delay_units(attempt, jitter))
    }
}

/// Downloads tiles through a `TileSource`
///
/// Retries sleep on the calling thread. Inside the worker pool that keeps
/// the slot occupied for the whole backoff, which caps how many retries can
/// hammer the service at once.
pub struct TileFetcher {
    source: Arc<dyn TileSource>,
    retry_count: u32,
    backoff: Backoff,
}

impl TileFetcher {
    pub fn new(source: Arc<dyn TileSource>, retry_count: u32) -> Self {
        Self {
            source,
            retry_count,
            backoff: Backoff::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// One request, no retries
    pub fn fetch_once(&self, scene: &SceneId, coord: TileCoord) -> Result<RgbImage, TileError> {
        let response = self.source.get(scene, coord)?;
        classify_response(response)
    }

    /// Fetch a tile, retrying up to `retry_count` attempts.
    /// Never fails: exhausted tiles come back invalid.
    pub fn fetch(&self, scene: &SceneId, coord: TileCoord) -> TileImage {
        let mut rng = rand::thread_rng();

        for attempt in 0..self.retry_count {
            if attempt > 0 {
                let jitter: f64 = rng.gen();
                thread::sleep(self.backoff.delay(attempt, jitter));
            }

            match self.fetch_once(scene, coord) {
                Ok(image) => return TileImage::valid(coord, image),
                Err(err) => {
                    // Only the final attempt is worth a log line
                    if attempt + 1 == self.retry_count {
                        warn!(
                            scene = %scene,
                            x = coord.x,
                            y = coord.y,
                            zoom = coord.zoom,
                            error = %err,
                            "Failed to download tile at ({}, {})",
                            coord.x,
                            coord.y
                        );
                    }
                }
            }
        }

        TileImage::invalid(coord)
    }
}
