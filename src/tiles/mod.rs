//! Tile acquisition
//!
//! This module handles:
//! - Talking to the tile endpoint (`source`)
//! - Retrying, decoding and validating single tiles (`fetcher`)
//! - Detecting which grid layout a scene uses (`generation`)

pub mod fetcher;
pub mod generation;
pub mod source;

pub use fetcher::{Backoff, TileFetcher, TileImage};
pub use generation::{get_generation_config, Detection, GenerationProbe, GenerationProfile};
pub use source::{HttpTileSource, TileResponse, TileSource};
