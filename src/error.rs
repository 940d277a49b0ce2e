//! Error types for the download and rendering pipeline
//!
//! Tile-level errors never escape the fetcher: they are retried and then
//! demoted to an invalid tile. Scene-level errors are caught by the
//! orchestrator, which records the scene as failed and moves on.

use std::path::PathBuf;
use thiserror::Error;

use crate::state::data::SceneStage;

/// Why a single tile request did not produce a usable tile
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TileError {
    /// Transport failure or timeout
    #[error("network error: {0}")]
    Network(String),

    /// The endpoint answered with something other than 200
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("empty response body")]
    EmptyBody,

    /// Body was not a decodable image
    #[error("could not decode tile: {0}")]
    Decode(String),

    /// Decoded fine but is (nearly) uniformly black, or too small
    #[error("tile rejected as blank (mean luminance {mean:.3})")]
    Invalid { mean: f64 },
}

/// Terminal failure of one scene
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("could not detect tile generation")]
    GenerationUndetected,

    #[error("no valid tiles were downloaded")]
    NoTiles,

    #[error("stitching produced an empty canvas")]
    EmptyCanvas,

    #[error("projection failed: {0}")]
    Projection(String),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("illegal stage transition {from:?} -> {to:?}")]
    InvalidTransition { from: SceneStage, to: SceneStage },
}

/// Failures surfaced by a worker pool task handle
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    #[error("task panicked before producing a result")]
    TaskPanicked,

    #[error("worker pool shut down before the task completed")]
    Disconnected,
}

/// Problems reading the scene list or writing the cleaned copy
#[derive(Debug, Error)]
pub enum InputError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed delimited file: {0}")]
    Csv(#[from] csv::Error),

    #[error("no scene ids found in {0}")]
    Empty(PathBuf),
}

/// Problems loading or validating the downloader configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failures building a run before any scene is processed
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// HTTP client could not be constructed
    #[error("tile source unavailable: {0}")]
    Source(#[from] TileError),

    #[error("could not spawn worker threads: {0}")]
    Pool(#[source] std::io::Error),

    #[error("could not create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
