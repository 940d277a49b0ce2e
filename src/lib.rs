//! Street-level panorama downloader
//!
//! Downloads the tile grid of each scene, stitches it into an
//! equirectangular panorama and renders eight directional perspective views.

pub mod config;
pub mod error;
pub mod geometry;
pub mod input;
pub mod panorama;
pub mod pipeline;
pub mod projection;
pub mod report;
pub mod scheduler;
pub mod state;
pub mod tiles;
pub mod ui;

pub use config::DownloaderConfig;
pub use pipeline::{Orchestrator, RunSummary};
pub use state::SceneId;
