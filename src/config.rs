//! Downloader configuration
//!
//! Every knob of a run lives here. The struct is serialized to JSON so a
//! run can be described by a config file and then tweaked from the command line.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::tiles::source::DEFAULT_ENDPOINT;

/// All settings for one downloader run
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DownloaderConfig {
    // ========== Network ==========
    /// Attempts per tile before it is given up as invalid (>= 1)
    pub retry_count: u32,

    /// Per-request HTTP timeout in seconds
    pub timeout_secs: u64,

    /// Tile endpoint base URL
    pub endpoint: String,

    // ========== Concurrency ==========
    /// Scenes in flight per batch is twice this value
    pub pano_thread_count: usize,

    /// Hard cap on worker pool size
    pub max_total_threads: usize,

    /// Overrides the detected host parallelism when set
    pub host_concurrency: Option<usize>,

    // ========== Output ==========
    /// Directory receiving the directional views
    pub output_dir: PathBuf,

    /// Apply generation-specific cropping after stitching
    pub auto_crop: bool,

    /// Draw tile borders and coordinate labels (disables cropping)
    pub draw_tile_labels: bool,

    /// Count a scene as done when all of its views already exist
    pub skip_existing: bool,

    /// Seed for view jitter; `None` draws from OS entropy
    pub seed: Option<u64>,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            retry_count: 3,
            timeout_secs: 10,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            pano_thread_count: 4,
            max_total_threads: 512,
            host_concurrency: None,
            output_dir: default_output_dir(),
            auto_crop: true,
            draw_tile_labels: false,
            skip_existing: false,
            seed: None,
        }
    }
}

/// `<home>/streetview_output`, or `./streetview_output` when there is no home
pub fn default_output_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("streetview_output")
}

impl DownloaderConfig {
    /// Load a config from a JSON file; missing fields keep their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Reject settings that would make the run meaningless
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_count == 0 {
            return Err(ConfigError::Invalid("retry_count must be at least 1".into()));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be at least 1".into()));
        }
        if self.pano_thread_count == 0 || self.max_total_threads == 0 {
            return Err(ConfigError::Invalid("thread counts must be at least 1".into()));
        }
        if self.host_concurrency == Some(0) {
            return Err(ConfigError::Invalid("host_concurrency must be at least 1".into()));
        }
        Ok(())
    }

    /// Worker pool size: `min(max_total_threads, host concurrency)`
    pub fn worker_threads(&self) -> usize {
        let host = self.host_concurrency.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        self.max_total_threads.min(host).max(1)
    }

    /// Number of scenes submitted together before waiting
    pub fn batch_size(&self) -> usize {
        self.pano_thread_count.saturating_mul(2).max(1)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
