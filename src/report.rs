//! Machine-readable run report

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::pipeline::RunSummary;

/// Outcome of a whole run, written as JSON
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub failed_scenes: Vec<String>,
}

impl RunReport {
    pub fn new(summary: &RunSummary, started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at,
            total: summary.total,
            successful: summary.successful,
            failed: summary.failed,
            failed_scenes: summary
                .failed_scenes
                .iter()
                .map(|scene| scene.to_string())
                .collect(),
        }
    }

    /// Wall-clock duration of the run in seconds
    pub fn elapsed_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn write(&self, path: &Path) -> Result<(), ConfigError> {
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SceneId;
    use chrono::Duration;

    #[test]
    fn test_report_from_summary() {
        let summary = RunSummary {
            total: 3,
            successful: 2,
            failed: 1,
            failed_scenes: vec![SceneId::from("broken")],
        };
        let started = Utc::now();
        let report = RunReport::new(&summary, started, started + Duration::milliseconds(1500));

        assert_eq!(report.failed_scenes, vec!["broken".to_string()]);
        assert!((report.elapsed_secs() - 1.5).abs() < 1e-9);

        let json = report.to_json().unwrap();
        assert!(json.contains("\"successful\": 2"));
        assert!(json.contains("\"started_at\""));
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let summary = RunSummary {
            total: 0,
            successful: 0,
            failed: 0,
            failed_scenes: Vec::new(),
        };
        let now = Utc::now();
        RunReport::new(&summary, now, now).write(&path).unwrap();

        let restored: RunReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(restored.total, 0);
    }
}
