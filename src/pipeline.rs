//! Scene orchestration
//!
//! Drives every scene through detection, download, stitching, optional
//! cropping and projection. A scene that fails anywhere is logged, recorded
//! in the run's failure set and skipped; the run itself keeps going.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::DownloaderConfig;
use crate::error::{SceneError, SetupError};
use crate::panorama::{crop, stitch};
use crate::projection::{save_views, views_exist, Reprojector};
use crate::scheduler::{collect_valid, fetch_grid, run_batches, PoolHandle, WorkerPool};
use crate::state::{RunContext, RunCounts, SceneId, SceneResult, SceneStage, SceneTracker};
use crate::tiles::{
    get_generation_config, Backoff, GenerationProbe, HttpTileSource, TileFetcher, TileSource,
};

/// Totals handed to the reporting side at the end of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Sorted, deduplicated
    pub failed_scenes: Vec<SceneId>,
}

impl RunSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Per-scene jitter source; seeded runs give each scene its own stream
pub fn scene_rng(seed: Option<u64>, index: usize) -> StdRng {
    match seed {
        Some(seed) => {
            StdRng::seed_from_u64(seed ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
        }
        None => StdRng::from_entropy(),
    }
}

/// Everything one scene task needs, shared by `Arc`
struct SceneWorker {
    pool: PoolHandle,
    fetcher: Arc<TileFetcher>,
    probe: GenerationProbe,
    context: Arc<RunContext>,
    config: DownloaderConfig,
    reprojector: Reprojector,
}

impl SceneWorker {
    fn process(&self, scene: &SceneId, index: usize) -> SceneResult {
        let tracker = self.track(scene, index);
        SceneResult {
            scene: scene.clone(),
            success: tracker.stage() == SceneStage::Done,
        }
    }

    /// Run one scene to a terminal stage and hand back its stage history
    fn track(&self, scene: &SceneId, index: usize) -> SceneTracker {
        let mut tracker = SceneTracker::new(scene.clone());

        if let Err(err) = self.run_stages(scene, index, &mut tracker) {
            error!(scene = %scene, stage = ?tracker.stage(), "Error processing {}: {}", scene, err);
            tracker.fail();
            self.context.record_failure(scene);
        }
        tracker
    }

    fn run_stages(
        &self,
        scene: &SceneId,
        index: usize,
        tracker: &mut SceneTracker,
    ) -> Result<(), SceneError> {
        info!(scene = %scene, "Processing panorama {}", scene);

        if self.config.skip_existing && views_exist(&self.config.output_dir, scene) {
            info!(scene = %scene, "All views already exist, skipping");
            return tracker.advance(SceneStage::Done);
        }

        // ========== Detection ==========
        tracker.advance(SceneStage::Detecting)?;
        let detection = self.probe.probe(scene, &self.context.generations);
        if !detection.is_detected() {
            return Err(SceneError::GenerationUndetected);
        }
        info!(scene = %scene, generation = detection.generation, "Detected {}", detection.description);
        let profile = get_generation_config(detection.generation);

        // ========== Download ==========
        tracker.advance(SceneStage::Downloading)?;
        info!(scene = %scene, "Downloading {} tiles", profile.tile_count());
        let tiles = collect_valid(fetch_grid(&self.pool, &self.fetcher, scene, &profile));
        if tiles.is_empty() {
            return Err(SceneError::NoTiles);
        }

        // ========== Stitch ==========
        tracker.advance(SceneStage::Stitching)?;
        info!(scene = %scene, "Stitching panorama from {} tiles", tiles.len());
        let mut panorama = stitch(
            &tiles,
            profile.grid_width,
            profile.grid_height,
            profile.zoom,
            self.config.draw_tile_labels,
        )?;
        drop(tiles);

        // Labels must stay visible, so labeled panoramas are never cropped
        if profile.crop && self.config.auto_crop && !self.config.draw_tile_labels {
            tracker.advance(SceneStage::Cropping)?;
            info!(scene = %scene, "Cropping panorama");
            panorama = crop(&panorama, detection.generation);
        }

        // ========== Project ==========
        tracker.advance(SceneStage::Projecting)?;
        let mut rng = scene_rng(self.config.seed, index);
        let views = self.reprojector.reproject(&panorama, scene, &mut rng)?;
        save_views(&views, &self.config.output_dir)?;

        tracker.advance(SceneStage::Done)
    }
}

/// Owns the worker pool and shared context of a run
pub struct Orchestrator {
    // Holds a submission handle, so it must drop before `pool`
    worker: Arc<SceneWorker>,
    pool: WorkerPool,
    context: Arc<RunContext>,
    batch_size: usize,
}

impl Orchestrator {
    /// Orchestrator talking to the configured HTTP endpoint
    pub fn new(config: DownloaderConfig) -> Result<Self, SetupError> {
        let source = HttpTileSource::new(config.endpoint.clone(), config.timeout())?;
        Self::with_source(config, Arc::new(source), Backoff::default())
    }

    /// Orchestrator over any tile source, with an explicit retry backoff
    pub fn with_source(
        config: DownloaderConfig,
        source: Arc<dyn TileSource>,
        backoff: Backoff,
    ) -> Result<Self, SetupError> {
        config.validate()?;

        std::fs::create_dir_all(&config.output_dir).map_err(|source| SetupError::OutputDir {
            path: config.output_dir.clone(),
            source,
        })?;

        let threads = config.worker_threads();
        let pool = WorkerPool::new(threads).map_err(SetupError::Pool)?;
        info!(
            "Worker pool: {} threads, {} scenes per batch",
            pool.size(),
            config.batch_size()
        );

        let fetcher = Arc::new(TileFetcher::new(source, config.retry_count).with_backoff(backoff));
        let context = Arc::new(RunContext::new());
        let batch_size = config.batch_size();

        let worker = Arc::new(SceneWorker {
            pool: pool.handle(),
            probe: GenerationProbe::new(Arc::clone(&fetcher)),
            fetcher,
            context: Arc::clone(&context),
            config,
            reprojector: Reprojector::new(),
        });

        Ok(Self {
            worker,
            pool,
            context,
            batch_size,
        })
    }

    /// Shared state of the run: generation cache, failure set, counters
    pub fn context(&self) -> &RunContext {
        &self.context
    }

    pub fn pool_size(&self) -> usize {
        self.pool.size()
    }

    /// Process scenes in batches and report each result as it is collected
    ///
    /// Repeated ids are processed once, at their first position; `total`
    /// counts distinct scenes.
    pub fn run<F>(&self, scenes: &[SceneId], mut on_progress: F) -> RunSummary
    where
        F: FnMut(&SceneResult, RunCounts),
    {
        let mut seen = HashSet::new();
        let indexed: Vec<(usize, SceneId)> = scenes
            .iter()
            .cloned()
            .enumerate()
            .filter(|(_, scene)| seen.insert(scene.clone()))
            .collect();

        let duplicates = scenes.len() - indexed.len();
        if duplicates > 0 {
            warn!("Skipping {} duplicate scene ids", duplicates);
        }

        let total = indexed.len();
        info!("Processing {} panoramas", total);

        let worker = Arc::clone(&self.worker);
        let context = Arc::clone(&self.context);

        run_batches(
            &self.pool.handle(),
            &indexed,
            self.batch_size,
            move |(index, scene): (usize, SceneId)| worker.process(&scene, index),
            |(_, scene), outcome| {
                let result = outcome.unwrap_or_else(|err| {
                    error!(scene = %scene, "Scene task lost: {}", err);
                    SceneResult {
                        scene: scene.clone(),
                        success: false,
                    }
                });

                let counts = context.record_result(&result);
                if counts.completed % 5 == 0 || counts.completed == total {
                    info!(
                        "Progress: {}/{} panoramas processed ({} successful, {} failed)",
                        counts.completed, total, counts.successful, counts.failed
                    );
                }
                on_progress(&result, counts);
            },
        );

        let counts = self.context.counts();
        RunSummary {
            total,
            successful: counts.successful,
            failed: counts.failed,
            failed_scenes: self.context.failed_scenes(),
        }
    }
}
