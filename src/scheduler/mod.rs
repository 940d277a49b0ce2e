//! Two-level task scheduling over one shared worker pool
//!
//! - Scene level: `run_batches` submits a batch of scenes at once and waits
//!   for all of them before starting the next batch.
//! - Tile level: `fetch_grid` submits every tile of one scene at once.
//!
//! In both cases results are collected in submission order, so progress
//! reporting follows submission order rather than completion order.

pub mod pool;

use std::collections::BTreeMap;
use std::sync::Arc;

use image::RgbImage;
use tracing::{info, warn};

use crate::error::PoolError;
use crate::state::data::{SceneId, TileCoord};
use crate::tiles::fetcher::{TileFetcher, TileImage};
use crate::tiles::generation::GenerationProfile;

pub use pool::{PoolHandle, TaskHandle, WorkerPool};

/// Valid tiles of one scene keyed by grid position `(x, y)`
pub type TileMap = BTreeMap<(u32, u32), RgbImage>;

/// Run `task` over `items` in sequential batches of `batch_size`.
///
/// Every item of a batch is submitted before any result is awaited;
/// `on_result` sees results in submission order.
pub fn run_batches<I, R, F, C>(
    pool: &PoolHandle,
    items: &[I],
    batch_size: usize,
    task: F,
    mut on_result: C,
) where
    I: Clone + Send + 'static,
    R: Send + 'static,
    F: Fn(I) -> R + Send + Sync + 'static,
    C: FnMut(&I, Result<R, PoolError>),
{
    let task = Arc::new(task);

    for batch in items.chunks(batch_size.max(1)) {
        let handles: Vec<TaskHandle<R>> = batch
            .iter()
            .cloned()
            .map(|item| {
                let task = Arc::clone(&task);
                pool.submit(move || task(item))
            })
            .collect();

        for (item, handle) in batch.iter().zip(handles) {
            on_result(item, handle.wait());
        }
    }
}

/// Grid coordinates of a profile in submission order (column-major)
pub fn grid_coords(profile: &GenerationProfile) -> Vec<TileCoord> {
    (0..profile.grid_width)
        .flat_map(|x| (0..profile.grid_height).map(move |y| TileCoord::new(x, y, profile.zoom)))
        .collect()
}

/// Fetch every tile of the profile's grid concurrently.
///
/// Returns exactly one `TileImage` per grid cell, in submission order.
/// A tile task that panicked is reported as an invalid tile.
pub fn fetch_grid(
    pool: &PoolHandle,
    fetcher: &Arc<TileFetcher>,
    scene: &SceneId,
    profile: &GenerationProfile,
) -> Vec<TileImage> {
    let coords = grid_coords(profile);
    let total = coords.len();

    let handles: Vec<(TileCoord, TaskHandle<TileImage>)> = coords
        .into_iter()
        .map(|coord| {
            let fetcher = Arc::clone(fetcher);
            let scene = scene.clone();
            (coord, pool.submit(move || fetcher.fetch(&scene, coord)))
        })
        .collect();

    let mut results = Vec::with_capacity(total);
    for (completed, (coord, handle)) in handles.into_iter().enumerate() {
        let tile = match handle.wait() {
            Ok(tile) => tile,
            Err(err) => {
                warn!(scene = %scene, x = coord.x, y = coord.y, error = %err, "tile task lost");
                TileImage::invalid(coord)
            }
        };
        results.push(tile);

        let completed = completed + 1;
        if completed % 10 == 0 || completed == total {
            info!(scene = %scene, "Downloaded {}/{} tiles", completed, total);
        }
    }

    results
}

/// Keep only the valid tiles, keyed by grid position
pub fn collect_valid(tiles: Vec<TileImage>) -> TileMap {
    tiles
        .into_iter()
        .filter_map(|tile| {
            let TileImage { coord, image } = tile;
            image.map(|image| ((coord.x, coord.y), image))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_grid_coords_cover_profile() {
        let profile = crate::tiles::generation::get_generation_config(2);
        let coords = grid_coords(&profile);

        assert_eq!(coords.len(), 13 * 6);
        assert_eq!(coords[0], TileCoord::new(0, 0, 4));
        assert_eq!(coords[1], TileCoord::new(0, 1, 4));
        assert_eq!(coords.last(), Some(&TileCoord::new(12, 5, 4)));
    }

    #[test]
    fn test_batches_run_sequentially_in_submission_order() {
        let pool = WorkerPool::new(4).unwrap();
        let batch_log = Arc::new(Mutex::new(Vec::new()));
        let items: Vec<usize> = (0..10).collect();

        let log = Arc::clone(&batch_log);
        let mut seen = Vec::new();
        run_batches(
            &pool.handle(),
            &items,
            4,
            move |i: usize| {
                log.lock().unwrap().push(i / 4);
                i * 10
            },
            |item, result| seen.push((*item, result.unwrap())),
        );

        assert_eq!(seen, (0..10).map(|i| (i, i * 10)).collect::<Vec<_>>());

        // No task of batch n+1 starts before batch n is done
        let batches = batch_log.lock().unwrap().clone();
        assert!(batches.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_collect_valid_drops_invalid_tiles() {
        let tiles = vec![
            TileImage::valid(TileCoord::new(0, 0, 4), RgbImage::new(4, 4)),
            TileImage::invalid(TileCoord::new(1, 0, 4)),
            TileImage::valid(TileCoord::new(1, 1, 4), RgbImage::new(4, 4)),
        ];
        let map = collect_valid(tiles);
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec![(0, 0), (1, 1)]);
    }
}
