mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::{fast_backoff, MockTileService, SCENE};
use pano_views::panorama::{stitch, SENTINEL};
use pano_views::projection::view_file_names;
use pano_views::scheduler::{collect_valid, fetch_grid, WorkerPool};
use pano_views::state::{GenerationCache, SceneId, TileCoord};
use pano_views::tiles::{get_generation_config, GenerationProbe, TileFetcher};
use pano_views::{DownloaderConfig, Orchestrator};

const TILE: u32 = 32;

/// Only the two generation 2 probe tiles exist
fn generation_two_service() -> Arc<MockTileService> {
    Arc::new(MockTileService::new(
        [TileCoord::new(12, 5, 4), TileCoord::new(10, 4, 4)],
        TILE,
    ))
}

#[test]
fn test_generation_two_scene_produces_eight_views() {
    let service = generation_two_service();
    let dir = tempfile::tempdir().unwrap();
    let config = DownloaderConfig {
        output_dir: dir.path().to_path_buf(),
        retry_count: 1,
        host_concurrency: Some(4),
        seed: Some(42),
        ..DownloaderConfig::default()
    };

    let orchestrator =
        Orchestrator::with_source(config, service.clone(), fast_backoff()).unwrap();
    let scene = SceneId::from(SCENE);
    let summary = orchestrator.run(&[scene.clone()], |_, _| {});

    assert!(summary.all_succeeded());
    assert_eq!(summary.successful, 1);
    assert_eq!(
        orchestrator.context().generations.get(&scene).map(|d| d.generation),
        Some(2)
    );

    // The whole 13x6 grid was requested at zoom 4, and no zoom 3 probe ran
    let requested: HashSet<TileCoord> = service.requests().into_iter().collect();
    for x in 0..13 {
        for y in 0..6 {
            assert!(requested.contains(&TileCoord::new(x, y, 4)), "missing ({}, {})", x, y);
        }
    }
    assert!(requested.iter().all(|coord| coord.zoom == 4));

    let mut written: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    written.sort();
    let mut expected = view_file_names(&scene);
    expected.sort();
    assert_eq!(written, expected);
    assert!(expected.contains(&format!("{}_View1_N_FOV90.0.jpg", SCENE)));
    assert!(expected.contains(&format!("{}_View8_NW_FOV90.0.jpg", SCENE)));

    for name in &written {
        let view = image::open(dir.path().join(name)).unwrap();
        assert_eq!((view.width(), view.height()), (512, 512));
    }
}

#[test]
fn test_unfetched_cells_stay_sentinel() {
    let service = generation_two_service();
    let fetcher = Arc::new(TileFetcher::new(service, 1).with_backoff(fast_backoff()));
    let probe = GenerationProbe::new(Arc::clone(&fetcher));
    let scene = SceneId::from(SCENE);

    let detection = probe.probe(&scene, &GenerationCache::default());
    assert_eq!(detection.generation, 2);
    let profile = get_generation_config(detection.generation);

    let pool = WorkerPool::new(3).unwrap();
    let tiles = collect_valid(fetch_grid(&pool.handle(), &fetcher, &scene, &profile));
    assert_eq!(tiles.len(), 2);

    let pano = stitch(&tiles, profile.grid_width, profile.grid_height, profile.zoom, false).unwrap();
    assert_eq!(pano.dimensions(), (13 * TILE, 6 * TILE));

    for x in 0..13 {
        for y in 0..6 {
            let center = pano.get_pixel(x * TILE + TILE / 2, y * TILE + TILE / 2);
            let fetched = (x, y) == (12, 5) || (x, y) == (10, 4);
            assert_eq!(*center == SENTINEL, !fetched, "cell ({}, {})", x, y);
        }
    }
}

#[test]
fn test_undetectable_scene_fails_without_grid_download() {
    let service = Arc::new(MockTileService::new([], TILE));
    let dir = tempfile::tempdir().unwrap();
    let config = DownloaderConfig {
        output_dir: dir.path().to_path_buf(),
        retry_count: 2,
        host_concurrency: Some(2),
        ..DownloaderConfig::default()
    };

    let orchestrator =
        Orchestrator::with_source(config, service.clone(), fast_backoff()).unwrap();
    let summary = orchestrator.run(&[SceneId::from(SCENE)], |_, _| {});

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failed_scenes, vec![SceneId::from(SCENE)]);
    // Probes only: 8 candidate coordinates and 2 fallbacks, one request each
    assert_eq!(service.requests().len(), 10);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_repeated_scene_is_detected_and_rendered_once() {
    let grid = (0..16).flat_map(|x| (0..8).map(move |y| TileCoord::new(x, y, 4)));
    let service = Arc::new(MockTileService::new(grid, TILE));
    let dir = tempfile::tempdir().unwrap();
    let config = DownloaderConfig {
        output_dir: dir.path().to_path_buf(),
        retry_count: 1,
        host_concurrency: Some(4),
        seed: Some(3),
        ..DownloaderConfig::default()
    };

    let orchestrator =
        Orchestrator::with_source(config, service.clone(), fast_backoff()).unwrap();
    let scene = SceneId::from(SCENE);
    let summary = orchestrator.run(&[scene.clone(), scene.clone()], |_, _| {});

    assert_eq!(summary.total, 1);
    assert_eq!(summary.successful, 1);

    // (15, 7) is the first generation 4 probe and also one grid cell
    let corner = TileCoord::new(15, 7, 4);
    let hits = service.requests().iter().filter(|&&coord| coord == corner).count();
    assert_eq!(hits, 2);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 8);
}
