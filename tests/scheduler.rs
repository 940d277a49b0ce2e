mod common;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use common::{fast_backoff, MockTileService, SCENE};
use pano_views::scheduler::{fetch_grid, grid_coords, WorkerPool};
use pano_views::state::{SceneId, TileCoord};
use pano_views::tiles::{get_generation_config, TileFetcher};

#[test]
fn test_every_tile_task_resolves_once() {
    let profile = get_generation_config(3);
    let valid: Vec<TileCoord> = grid_coords(&profile)
        .into_iter()
        .filter(|coord| (coord.x + coord.y) % 3 != 0)
        .collect();
    let service = Arc::new(MockTileService::new(valid.clone(), 16));
    let fetcher = Arc::new(TileFetcher::new(service.clone(), 1).with_backoff(fast_backoff()));
    let pool = WorkerPool::new(8).unwrap();

    let tiles = fetch_grid(&pool.handle(), &fetcher, &SceneId::from(SCENE), &profile);

    // N tasks, N results, in submission order
    assert_eq!(tiles.len(), profile.tile_count());
    let coords: Vec<TileCoord> = tiles.iter().map(|tile| tile.coord).collect();
    assert_eq!(coords, grid_coords(&profile));

    // No coordinate was requested twice
    let mut per_coord: HashMap<TileCoord, usize> = HashMap::new();
    for coord in service.requests() {
        *per_coord.entry(coord).or_default() += 1;
    }
    assert!(per_coord.values().all(|&count| count == 1));

    // Successful tiles are exactly the served ones, all inside the grid
    let resolved: HashSet<TileCoord> = tiles
        .iter()
        .filter(|tile| tile.is_valid())
        .map(|tile| tile.coord)
        .collect();
    assert_eq!(resolved, valid.into_iter().collect::<HashSet<_>>());
    assert!(resolved
        .iter()
        .all(|coord| coord.x < profile.grid_width && coord.y < profile.grid_height));
}

#[test]
fn test_panicking_tile_task_becomes_invalid_tile() {
    let profile = get_generation_config(1);
    let service = Arc::new(
        MockTileService::new(grid_coords(&profile), 16).panicking_at(TileCoord::new(3, 2, 3)),
    );
    let fetcher = Arc::new(TileFetcher::new(service, 1).with_backoff(fast_backoff()));
    let pool = WorkerPool::new(2).unwrap();

    let tiles = fetch_grid(&pool.handle(), &fetcher, &SceneId::from(SCENE), &profile);

    assert_eq!(tiles.len(), 32);
    let invalid: Vec<TileCoord> = tiles
        .iter()
        .filter(|tile| !tile.is_valid())
        .map(|tile| tile.coord)
        .collect();
    assert_eq!(invalid, vec![TileCoord::new(3, 2, 3)]);
}

#[test]
fn test_retries_are_bounded() {
    let profile = get_generation_config(1);
    let service = Arc::new(MockTileService::new([], 16));
    let fetcher = Arc::new(TileFetcher::new(service.clone(), 3).with_backoff(fast_backoff()));
    let pool = WorkerPool::new(4).unwrap();

    let tiles = fetch_grid(&pool.handle(), &fetcher, &SceneId::from(SCENE), &profile);

    assert!(tiles.iter().all(|tile| !tile.is_valid()));
    assert_eq!(service.requests().len(), 32 * 3);
}
