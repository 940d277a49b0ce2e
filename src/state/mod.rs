//! Run state: scene identifiers, stage tracking and the shared run context

pub mod context;
pub mod data;

pub use context::{GenerationCache, RunContext, RunCounts};
pub use data::{SceneId, SceneResult, SceneStage, SceneTracker, TileCoord};
