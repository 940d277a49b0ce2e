use std::fmt;
use tracing::debug;

use crate::error::SceneError;

/// Shared data structures for a download run
///
/// These types flow between the tile layer, the scheduler and the
/// orchestrator.

/// Length of a canonical scene id
pub const SCENE_ID_LEN: usize = 22;

/// Opaque identifier of one panoramic capture on the tile service
///
/// Canonical ids are 22 characters of `[A-Za-z0-9_-]`. Anything else is
/// carried through untouched; the service decides whether it exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneId(String);

impl SceneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id has the canonical 22-character shape
    pub fn is_canonical(&self) -> bool {
        is_canonical_id(&self.0)
    }
}

/// Shape check shared with the input parser
pub fn is_canonical_id(id: &str) -> bool {
    id.len() == SCENE_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SceneId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SceneId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Tile address: grid column, grid row and zoom level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub zoom: u32,
}

impl TileCoord {
    pub const fn new(x: u32, y: u32, zoom: u32) -> Self {
        Self { x, y, zoom }
    }
}

/// Outcome of one scene, as accumulated into the run counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneResult {
    pub scene: SceneId,
    pub success: bool,
}

/// Per-scene pipeline stage
///
/// `Pending → Detecting → Downloading → Stitching → (Cropping) → Projecting → Done`,
/// with `Failed` reachable from every non-terminal stage. `Pending → Done` is
/// taken when a scene's views already exist on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneStage {
    Pending,
    Detecting,
    Downloading,
    Stitching,
    Cropping,
    Projecting,
    Done,
    Failed,
}

impl SceneStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, SceneStage::Done | SceneStage::Failed)
    }

    /// Whether `next` is a legal successor of `self`
    pub fn can_advance_to(self, next: SceneStage) -> bool {
        use SceneStage::*;

        if self.is_terminal() {
            return false;
        }
        if next == Failed {
            return true;
        }
        matches!(
            (self, next),
            (Pending, Detecting)
                | (Pending, Done)
                | (Detecting, Downloading)
                | (Downloading, Stitching)
                | (Stitching, Cropping)
                | (Stitching, Projecting)
                | (Cropping, Projecting)
                | (Projecting, Done)
        )
    }
}

/// Tracks one scene through its stages and rejects illegal jumps
#[derive(Debug)]
pub struct SceneTracker {
    scene: SceneId,
    stage: SceneStage,
    history: Vec<SceneStage>,
}

impl SceneTracker {
    pub fn new(scene: SceneId) -> Self {
        Self {
            scene,
            stage: SceneStage::Pending,
            history: vec![SceneStage::Pending],
        }
    }

    pub fn stage(&self) -> SceneStage {
        self.stage
    }

    /// Every stage visited so far, starting with `Pending`
    pub fn history(&self) -> &[SceneStage] {
        &self.history
    }

    pub fn advance(&mut self, next: SceneStage) -> Result<(), SceneError> {
        if !self.stage.can_advance_to(next) {
            return Err(SceneError::InvalidTransition {
                from: self.stage,
                to: next,
            });
        }
        debug!(scene = %self.scene, from = ?self.stage, to = ?next, "stage transition");
        self.stage = next;
        self.history.push(next);
        Ok(())
    }

    /// Move to `Failed` unless the scene already reached a terminal stage
    pub fn fail(&mut self) {
        if !self.stage.is_terminal() {
            self.stage = SceneStage::Failed;
            self.history.push(SceneStage::Failed);
        }
    }
}
