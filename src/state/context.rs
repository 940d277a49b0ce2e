//! Run-wide shared state
//!
//! One `RunContext` is created per run and handed to every scene task by
//! `Arc`. It owns the generation cache, the failure set and the progress
//! counters, and lives exactly as long as the run.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use super::data::{SceneId, SceneResult};
use crate::tiles::generation::Detection;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking scene task must not take the whole run down with it
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Detected generation per scene id, shared across scene tasks
///
/// Each scene owns one slot. The map lock is only held to look the slot up,
/// so detecting one scene never blocks tasks working on other scenes.
#[derive(Debug, Default)]
pub struct GenerationCache {
    entries: Mutex<HashMap<SceneId, Arc<OnceLock<Detection>>>>,
}

impl GenerationCache {
    /// Resolved detection, if any task has finished probing this scene
    pub fn get(&self, scene: &SceneId) -> Option<Detection> {
        lock(&self.entries)
            .get(scene)
            .and_then(|slot| slot.get().cloned())
    }

    /// Slot of a scene, created empty on first use
    ///
    /// Callers initialize it with `get_or_init`; concurrent callers for the
    /// same scene wait for the first one instead of probing again.
    pub fn slot(&self, scene: &SceneId) -> Arc<OnceLock<Detection>> {
        Arc::clone(lock(&self.entries).entry(scene.clone()).or_default())
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Snapshot of the progress counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunCounts {
    pub completed: usize,
    pub successful: usize,
    pub failed: usize,
}

/// Everything scene tasks share during one run
#[derive(Debug, Default)]
pub struct RunContext {
    pub generations: GenerationCache,
    failures: Mutex<BTreeSet<SceneId>>,
    completed: AtomicUsize,
    successful: AtomicUsize,
    failed: AtomicUsize,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a scene to the failure set (idempotent)
    pub fn record_failure(&self, scene: &SceneId) {
        lock(&self.failures).insert(scene.clone());
    }

    pub fn is_failed(&self, scene: &SceneId) -> bool {
        lock(&self.failures).contains(scene)
    }

    /// Sorted copy of the failure set
    pub fn failed_scenes(&self) -> Vec<SceneId> {
        lock(&self.failures).iter().cloned().collect()
    }

    /// Fold one finished scene into the counters and return the new totals
    pub fn record_result(&self, result: &SceneResult) -> RunCounts {
        if result.success {
            self.successful.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
            self.record_failure(&result.scene);
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.counts()
    }

    pub fn counts(&self) -> RunCounts {
        RunCounts {
            completed: self.completed.load(Ordering::SeqCst),
            successful: self.successful.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }
}
