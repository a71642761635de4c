use std::time::Duration;

use derive_ex::Ex;
use serde::{Deserialize, Serialize};

/// Scheduler tuning.
///
/// Every field has a default, so a partial document deserializes into a complete `Config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Ex)]
#[derive_ex(Default)]
#[default(Self::new())]
#[serde(default)]
pub struct Config {
    /// Time the work loop may spend per host frame before yielding.
    pub frame_budget: Duration,
    /// How often one node may re-render itself in place during a single pass.
    pub max_render_loops: usize,
    /// How many commits in a row immediate effects may dirty before the scheduler gives up.
    pub max_consecutive_dirty: usize,
    /// Enables key diagnostics.
    pub dev: bool,
}

impl Config {
    pub const fn new() -> Self {
        Self {
            frame_budget: Duration::from_millis(5),
            max_render_loops: 25,
            max_consecutive_dirty: 50,
            dev: cfg!(debug_assertions),
        }
    }

    pub fn with_frame_budget(mut self, frame_budget: Duration) -> Self {
        self.frame_budget = frame_budget;
        self
    }
    pub fn with_max_render_loops(mut self, max_render_loops: usize) -> Self {
        self.max_render_loops = max_render_loops;
        self
    }
    pub fn with_max_consecutive_dirty(mut self, max_consecutive_dirty: usize) -> Self {
        self.max_consecutive_dirty = max_consecutive_dirty;
        self
    }
    pub fn with_dev(mut self, dev: bool) -> Self {
        self.dev = dev;
        self
    }
}
