//! Streaming quadtree configuration

use crate::core::error::Error;
use crate::core::types::Result;
use crate::streaming::linear::MAX_LEVEL_COUNT;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tuning parameters for a streaming quadtree
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Number of tree levels, root included
    pub level_count: u32,
    /// Node pool capacity; exceeding it at runtime is fatal
    pub node_pool_capacity: usize,
    /// Subdivision aggressiveness; larger values split farther from the pivot
    pub lod_scale: f32,
    /// Pivot movement below this distance does not re-evaluate the tree
    pub pivot_epsilon: f32,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            level_count: 8,
            node_pool_capacity: 4096,
            lod_scale: 1.0,
            pivot_epsilon: 1e-4,
        }
    }
}

impl StreamingConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Check ranges before constructing a quadtree from external input
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_LEVEL_COUNT).contains(&self.level_count) {
            return Err(Error::Config(format!(
                "level_count {} out of range 1..={}",
                self.level_count, MAX_LEVEL_COUNT
            )));
        }
        if self.node_pool_capacity == 0 {
            return Err(Error::Config("node_pool_capacity must be non-zero".into()));
        }
        if !self.lod_scale.is_finite() || self.lod_scale <= 0.0 {
            return Err(Error::Config(format!("lod_scale {} must be positive", self.lod_scale)));
        }
        if !self.pivot_epsilon.is_finite() || self.pivot_epsilon < 0.0 {
            return Err(Error::Config(format!(
                "pivot_epsilon {} must be non-negative",
                self.pivot_epsilon
            )));
        }
        Ok(())
    }
}
