//! Tunable placement limits and thin-pool constants.

use crate::types::{GIB, TIB};
use serde::{Deserialize, Serialize};

/// Thin-pool snapshot factor applied when snapshots are enabled on a
/// volume without an explicit factor.
pub const DEFAULT_THINP_SNAPSHOT_FACTOR: f64 = 1.5;

/// LVM extent size; thin-pool reservations are rounded up to this.
pub const EXTENT_SIZE: u64 = 4 * 1024 * 1024;

/// Thin-pool metadata reserve as a divisor of the pool size (0.5 %).
pub const POOL_METADATA_DIVISOR: u64 = 200;

/// Sizing limits applied when planning the bricks of a volume.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PlacementLimits {
    /// Smallest brick the planner may produce, in bytes
    pub brick_min_size: u64,
    /// Largest brick the planner may produce, in bytes
    pub brick_max_size: u64,
    /// Maximum number of bricks per volume
    pub max_bricks_per_volume: usize,
}

impl Default for PlacementLimits {
    fn default() -> Self {
        Self {
            brick_min_size: GIB,
            brick_max_size: 4 * TIB,
            max_bricks_per_volume: 32,
        }
    }
}
