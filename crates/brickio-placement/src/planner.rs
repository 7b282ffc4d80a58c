//! Brick planner
//!
//! Turns a volume's logical size into a sequence of candidate plans, each
//! a number of distribute shards and a per-brick raw size. The first plan
//! already splits the volume into two shards; every subsequent plan
//! doubles the shard count, so a caller that keeps failing placement
//! retries with progressively smaller bricks until the size floor or the
//! per-volume brick cap stops it.

use crate::durability::Durability;
use brickio_common::{Error, PlacementLimits, Result};

/// One candidate layout for a volume's bricks
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BrickPlan {
    /// Number of distribute shards
    pub sets: u64,
    /// Raw size of every brick, in bytes
    pub brick_size: u64,
}

impl BrickPlan {
    /// Total number of bricks the plan asks for
    #[must_use]
    pub const fn brick_count(&self, durability: Durability) -> u64 {
        self.sets * durability.set_size()
    }
}

/// Generator of successive brick plans for one volume size.
///
/// Shard sizes stay exact because logical sizes are whole GiB and the
/// shard count is a power of two, so every shard divides to a whole
/// number of bytes.
#[derive(Debug)]
pub struct BrickSizeGenerator {
    total: u64,
    sets: u64,
    durability: Durability,
    limits: PlacementLimits,
}

impl BrickSizeGenerator {
    /// Start planning for `total` logical bytes
    #[must_use]
    pub const fn new(total: u64, durability: Durability, limits: PlacementLimits) -> Self {
        Self {
            total,
            sets: 1,
            durability,
            limits,
        }
    }

    /// Produce the next, finer-grained plan.
    ///
    /// `existing_bricks` counts bricks the volume already owns, so that
    /// expansion honours the per-volume cap.
    ///
    /// # Errors
    ///
    /// `MinimumBrickSize` once halving would push bricks below the size
    /// floor; `MaxBricks` once the plan would exceed the per-volume cap.
    pub fn next_plan(&mut self, existing_bricks: usize) -> Result<BrickPlan> {
        loop {
            self.sets *= 2;
            let shard_size = self.total / self.sets;
            let brick_size = self.durability.brick_size(shard_size);

            // Oversized bricks are never offered; keep halving.
            if brick_size > self.limits.brick_max_size {
                continue;
            }

            if brick_size < self.limits.brick_min_size {
                return Err(Error::MinimumBrickSize {
                    brick: brick_size,
                    min: self.limits.brick_min_size,
                });
            }

            let bricks = existing_bricks as u64 + self.sets * self.durability.set_size();
            if bricks > self.limits.max_bricks_per_volume as u64 {
                return Err(Error::MaxBricks {
                    bricks: bricks as usize,
                    max: self.limits.max_bricks_per_volume,
                });
            }

            return Ok(BrickPlan {
                sets: self.sets,
                brick_size,
            });
        }
    }
}
