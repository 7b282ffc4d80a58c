//! Brickio Placement - in-memory placement machinery
//!
//! This crate holds everything the volume engine needs to decide *where*
//! bricks go and *how big* they are: the per-cluster device ring, the
//! durability policies, and the brick-size planner. Nothing here touches
//! the persistent store; capacity checks belong to the lifecycle engine.

pub mod durability;
pub mod planner;
pub mod ring;

pub use durability::Durability;
pub use planner::{BrickPlan, BrickSizeGenerator};
pub use ring::SimpleAllocator;
