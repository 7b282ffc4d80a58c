//! Brickio Common - Shared types and utilities
//!
//! This crate provides the error type, identifier minting, the sorted
//! ID-set abstraction, and the tunable placement limits used across all
//! Brickio components.

pub mod error;
pub mod limits;
pub mod types;

pub use error::{Error, Result};
pub use limits::{
    DEFAULT_THINP_SNAPSHOT_FACTOR, EXTENT_SIZE, POOL_METADATA_DIVISOR, PlacementLimits,
};
pub use types::{GIB, IdSet, TIB, generate_id};
