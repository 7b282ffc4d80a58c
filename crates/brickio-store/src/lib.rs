//! Brickio Store - persistent topology state
//!
//! A single-writer embedded store over redb. All mutation goes through
//! [`Db::update`]; reads go through [`Db::view`]. The five entity records
//! (cluster, node, device, brick, volume) are stored as JSON blobs in one
//! table per entity, keyed by 32-hex entity ID, and reference one another
//! by ID only.

pub mod brick;
pub mod cluster;
pub mod db;
pub mod device;
pub mod node;
pub mod tables;
pub mod volume;

pub use brick::BrickEntry;
pub use cluster::{ClusterEntry, cluster_list};
pub use db::{Db, StoreTxn, UpdateTxn, ViewTxn};
pub use device::{DeviceEntry, DeviceStorage, thin_pool_size};
pub use node::{NodeEntry, NodeHostnames, node_list};
pub use volume::{MountInfo, SnapshotPolicy, VolumeEntry, VolumeState, volume_list};

pub use brick::brick_list;
pub use device::device_list;

/// Version tag written into every stored record
pub(crate) const SCHEMA_VERSION: u32 = 1;

pub(crate) fn schema_version() -> u32 {
    SCHEMA_VERSION
}
