//! Brickio Executor - remote-side capability surface
//!
//! The lifecycle engine never talks to storage nodes directly; it is
//! handed an [`Executor`] and calls it outside any store transaction.
//! The production implementation shells into the filesystem management
//! daemons over SSH and lives outside this workspace; [`MockExecutor`]
//! covers tests and dry-run tooling.
//!
//! Destroy operations are idempotent. Create is not: a failed create
//! must never be retried with the same brick ID.

pub mod mock;

use async_trait::async_trait;
use brickio_common::Result;
use brickio_placement::Durability;
use serde::{Deserialize, Serialize};

pub use mock::MockExecutor;

/// Request to create or destroy one brick on a storage node
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BrickRequest {
    /// Brick ID, also the logical-volume name suffix
    pub name: String,
    /// Raw size in bytes
    pub size: u64,
    /// Thin-pool size in bytes
    pub tp_size: u64,
    /// Mount path of the brick directory
    pub path: String,
    /// Volume group backing the brick
    pub vg: String,
}

/// One brick as referenced by a volume-level request
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VolumeBrick {
    pub id: String,
    /// `<storage-host>:<path>` as the filesystem daemon expects it
    pub brick: String,
}

/// Request to create, expand or destroy a volume
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VolumeRequest {
    pub name: String,
    pub durability: Durability,
    /// Bricks in placement order (replica/disperse sets are consecutive
    /// runs of `durability.set_size()` entries)
    pub bricks: Vec<VolumeBrick>,
}

/// Remote-side information about a created brick
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BrickInfo {
    pub path: String,
}

/// Remote-side information about a created volume
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VolumeInfo {
    pub name: String,
}

/// Capability object that realises placement plans on storage hosts.
///
/// Every call is addressed to the manage hostname of one node. Calls
/// are synchronous request/response exchanges; concurrency across
/// bricks is the caller's choice.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Create one brick (thin pool, logical volume, filesystem, mount)
    async fn brick_create(&self, host: &str, request: &BrickRequest) -> Result<BrickInfo>;

    /// Tear down one brick. Idempotent.
    async fn brick_destroy(&self, host: &str, request: &BrickRequest) -> Result<()>;

    /// Check whether a brick can be destroyed; an error means its thin
    /// pool is still shared with snapshots or clones
    async fn brick_destroy_check(&self, host: &str, request: &BrickRequest) -> Result<()>;

    /// Assemble created bricks into a volume
    async fn volume_create(&self, host: &str, request: &VolumeRequest) -> Result<VolumeInfo>;

    /// Add bricks to an existing volume
    async fn volume_expand(&self, host: &str, request: &VolumeRequest) -> Result<VolumeInfo>;

    /// Tear down a volume. Idempotent.
    async fn volume_destroy(&self, host: &str, volume: &str) -> Result<()>;

    /// Check whether a volume can be destroyed
    async fn volume_destroy_check(&self, host: &str, volume: &str) -> Result<()>;
}
