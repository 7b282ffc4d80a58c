//! Brick records
//!
//! A brick is one sized slice of one device, hosting one member of one
//! distribute shard. Its mount path and volume-group name derive
//! deterministically from the device and brick IDs.

use crate::db::{StoreTxn, UpdateTxn};
use crate::tables;
use brickio_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Base directory bricks are mounted under on storage nodes
pub const BRICK_MOUNT_BASE: &str = "/var/lib/brickio/mounts";

/// Stored brick record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BrickEntry {
    pub id: String,
    pub device_id: String,
    pub node_id: String,
    pub volume_id: String,
    /// Mount path of the brick directory on its node
    pub path: String,
    /// Raw (filesystem-visible) size in bytes
    pub size: u64,
    /// Thin-pool reservation in bytes, `>= size * snapshot-factor`
    pub tp_size: u64,
    #[serde(default = "crate::schema_version")]
    pub schema: u32,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl BrickEntry {
    /// Create a brick under a pre-minted ID with a derived path.
    ///
    /// The ID is minted by the caller before device selection because
    /// the allocator's candidate order is derived from it.
    #[must_use]
    pub fn new(
        id: &str,
        device_id: &str,
        node_id: &str,
        volume_id: &str,
        size: u64,
        tp_size: u64,
    ) -> Self {
        let path = format!("{BRICK_MOUNT_BASE}/vg_{device_id}/brick_{id}/brick");
        Self {
            id: id.to_string(),
            device_id: device_id.to_string(),
            node_id: node_id.to_string(),
            volume_id: volume_id.to_string(),
            path,
            size,
            tp_size,
            schema: crate::SCHEMA_VERSION,
            extra: serde_json::Map::new(),
        }
    }

    /// Volume group the brick's logical volumes live in
    #[must_use]
    pub fn vg_name(&self) -> String {
        format!("vg_{}", self.device_id)
    }

    /// Logical-volume name of the brick
    #[must_use]
    pub fn lv_name(&self) -> String {
        format!("brick_{}", self.id)
    }

    /// Load a brick by ID
    pub fn from_id(txn: &impl StoreTxn, id: &str) -> Result<Self> {
        match txn.get(tables::BRICKS, id)? {
            Some(bytes) => Self::from_bytes(&bytes),
            None => Err(Error::not_found(format!("brick {id}"))),
        }
    }

    /// Persist this record
    pub fn save(&self, txn: &UpdateTxn) -> Result<()> {
        txn.put(tables::BRICKS, &self.id, &self.to_bytes()?)
    }

    /// Remove this record
    pub fn delete(&self, txn: &UpdateTxn) -> Result<()> {
        txn.remove(tables::BRICKS, &self.id)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(Error::serialization)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(Error::serialization)
    }
}

/// All brick IDs in store order
pub fn brick_list(txn: &impl StoreTxn) -> Result<Vec<String>> {
    txn.keys(tables::BRICKS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use brickio_common::{GIB, generate_id};

    #[test]
    fn test_path_is_derived_from_ids() {
        let id = generate_id();
        let brick = BrickEntry::new(&id, "dev1", "node1", "vol1", GIB, GIB);
        assert_eq!(
            brick.path,
            format!("{BRICK_MOUNT_BASE}/vg_dev1/brick_{id}/brick")
        );
        assert_eq!(brick.vg_name(), "vg_dev1");
        assert_eq!(brick.lv_name(), format!("brick_{id}"));
    }

    #[test]
    fn test_marshal_round_trip() {
        let brick = BrickEntry::new(&generate_id(), "dev1", "node1", "vol1", 2 * GIB, 3 * GIB);
        let restored = BrickEntry::from_bytes(&brick.to_bytes().unwrap()).unwrap();
        assert_eq!(brick, restored);
    }
}
