//! Device records and thin-pool space accounting
//!
//! A device is one block device on one node. Space is reserved in
//! thin-pool units: the brick's raw size scaled by the snapshot factor,
//! rounded up to the extent size, plus the pool's metadata reserve. The
//! `used`/`free` pair always satisfies `free = total - used`, and `used`
//! is exactly the sum of the thin-pool sizes of the device's bricks.

use crate::brick::BrickEntry;
use crate::db::{StoreTxn, UpdateTxn};
use crate::tables;
use brickio_common::{EXTENT_SIZE, Error, IdSet, POOL_METADATA_DIVISOR, Result, generate_id};
use serde::{Deserialize, Serialize};

/// Byte counters of a device
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStorage {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

impl DeviceStorage {
    fn allocate(&mut self, amount: u64) {
        self.used += amount;
        self.free = self.total - self.used;
    }

    fn release(&mut self, amount: u64) {
        self.used = self.used.saturating_sub(amount);
        self.free = self.total - self.used;
    }
}

/// Stored device record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub id: String,
    /// Owning node
    pub node_id: String,
    /// Device name on the node, e.g. `/dev/sdb`
    pub name: String,
    pub storage: DeviceStorage,
    /// Bricks carved from this device
    pub bricks: IdSet,
    #[serde(default = "crate::schema_version")]
    pub schema: u32,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DeviceEntry {
    /// Create a device with a fresh ID and nothing used
    #[must_use]
    pub fn new(node_id: &str, name: &str, total: u64) -> Self {
        Self {
            id: generate_id(),
            node_id: node_id.to_string(),
            name: name.to_string(),
            storage: DeviceStorage {
                total,
                used: 0,
                free: total,
            },
            bricks: IdSet::new(),
            schema: crate::SCHEMA_VERSION,
            extra: serde_json::Map::new(),
        }
    }

    /// Load a device by ID
    pub fn from_id(txn: &impl StoreTxn, id: &str) -> Result<Self> {
        match txn.get(tables::DEVICES, id)? {
            Some(bytes) => Self::from_bytes(&bytes),
            None => Err(Error::not_found(format!("device {id}"))),
        }
    }

    /// Persist this record
    pub fn save(&self, txn: &UpdateTxn) -> Result<()> {
        txn.put(tables::DEVICES, &self.id, &self.to_bytes()?)
    }

    /// Remove this record. Refuses while bricks remain.
    pub fn delete(&self, txn: &UpdateTxn) -> Result<()> {
        if !self.bricks.is_empty() {
            return Err(Error::conflict(format!(
                "device {} still has {} brick(s)",
                self.id,
                self.bricks.len()
            )));
        }
        txn.remove(tables::DEVICES, &self.id)
    }

    /// Carve a brick of `size` raw bytes out of this device, reserving
    /// its thin-pool space. Returns `None` when the device cannot hold
    /// the reservation.
    pub fn alloc_brick(
        &mut self,
        brick_id: &str,
        volume_id: &str,
        size: u64,
        snapshot_factor: f64,
    ) -> Option<BrickEntry> {
        let tp_size = thin_pool_size(size, snapshot_factor);
        if self.storage.free < tp_size {
            return None;
        }

        let brick = BrickEntry::new(brick_id, &self.id, &self.node_id, volume_id, size, tp_size);
        self.storage.allocate(tp_size);
        self.bricks.insert(brick.id.as_str());
        Some(brick)
    }

    /// Return a brick's reservation and drop the back-reference
    pub fn release_brick(&mut self, brick: &BrickEntry) {
        self.storage.release(brick.tp_size);
        self.bricks.remove(&brick.id);
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(Error::serialization)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(Error::serialization)
    }
}

/// All device IDs in store order
pub fn device_list(txn: &impl StoreTxn) -> Result<Vec<String>> {
    txn.keys(tables::DEVICES)
}

/// Physical reservation for a brick of `size` raw bytes: the snapshot-
/// scaled pool rounded up to whole extents, plus the pool metadata
/// reserve (0.5 %), also extent-aligned.
#[must_use]
pub fn thin_pool_size(size: u64, snapshot_factor: f64) -> u64 {
    let pool = align_extent((size as f64 * snapshot_factor).ceil() as u64);
    let metadata = align_extent(pool / POOL_METADATA_DIVISOR);
    pool + metadata
}

const fn align_extent(bytes: u64) -> u64 {
    bytes.div_ceil(EXTENT_SIZE) * EXTENT_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;
    use brickio_common::GIB;

    #[test]
    fn test_thin_pool_size_includes_metadata() {
        // 500 GiB at factor 1.0 reserves 502.5 GiB, which is what keeps
        // a 500 GiB brick off a 500 GiB device.
        let tp = thin_pool_size(500 * GIB, 1.0);
        assert!(tp > 500 * GIB);
        assert_eq!(tp, 500 * GIB + (500 * GIB) / 200);
    }

    #[test]
    fn test_thin_pool_size_scales_with_factor() {
        let tp = thin_pool_size(100 * GIB, 1.5);
        assert!(tp >= 150 * GIB);
        assert_eq!(tp % EXTENT_SIZE, 0);
    }

    #[test]
    fn test_alloc_refused_when_full() {
        let mut device = DeviceEntry::new("n1", "/dev/sdb", 10 * GIB);
        assert!(device.alloc_brick(&generate_id(), "v1", 20 * GIB, 1.0).is_none());
        assert_eq!(device.storage.used, 0);
        assert!(device.bricks.is_empty());
    }

    #[test]
    fn test_alloc_release_round_trip() {
        let mut device = DeviceEntry::new("n1", "/dev/sdb", 100 * GIB);
        let brick = device.alloc_brick(&generate_id(), "v1", 10 * GIB, 1.0).unwrap();

        assert_eq!(device.storage.used, brick.tp_size);
        assert_eq!(device.storage.free, device.storage.total - brick.tp_size);
        assert!(device.bricks.contains(&brick.id));
        assert_eq!(brick.device_id, device.id);
        assert_eq!(brick.node_id, "n1");
        assert_eq!(brick.volume_id, "v1");

        device.release_brick(&brick);
        assert_eq!(device.storage.used, 0);
        assert_eq!(device.storage.free, device.storage.total);
        assert!(device.bricks.is_empty());
    }

    #[test]
    fn test_marshal_round_trip() {
        let mut device = DeviceEntry::new("n1", "/dev/sdc", 200 * GIB);
        device.alloc_brick(&generate_id(), "v1", 50 * GIB, 1.5).unwrap();

        let restored = DeviceEntry::from_bytes(&device.to_bytes().unwrap()).unwrap();
        assert_eq!(device, restored);
    }
}
