//! Node records

use crate::db::{StoreTxn, UpdateTxn};
use crate::tables;
use brickio_common::{Error, IdSet, Result, generate_id};
use serde::{Deserialize, Serialize};

/// How a node is reached: one address for management traffic (running
/// filesystem commands), one the clients mount from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeHostnames {
    pub manage: String,
    pub storage: String,
}

/// Stored node record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeEntry {
    pub id: String,
    /// Owning cluster
    pub cluster_id: String,
    /// Placement zone hint, preserved for higher layers
    pub zone: u32,
    pub hostnames: NodeHostnames,
    /// Devices attached to this node
    pub devices: IdSet,
    /// Bricks hosted on this node's devices
    pub bricks: IdSet,
    #[serde(default = "crate::schema_version")]
    pub schema: u32,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl NodeEntry {
    /// Create a node with a fresh ID
    #[must_use]
    pub fn new(cluster_id: &str, zone: u32, manage: &str, storage: &str) -> Self {
        Self {
            id: generate_id(),
            cluster_id: cluster_id.to_string(),
            zone,
            hostnames: NodeHostnames {
                manage: manage.to_string(),
                storage: storage.to_string(),
            },
            devices: IdSet::new(),
            bricks: IdSet::new(),
            schema: crate::SCHEMA_VERSION,
            extra: serde_json::Map::new(),
        }
    }

    /// Load a node by ID
    pub fn from_id(txn: &impl StoreTxn, id: &str) -> Result<Self> {
        match txn.get(tables::NODES, id)? {
            Some(bytes) => Self::from_bytes(&bytes),
            None => Err(Error::not_found(format!("node {id}"))),
        }
    }

    /// Persist this record
    pub fn save(&self, txn: &UpdateTxn) -> Result<()> {
        txn.put(tables::NODES, &self.id, &self.to_bytes()?)
    }

    /// Remove this record. Refuses while devices remain attached.
    pub fn delete(&self, txn: &UpdateTxn) -> Result<()> {
        if !self.devices.is_empty() {
            return Err(Error::conflict(format!(
                "node {} still has {} device(s)",
                self.id,
                self.devices.len()
            )));
        }
        txn.remove(tables::NODES, &self.id)
    }

    pub fn device_add(&mut self, id: &str) {
        self.devices.insert(id);
    }

    pub fn device_remove(&mut self, id: &str) {
        self.devices.remove(id);
    }

    pub fn brick_add(&mut self, id: &str) {
        self.bricks.insert(id);
    }

    pub fn brick_remove(&mut self, id: &str) {
        self.bricks.remove(id);
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(Error::serialization)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(Error::serialization)
    }
}

/// All node IDs in store order
pub fn node_list(txn: &impl StoreTxn) -> Result<Vec<String>> {
    txn.keys(tables::NODES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Db;

    #[test]
    fn test_marshal_round_trip() {
        let mut node = NodeEntry::new("cluster1", 1, "mgmt.example", "data.example");
        node.device_add("d1");
        node.brick_add("b1");

        let restored = NodeEntry::from_bytes(&node.to_bytes().unwrap()).unwrap();
        assert_eq!(node, restored);
    }

    #[test]
    fn test_delete_refused_with_devices() {
        let dir = tempfile::tempdir().unwrap();
        let db = Db::open(dir.path().join("topo.db")).unwrap();

        let mut node = NodeEntry::new("cluster1", 0, "m", "s");
        node.device_add("d1");
        db.update(|txn| node.save(txn)).unwrap();

        let err = db.update(|txn| node.delete(txn)).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        node.device_remove("d1");
        db.update(|txn| {
            node.save(txn)?;
            node.delete(txn)
        })
        .unwrap();
        assert!(
            db.view(|txn| NodeEntry::from_id(txn, &node.id))
                .unwrap_err()
                .is_not_found()
        );
    }
}
