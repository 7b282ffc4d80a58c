//! Cluster records
//!
//! A cluster is a named pool of nodes whose devices may host bricks of
//! the same volume. It carries only back-references; nodes and volumes
//! maintain the forward side.

use crate::db::{StoreTxn, UpdateTxn};
use crate::tables;
use brickio_common::{Error, IdSet, Result, generate_id};
use serde::{Deserialize, Serialize};

/// Stored cluster record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClusterEntry {
    pub id: String,
    /// Nodes admitted to this cluster
    pub nodes: IdSet,
    /// Volumes placed on this cluster
    pub volumes: IdSet,
    #[serde(default = "crate::schema_version")]
    pub schema: u32,
    /// Fields written by newer releases survive a load/save cycle
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ClusterEntry {
    /// Create an empty cluster with a fresh ID
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: generate_id(),
            nodes: IdSet::new(),
            volumes: IdSet::new(),
            schema: crate::SCHEMA_VERSION,
            extra: serde_json::Map::new(),
        }
    }

    /// Load a cluster by ID
    pub fn from_id(txn: &impl StoreTxn, id: &str) -> Result<Self> {
        match txn.get(tables::CLUSTERS, id)? {
            Some(bytes) => Self::from_bytes(&bytes),
            None => Err(Error::not_found(format!("cluster {id}"))),
        }
    }

    /// Persist this record, replacing any prior version
    pub fn save(&self, txn: &UpdateTxn) -> Result<()> {
        txn.put(tables::CLUSTERS, &self.id, &self.to_bytes()?)
    }

    /// Remove this record. Refuses while nodes or volumes remain.
    pub fn delete(&self, txn: &UpdateTxn) -> Result<()> {
        if !self.nodes.is_empty() {
            return Err(Error::conflict(format!(
                "cluster {} still has {} node(s)",
                self.id,
                self.nodes.len()
            )));
        }
        if !self.volumes.is_empty() {
            return Err(Error::conflict(format!(
                "cluster {} still has {} volume(s)",
                self.id,
                self.volumes.len()
            )));
        }
        txn.remove(tables::CLUSTERS, &self.id)
    }

    pub fn node_add(&mut self, id: &str) {
        self.nodes.insert(id);
    }

    pub fn node_remove(&mut self, id: &str) {
        self.nodes.remove(id);
    }

    pub fn volume_add(&mut self, id: &str) {
        self.volumes.insert(id);
    }

    pub fn volume_remove(&mut self, id: &str) {
        self.volumes.remove(id);
    }

    /// Serialize to the stored representation
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(Error::serialization)
    }

    /// Deserialize from the stored representation
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(Error::serialization)
    }
}

impl Default for ClusterEntry {
    fn default() -> Self {
        Self::new()
    }
}

/// All cluster IDs in store order
pub fn cluster_list(txn: &impl StoreTxn) -> Result<Vec<String>> {
    txn.keys(tables::CLUSTERS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Db;

    fn open_db() -> (tempfile::TempDir, Db) {
        let dir = tempfile::tempdir().unwrap();
        let db = Db::open(dir.path().join("topo.db")).unwrap();
        (dir, db)
    }

    #[test]
    fn test_marshal_round_trip() {
        let mut cluster = ClusterEntry::new();
        cluster.node_add("abc");
        cluster.volume_add("def");

        let restored = ClusterEntry::from_bytes(&cluster.to_bytes().unwrap()).unwrap();
        assert_eq!(cluster, restored);
    }

    #[test]
    fn test_save_load_delete() {
        let (_dir, db) = open_db();
        let cluster = ClusterEntry::new();
        db.update(|txn| cluster.save(txn)).unwrap();

        let loaded = db
            .view(|txn| ClusterEntry::from_id(txn, &cluster.id))
            .unwrap();
        assert_eq!(loaded, cluster);

        db.update(|txn| loaded.delete(txn)).unwrap();
        let err = db
            .view(|txn| ClusterEntry::from_id(txn, &cluster.id))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_delete_refused_while_populated() {
        let (_dir, db) = open_db();
        let mut cluster = ClusterEntry::new();
        cluster.node_add("n1");
        db.update(|txn| cluster.save(txn)).unwrap();

        let err = db.update(|txn| cluster.delete(txn)).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn test_unknown_fields_survive_resave() {
        let mut cluster = ClusterEntry::new();
        cluster.extra.insert(
            "upstream_flag".to_string(),
            serde_json::Value::Bool(true),
        );

        let restored = ClusterEntry::from_bytes(&cluster.to_bytes().unwrap()).unwrap();
        assert_eq!(restored.extra.get("upstream_flag"), Some(&serde_json::Value::Bool(true)));
    }
}
