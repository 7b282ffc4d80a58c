//! Volume records

use crate::db::{StoreTxn, UpdateTxn};
use crate::tables;
use brickio_common::{Error, IdSet, Result, generate_id};
use brickio_placement::Durability;
use serde::{Deserialize, Serialize};

/// Persisted volume lifecycle state.
///
/// `Planning` and `Destroying` are transient to the lifecycle call and
/// never written to the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeState {
    /// Reservations committed, remote side not yet realised
    Reserved,
    /// Remote volume exists and mount info is recorded
    Created,
}

/// Snapshot policy of a volume
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPolicy {
    pub enable: bool,
    /// Thin-pool over-provisioning factor, `>= 1.0`
    pub factor: f64,
}

/// How clients reach a created volume
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountInfo {
    /// `<primary-host>:/<volume-name>`
    pub device: String,
    /// Storage hostnames of the remaining brick-holding nodes
    pub backup_volfile_servers: Vec<String>,
}

/// Stored volume record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VolumeEntry {
    pub id: String,
    pub name: String,
    /// Cluster the volume landed on; unset until placement commits
    pub cluster: Option<String>,
    /// Candidate clusters requested by the caller, searched in order;
    /// empty means any cluster
    pub clusters: Vec<String>,
    /// Logical size in GiB
    pub size: u64,
    pub durability: Durability,
    pub snapshot: SnapshotPolicy,
    pub bricks: IdSet,
    pub state: VolumeState,
    pub mount: Option<MountInfo>,
    #[serde(default = "crate::schema_version")]
    pub schema: u32,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl VolumeEntry {
    /// Create an unplaced volume record. `name` defaults to
    /// `vol_<id>` when not supplied.
    #[must_use]
    pub fn new(
        size: u64,
        durability: Durability,
        snapshot: SnapshotPolicy,
        name: Option<String>,
        clusters: Vec<String>,
    ) -> Self {
        let id = generate_id();
        let name = name.unwrap_or_else(|| format!("vol_{id}"));
        Self {
            id,
            name,
            cluster: None,
            clusters,
            size,
            durability,
            snapshot,
            bricks: IdSet::new(),
            state: VolumeState::Reserved,
            mount: None,
            schema: crate::SCHEMA_VERSION,
            extra: serde_json::Map::new(),
        }
    }

    /// Load a volume by ID
    pub fn from_id(txn: &impl StoreTxn, id: &str) -> Result<Self> {
        match txn.get(tables::VOLUMES, id)? {
            Some(bytes) => Self::from_bytes(&bytes),
            None => Err(Error::not_found(format!("volume {id}"))),
        }
    }

    /// Persist this record
    pub fn save(&self, txn: &UpdateTxn) -> Result<()> {
        txn.put(tables::VOLUMES, &self.id, &self.to_bytes()?)
    }

    /// Remove this record. Refuses while bricks remain.
    pub fn delete(&self, txn: &UpdateTxn) -> Result<()> {
        if !self.bricks.is_empty() {
            return Err(Error::conflict(format!(
                "volume {} still has {} brick(s)",
                self.id,
                self.bricks.len()
            )));
        }
        txn.remove(tables::VOLUMES, &self.id)
    }

    pub fn brick_add(&mut self, id: &str) {
        self.bricks.insert(id);
    }

    pub fn brick_remove(&mut self, id: &str) {
        self.bricks.remove(id);
    }

    /// Number of distribute shards currently backing the volume
    #[must_use]
    pub fn distribute_count(&self) -> u64 {
        self.bricks.len() as u64 / self.durability.set_size()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(Error::serialization)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(Error::serialization)
    }
}

/// All volume IDs in store order
pub fn volume_list(txn: &impl StoreTxn) -> Result<Vec<String>> {
    txn.keys(tables::VOLUMES)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_volume() -> VolumeEntry {
        VolumeEntry::new(
            1024,
            Durability::Replicate { replica: 2 },
            SnapshotPolicy {
                enable: false,
                factor: 1.0,
            },
            None,
            Vec::new(),
        )
    }

    #[test]
    fn test_default_name() {
        let volume = sample_volume();
        assert_eq!(volume.name, format!("vol_{}", volume.id));
        assert!(volume.cluster.is_none());
        assert!(volume.bricks.is_empty());
    }

    #[test]
    fn test_explicit_name() {
        let volume = VolumeEntry::new(
            10,
            Durability::None,
            SnapshotPolicy {
                enable: false,
                factor: 1.0,
            },
            Some("db-data".to_string()),
            Vec::new(),
        );
        assert_eq!(volume.name, "db-data");
    }

    #[test]
    fn test_marshal_round_trip() {
        let mut volume = sample_volume();
        volume.brick_add("abc");
        volume.brick_add("def");
        volume.cluster = Some("c1".to_string());
        volume.state = VolumeState::Created;
        volume.mount = Some(MountInfo {
            device: format!("host0:/{}", volume.name),
            backup_volfile_servers: vec!["host1".to_string()],
        });

        let restored = VolumeEntry::from_bytes(&volume.to_bytes().unwrap()).unwrap();
        assert_eq!(volume, restored);
    }

    #[test]
    fn test_delete_refused_with_bricks() {
        let dir = tempfile::tempdir().unwrap();
        let db = crate::Db::open(dir.path().join("topo.db")).unwrap();

        let mut volume = sample_volume();
        volume.brick_add("b1");
        db.update(|txn| volume.save(txn)).unwrap();

        let err = db.update(|txn| volume.delete(txn)).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn test_distribute_count() {
        let mut volume = sample_volume();
        for id in ["a", "b", "c", "d"] {
            volume.brick_add(id);
        }
        assert_eq!(volume.distribute_count(), 2);
    }
}
