//! Topology admission
//!
//! Clusters, nodes and devices enter and leave the system here, with
//! back-references maintained on both sides and removals refused while
//! dependents remain. The allocator ring is kept in step with the
//! store: devices register on admission and deregister on removal, and
//! `restore` rebuilds the rings from the store after a restart.

use brickio_common::{Error, GIB, Result};
use brickio_placement::SimpleAllocator;
use brickio_store::{ClusterEntry, Db, DeviceEntry, NodeEntry, cluster_list, device_list};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Request to admit a node into a cluster
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeAddRequest {
    pub cluster_id: String,
    pub zone: u32,
    pub manage_hostname: String,
    pub storage_hostname: String,
}

/// Request to attach a device to a node
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeviceAddRequest {
    pub node_id: String,
    /// Device name on the node, e.g. `/dev/sdb`
    pub name: String,
    /// Device capacity in GiB
    pub size: u64,
}

/// A whole topology described in one file, ingested cluster by cluster
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TopologyFile {
    pub clusters: Vec<TopologyCluster>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TopologyCluster {
    pub nodes: Vec<TopologyNode>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TopologyNode {
    pub manage_hostname: String,
    pub storage_hostname: String,
    #[serde(default)]
    pub zone: u32,
    pub devices: Vec<TopologyDevice>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TopologyDevice {
    pub name: String,
    /// Capacity in GiB
    pub size: u64,
}

/// Admission and removal of clusters, nodes and devices
pub struct TopologyManager {
    db: Arc<Db>,
    allocator: Arc<SimpleAllocator>,
}

impl TopologyManager {
    #[must_use]
    pub fn new(db: Arc<Db>, allocator: Arc<SimpleAllocator>) -> Self {
        Self { db, allocator }
    }

    /// Create an empty cluster
    pub fn cluster_create(&self) -> Result<ClusterEntry> {
        let cluster = ClusterEntry::new();
        self.db.update(|txn| cluster.save(txn))?;
        info!(cluster = %cluster.id, "cluster created");
        Ok(cluster)
    }

    /// Remove a cluster. Refuses while nodes or volumes remain.
    pub fn cluster_destroy(&self, cluster_id: &str) -> Result<()> {
        self.db.update(|txn| {
            let cluster = ClusterEntry::from_id(txn, cluster_id)?;
            cluster.delete(txn)
        })?;
        self.allocator.remove_cluster(cluster_id);
        info!(cluster = %cluster_id, "cluster destroyed");
        Ok(())
    }

    /// All cluster IDs in store order
    pub fn clusters(&self) -> Result<Vec<String>> {
        self.db.view(cluster_list)
    }

    /// Admit a node into an existing cluster
    pub fn node_add(&self, request: &NodeAddRequest) -> Result<NodeEntry> {
        let node = NodeEntry::new(
            &request.cluster_id,
            request.zone,
            &request.manage_hostname,
            &request.storage_hostname,
        );
        self.db.update(|txn| {
            let mut cluster = ClusterEntry::from_id(txn, &request.cluster_id)?;
            cluster.node_add(&node.id);
            cluster.save(txn)?;
            node.save(txn)
        })?;
        info!(node = %node.id, cluster = %request.cluster_id, "node added");
        Ok(node)
    }

    /// Remove a node. Refuses while devices remain attached.
    pub fn node_remove(&self, node_id: &str) -> Result<()> {
        self.db.update(|txn| {
            let node = NodeEntry::from_id(txn, node_id)?;
            let mut cluster = ClusterEntry::from_id(txn, &node.cluster_id)?;
            node.delete(txn)?;
            cluster.node_remove(node_id);
            cluster.save(txn)
        })?;
        info!(node = %node_id, "node removed");
        Ok(())
    }

    /// Attach a device to an existing node and register it with the
    /// allocator
    pub fn device_add(&self, request: &DeviceAddRequest) -> Result<DeviceEntry> {
        let device = DeviceEntry::new(&request.node_id, &request.name, request.size * GIB);
        let cluster_id = self.db.update(|txn| {
            let mut node = NodeEntry::from_id(txn, &request.node_id)?;
            node.device_add(&device.id);
            node.save(txn)?;
            device.save(txn)?;
            Ok(node.cluster_id)
        })?;
        self.allocator
            .add_device(&cluster_id, &request.node_id, &device.id);
        info!(device = %device.id, node = %request.node_id, "device added");
        Ok(device)
    }

    /// Detach a device. Refuses while bricks remain on it.
    pub fn device_remove(&self, device_id: &str) -> Result<()> {
        let (cluster_id, node_id) = self.db.update(|txn| {
            let device = DeviceEntry::from_id(txn, device_id)?;
            let mut node = NodeEntry::from_id(txn, &device.node_id)?;
            device.delete(txn)?;
            node.device_remove(device_id);
            node.save(txn)?;
            Ok((node.cluster_id.clone(), device.node_id))
        })?;
        self.allocator.remove_device(&cluster_id, &node_id, device_id);
        info!(device = %device_id, "device removed");
        Ok(())
    }

    /// Rebuild the allocator rings from the store. Run once at startup
    /// before serving requests.
    pub fn restore(&self) -> Result<()> {
        let memberships = self.db.view(|txn| {
            let mut memberships = Vec::new();
            for device_id in device_list(txn)? {
                let device = DeviceEntry::from_id(txn, &device_id)?;
                let node = NodeEntry::from_id(txn, &device.node_id)?;
                memberships.push((node.cluster_id, device.node_id, device_id));
            }
            Ok(memberships)
        })?;

        for (cluster_id, node_id, device_id) in &memberships {
            self.allocator.add_device(cluster_id, node_id, device_id);
        }
        info!(devices = memberships.len(), "allocator restored from store");
        Ok(())
    }

    /// Ingest a whole topology file: one new cluster per entry, nodes
    /// and devices admitted beneath it
    pub fn topology_load(&self, topology: &TopologyFile) -> Result<Vec<String>> {
        if topology.clusters.is_empty() {
            return Err(Error::invalid_request("topology has no clusters"));
        }

        let mut cluster_ids = Vec::with_capacity(topology.clusters.len());
        for cluster_spec in &topology.clusters {
            let cluster = self.cluster_create()?;
            for node_spec in &cluster_spec.nodes {
                let node = self.node_add(&NodeAddRequest {
                    cluster_id: cluster.id.clone(),
                    zone: node_spec.zone,
                    manage_hostname: node_spec.manage_hostname.clone(),
                    storage_hostname: node_spec.storage_hostname.clone(),
                })?;
                for device_spec in &node_spec.devices {
                    self.device_add(&DeviceAddRequest {
                        node_id: node.id.clone(),
                        name: device_spec.name.clone(),
                        size: device_spec.size,
                    })?;
                }
            }
            cluster_ids.push(cluster.id);
        }
        Ok(cluster_ids)
    }

    /// Summary of one node for reporting: the node record plus its
    /// devices
    pub fn node_info(&self, node_id: &str) -> Result<(NodeEntry, Vec<DeviceEntry>)> {
        self.db.view(|txn| {
            let node = NodeEntry::from_id(txn, node_id)?;
            let devices = node
                .devices
                .iter()
                .map(|id| DeviceEntry::from_id(txn, id))
                .collect::<Result<Vec<_>>>()?;
            Ok((node, devices))
        })
    }

    /// Summary of one cluster for reporting: the cluster record plus
    /// its nodes
    pub fn cluster_info(&self, cluster_id: &str) -> Result<(ClusterEntry, Vec<NodeEntry>)> {
        self.db.view(|txn| {
            let cluster = ClusterEntry::from_id(txn, cluster_id)?;
            let nodes = cluster
                .nodes
                .iter()
                .map(|id| NodeEntry::from_id(txn, id))
                .collect::<Result<Vec<_>>>()?;
            Ok((cluster, nodes))
        })
    }
}
