//! Volume lifecycle engine
//!
//! Create, expand and destroy walk the same path: plan brick sets,
//! reserve device space in one store transaction, then realise the plan
//! through the executor with no transaction held. Any executor failure
//! triggers compensation: best-effort teardown of remote bricks, then a
//! single transaction that reverses every reservation. Compensation
//! errors are logged, never surfaced; the caller always sees the
//! original failure.

use brickio_common::{Error, GIB, PlacementLimits, Result, generate_id};
use brickio_executor::{BrickRequest, Executor, VolumeBrick, VolumeRequest};
use brickio_placement::{BrickPlan, BrickSizeGenerator, SimpleAllocator};
use brickio_store::{
    BrickEntry, ClusterEntry, Db, DeviceEntry, MountInfo, NodeEntry, NodeHostnames, StoreTxn,
    VolumeEntry, VolumeState, cluster_list,
};
use futures::future::join_all;
use std::collections::{HashMap, HashSet, hash_map::Entry};
use std::sync::Arc;
use tracing::{info, warn};

use crate::request::VolumeCreateRequest;

/// Storage hostnames of the nodes backing a set of bricks, keyed by
/// node ID
type HostMap = HashMap<String, NodeHostnames>;

/// Orchestrates the volume lifecycle over one store, one executor and
/// one allocator
pub struct VolumeEngine {
    db: Arc<Db>,
    executor: Arc<dyn Executor>,
    allocator: Arc<SimpleAllocator>,
    limits: PlacementLimits,
}

impl VolumeEngine {
    /// Create an engine with default placement limits
    #[must_use]
    pub fn new(db: Arc<Db>, executor: Arc<dyn Executor>, allocator: Arc<SimpleAllocator>) -> Self {
        Self::with_limits(db, executor, allocator, PlacementLimits::default())
    }

    /// Create an engine with explicit placement limits
    #[must_use]
    pub fn with_limits(
        db: Arc<Db>,
        executor: Arc<dyn Executor>,
        allocator: Arc<SimpleAllocator>,
        limits: PlacementLimits,
    ) -> Self {
        Self {
            db,
            executor,
            allocator,
            limits,
        }
    }

    /// Create a volume: search the candidate clusters for a placement,
    /// commit the reservation, then realise bricks and volume remotely.
    pub async fn create(&self, request: &VolumeCreateRequest) -> Result<VolumeEntry> {
        let (durability, snapshot) = request.resolve()?;
        let volume = VolumeEntry::new(
            request.size,
            durability,
            snapshot,
            request.name.clone(),
            request.clusters.clone(),
        );

        let candidates = if volume.clusters.is_empty() {
            self.db.view(cluster_list)?
        } else {
            volume.clusters.clone()
        };

        let mut placed = None;
        for cluster_id in &candidates {
            match self.alloc_bricks_in_cluster(&volume, cluster_id, request.size) {
                Ok(result) => {
                    placed = Some(result);
                    break;
                }
                Err(err) if err.is_placement_exhausted() => {}
                Err(err) => return Err(err),
            }
        }
        let Some((mut volume, bricks, hosts)) = placed else {
            return Err(Error::NoSpace);
        };

        // Reservation is committed; everything from here on must undo
        // it on failure.
        if let Err(err) = self.create_bricks(&bricks, &hosts).await {
            self.rollback_created_volume(&volume, &bricks);
            return Err(err);
        }

        let assembled = async {
            let primary = bricks
                .first()
                .ok_or_else(|| Error::store("placement produced no bricks"))?;
            let host = manage_host(&hosts, &primary.node_id)?;
            let request = volume_request(&volume, &bricks, &hosts)?;
            self.executor.volume_create(host, &request).await
        }
        .await;
        if let Err(err) = assembled {
            self.teardown_bricks(&bricks, &hosts).await;
            self.rollback_created_volume(&volume, &bricks);
            return Err(err);
        }

        let mount_hosts = storage_hosts(&bricks, &hosts);
        if let Some((primary, backups)) = mount_hosts.split_first() {
            volume.mount = Some(MountInfo {
                device: format!("{primary}:/{}", volume.name),
                backup_volfile_servers: backups.to_vec(),
            });
        }
        volume.state = VolumeState::Created;
        self.db.update(|txn| volume.save(txn))?;

        info!(
            volume = %volume.id,
            name = %volume.name,
            cluster = volume.cluster.as_deref().unwrap_or_default(),
            bricks = bricks.len(),
            "volume created"
        );
        Ok(volume)
    }

    /// Grow a volume by `delta_gib`, appending distribute shards on its
    /// cluster. On failure the volume record is left byte-identical to
    /// its pre-expand state.
    pub async fn expand(&self, volume_id: &str, delta_gib: u64) -> Result<VolumeEntry> {
        if delta_gib == 0 {
            return Err(Error::invalid_request(
                "expansion size must be greater than 0",
            ));
        }

        let volume = self.db.view(|txn| VolumeEntry::from_id(txn, volume_id))?;
        let cluster_id = volume.cluster.clone().ok_or_else(|| {
            Error::invalid_request(format!("volume {volume_id} is not placed on a cluster"))
        })?;

        let mut grown = volume.clone();
        grown.size += delta_gib;

        // Unlike create there is no other cluster to fall back to, so
        // planner errors surface to the caller unchanged.
        let (grown, new_bricks, hosts) =
            self.alloc_bricks_in_cluster(&grown, &cluster_id, delta_gib)?;

        if let Err(err) = self.create_bricks(&new_bricks, &hosts).await {
            self.rollback_expansion(volume_id, delta_gib, &new_bricks);
            return Err(err);
        }

        let expanded = async {
            let primary = new_bricks
                .first()
                .ok_or_else(|| Error::store("expansion produced no bricks"))?;
            let host = manage_host(&hosts, &primary.node_id)?;
            let request = volume_request(&grown, &new_bricks, &hosts)?;
            self.executor.volume_expand(host, &request).await
        }
        .await;
        if let Err(err) = expanded {
            self.teardown_bricks(&new_bricks, &hosts).await;
            self.rollback_expansion(volume_id, delta_gib, &new_bricks);
            return Err(err);
        }

        info!(
            volume = %grown.id,
            delta_gib,
            bricks = new_bricks.len(),
            "volume expanded"
        );
        Ok(grown)
    }

    /// Destroy a volume: verify nothing external pins its bricks, tear
    /// down the remote state, then release every reservation.
    pub async fn destroy(&self, volume_id: &str) -> Result<()> {
        let (volume, bricks, hosts) = self.db.view(|txn| {
            let volume = VolumeEntry::from_id(txn, volume_id)?;
            let bricks = load_bricks(txn, &volume)?;
            let hosts = node_hostnames(txn, &bricks)?;
            Ok((volume, bricks, hosts))
        })?;

        // Both checks are hard stops: a failure leaves store and remote
        // state untouched.
        for brick in &bricks {
            let host = manage_host(&hosts, &brick.node_id)?;
            self.executor
                .brick_destroy_check(host, &brick_request(brick))
                .await?;
        }
        if let Some(primary) = bricks.first() {
            let host = manage_host(&hosts, &primary.node_id)?;
            self.executor.volume_destroy_check(host, &volume.name).await?;
            self.executor.volume_destroy(host, &volume.name).await?;
        }
        for brick in &bricks {
            self.destroy_brick_logged(brick, &hosts).await;
        }

        self.db.update(|txn| {
            let mut volume = VolumeEntry::from_id(txn, volume_id)?;
            release_bricks(txn, &mut volume, &bricks)?;
            if let Some(cluster_id) = volume.cluster.clone() {
                let mut cluster = ClusterEntry::from_id(txn, &cluster_id)?;
                cluster.volume_remove(&volume.id);
                cluster.save(txn)?;
            }
            volume.delete(txn)
        })?;

        info!(volume = %volume.id, name = %volume.name, "volume destroyed");
        Ok(())
    }

    /// Load a volume and its bricks
    pub fn volume_info(&self, volume_id: &str) -> Result<(VolumeEntry, Vec<BrickEntry>)> {
        self.db.view(|txn| {
            let volume = VolumeEntry::from_id(txn, volume_id)?;
            let bricks = load_bricks(txn, &volume)?;
            Ok((volume, bricks))
        })
    }

    /// All volume IDs in store order
    pub fn volumes(&self) -> Result<Vec<String>> {
        self.db.view(brickio_store::volume_list)
    }

    /// Try successively finer-grained plans against one cluster until a
    /// placement fits or the planner gives up.
    fn alloc_bricks_in_cluster(
        &self,
        volume: &VolumeEntry,
        cluster_id: &str,
        amount_gib: u64,
    ) -> Result<(VolumeEntry, Vec<BrickEntry>, HostMap)> {
        let mut generator =
            BrickSizeGenerator::new(amount_gib * GIB, volume.durability, self.limits);
        loop {
            let plan = generator.next_plan(volume.bricks.len())?;
            match self.try_place(volume, cluster_id, plan) {
                Ok(result) => return Ok(result),
                Err(Error::NoSpace) => {}
                Err(err) => return Err(err),
            }
        }
    }

    /// Attempt one plan in one transaction. Success commits the full
    /// reservation; any failure aborts and leaves no trace.
    fn try_place(
        &self,
        volume: &VolumeEntry,
        cluster_id: &str,
        plan: BrickPlan,
    ) -> Result<(VolumeEntry, Vec<BrickEntry>, HostMap)> {
        self.db.update(|txn| {
            let mut cluster = ClusterEntry::from_id(txn, cluster_id)?;

            if (cluster.nodes.len() as u64) < volume.durability.min_node_count() {
                return Err(Error::NoSpace);
            }
            for existing_id in &cluster.volumes {
                if existing_id == &volume.id {
                    continue;
                }
                let existing = VolumeEntry::from_id(txn, existing_id)?;
                if existing.name == volume.name {
                    return Err(Error::conflict(format!(
                        "volume name {} already in use on cluster {cluster_id}",
                        volume.name
                    )));
                }
            }

            let mut vol = volume.clone();
            let mut devices: HashMap<String, DeviceEntry> = HashMap::new();
            let mut nodes: HashMap<String, NodeEntry> = HashMap::new();
            let mut bricks = Vec::new();

            for _ in 0..plan.sets {
                let mut set_nodes: HashSet<String> = HashSet::new();
                let mut placed_in_set = 0;
                for _ in 0..vol.durability.set_size() {
                    let brick_id = generate_id();
                    let mut placed = None;
                    for device_id in self.allocator.candidates(cluster_id, &brick_id) {
                        let device = match devices.entry(device_id.clone()) {
                            Entry::Occupied(entry) => entry.into_mut(),
                            Entry::Vacant(entry) => {
                                entry.insert(DeviceEntry::from_id(txn, &device_id)?)
                            }
                        };
                        if set_nodes.contains(&device.node_id) {
                            continue;
                        }
                        if let Some(brick) = device.alloc_brick(
                            &brick_id,
                            &vol.id,
                            plan.brick_size,
                            vol.snapshot.factor,
                        ) {
                            placed = Some(brick);
                            break;
                        }
                    }
                    let Some(brick) = placed else { break };

                    set_nodes.insert(brick.node_id.clone());
                    let node = match nodes.entry(brick.node_id.clone()) {
                        Entry::Occupied(entry) => entry.into_mut(),
                        Entry::Vacant(entry) => {
                            entry.insert(NodeEntry::from_id(txn, &brick.node_id)?)
                        }
                    };
                    node.brick_add(&brick.id);
                    vol.brick_add(&brick.id);
                    bricks.push(brick);
                    placed_in_set += 1;
                }
                if !vol.durability.quorum_ok(placed_in_set) {
                    return Err(Error::NoSpace);
                }
            }

            let touched: HashSet<&str> = bricks.iter().map(|b| b.device_id.as_str()).collect();
            for (id, device) in &devices {
                if touched.contains(id.as_str()) {
                    device.save(txn)?;
                }
            }
            for node in nodes.values() {
                node.save(txn)?;
            }
            for brick in &bricks {
                brick.save(txn)?;
            }

            vol.cluster = Some(cluster_id.to_string());
            vol.save(txn)?;
            cluster.volume_add(&vol.id);
            cluster.save(txn)?;

            let hosts = nodes
                .into_iter()
                .map(|(id, node)| (id, node.hostnames))
                .collect();
            Ok((vol, bricks, hosts))
        })
    }

    /// Create all bricks concurrently. If any fail, the ones that were
    /// created are torn down again (best effort) and the first error is
    /// returned.
    async fn create_bricks(&self, bricks: &[BrickEntry], hosts: &HostMap) -> Result<()> {
        let calls = bricks.iter().map(|brick| async move {
            let host = manage_host(hosts, &brick.node_id)?;
            self.executor
                .brick_create(host, &brick_request(brick))
                .await
                .map(|_| ())
        });
        let results = join_all(calls).await;

        let mut created = Vec::new();
        let mut first_error = None;
        for (brick, result) in bricks.iter().zip(results) {
            match result {
                Ok(()) => created.push(brick),
                Err(err) => {
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }
        let Some(err) = first_error else {
            return Ok(());
        };

        for brick in created {
            self.destroy_brick_logged(brick, hosts).await;
        }
        Err(err)
    }

    /// Best-effort teardown of every brick in `bricks`
    async fn teardown_bricks(&self, bricks: &[BrickEntry], hosts: &HostMap) {
        for brick in bricks {
            self.destroy_brick_logged(brick, hosts).await;
        }
    }

    async fn destroy_brick_logged(&self, brick: &BrickEntry, hosts: &HostMap) {
        let result = match manage_host(hosts, &brick.node_id) {
            Ok(host) => self.executor.brick_destroy(host, &brick_request(brick)).await,
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            warn!(brick = %brick.id, error = %err, "brick teardown failed");
        }
    }

    /// Reverse a committed create reservation: devices, nodes, bricks,
    /// the volume record and its cluster link. Failures are logged.
    fn rollback_created_volume(&self, volume: &VolumeEntry, bricks: &[BrickEntry]) {
        let result = self.db.update(|txn| {
            let mut vol = VolumeEntry::from_id(txn, &volume.id)?;
            release_bricks(txn, &mut vol, bricks)?;
            if let Some(cluster_id) = vol.cluster.clone() {
                let mut cluster = ClusterEntry::from_id(txn, &cluster_id)?;
                cluster.volume_remove(&vol.id);
                cluster.save(txn)?;
            }
            vol.delete(txn)
        });
        if let Err(err) = result {
            warn!(volume = %volume.id, error = %err, "create rollback failed");
        }
    }

    /// Reverse a committed expand reservation, restoring the volume
    /// record to its pre-expand value. Failures are logged.
    fn rollback_expansion(&self, volume_id: &str, delta_gib: u64, bricks: &[BrickEntry]) {
        let result = self.db.update(|txn| {
            let mut vol = VolumeEntry::from_id(txn, volume_id)?;
            release_bricks(txn, &mut vol, bricks)?;
            vol.size -= delta_gib;
            vol.save(txn)
        });
        if let Err(err) = result {
            warn!(volume = %volume_id, error = %err, "expand rollback failed");
        }
    }
}

/// Release the reservations of `bricks` and drop every back-reference,
/// deleting the brick records
fn release_bricks(
    txn: &brickio_store::UpdateTxn,
    volume: &mut VolumeEntry,
    bricks: &[BrickEntry],
) -> Result<()> {
    for brick in bricks {
        let mut device = DeviceEntry::from_id(txn, &brick.device_id)?;
        device.release_brick(brick);
        device.save(txn)?;

        let mut node = NodeEntry::from_id(txn, &brick.node_id)?;
        node.brick_remove(&brick.id);
        node.save(txn)?;

        volume.brick_remove(&brick.id);
        brick.delete(txn)?;
    }
    Ok(())
}

/// Load a volume's bricks through the current transaction
fn load_bricks(txn: &impl StoreTxn, volume: &VolumeEntry) -> Result<Vec<BrickEntry>> {
    volume
        .bricks
        .iter()
        .map(|id| BrickEntry::from_id(txn, id))
        .collect()
}

/// Hostnames of every node backing `bricks`
fn node_hostnames(txn: &impl StoreTxn, bricks: &[BrickEntry]) -> Result<HostMap> {
    let mut hosts = HostMap::new();
    for brick in bricks {
        if !hosts.contains_key(&brick.node_id) {
            let node = NodeEntry::from_id(txn, &brick.node_id)?;
            hosts.insert(brick.node_id.clone(), node.hostnames);
        }
    }
    Ok(hosts)
}

fn manage_host<'a>(hosts: &'a HostMap, node_id: &str) -> Result<&'a str> {
    hosts
        .get(node_id)
        .map(|h| h.manage.as_str())
        .ok_or_else(|| Error::not_found(format!("node {node_id}")))
}

/// Distinct storage hostnames of the brick-holding nodes, in placement
/// order; the first entry serves as the mount primary
fn storage_hosts(bricks: &[BrickEntry], hosts: &HostMap) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for brick in bricks {
        if let Some(host) = hosts.get(&brick.node_id)
            && seen.insert(host.storage.clone())
        {
            out.push(host.storage.clone());
        }
    }
    out
}

fn brick_request(brick: &BrickEntry) -> BrickRequest {
    BrickRequest {
        name: brick.id.clone(),
        size: brick.size,
        tp_size: brick.tp_size,
        path: brick.path.clone(),
        vg: brick.vg_name(),
    }
}

fn volume_request(
    volume: &VolumeEntry,
    bricks: &[BrickEntry],
    hosts: &HostMap,
) -> Result<VolumeRequest> {
    let mut volume_bricks = Vec::with_capacity(bricks.len());
    for brick in bricks {
        let host = hosts
            .get(&brick.node_id)
            .ok_or_else(|| Error::not_found(format!("node {}", brick.node_id)))?;
        volume_bricks.push(VolumeBrick {
            id: brick.id.clone(),
            brick: format!("{}:{}", host.storage, brick.path),
        });
    }
    Ok(VolumeRequest {
        name: volume.name.clone(),
        durability: volume.durability,
        bricks: volume_bricks,
    })
}
