//! Brickio Engine - the volume lifecycle engine
//!
//! Turns volume requests into placement plans, reserves device space in
//! the store, drives the executor to realise the plan on storage nodes,
//! and compensates on any failure so that store and remote state always
//! agree with "nothing happened".

pub mod request;
pub mod topology;
pub mod volume;

pub use request::{DurabilityRequest, SnapshotRequest, VolumeCreateRequest};
pub use topology::{
    DeviceAddRequest, NodeAddRequest, TopologyCluster, TopologyDevice, TopologyFile,
    TopologyManager, TopologyNode,
};
pub use volume::VolumeEngine;
