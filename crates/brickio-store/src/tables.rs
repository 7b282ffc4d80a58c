//! Redb table definitions for the topology store.

use redb::TableDefinition;

/// All entity tables share the same shape: 32-hex entity ID to JSON blob.
pub type EntityTable = TableDefinition<'static, &'static str, &'static [u8]>;

pub const CLUSTERS: EntityTable = TableDefinition::new("clusters");
pub const NODES: EntityTable = TableDefinition::new("nodes");
pub const DEVICES: EntityTable = TableDefinition::new("devices");
pub const BRICKS: EntityTable = TableDefinition::new("bricks");
pub const VOLUMES: EntityTable = TableDefinition::new("volumes");

/// Every table, for bootstrap at open time
pub const ALL: [EntityTable; 5] = [CLUSTERS, NODES, DEVICES, BRICKS, VOLUMES];
