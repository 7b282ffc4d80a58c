//! Durability policies
//!
//! A volume's durability policy decides how many bricks make up one
//! distribute shard, how much raw space each brick needs relative to the
//! shard's logical size, and how many distinct nodes a placement requires.

use brickio_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default replica count when a replicated volume does not specify one
pub const DEFAULT_REPLICA: u64 = 3;

/// Durability policy for a volume
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Durability {
    /// Distribute only, no redundancy
    None,
    /// Synchronous replication, `replica` copies per shard
    Replicate { replica: u64 },
    /// Erasure coding, `data` data bricks plus `redundancy` parity bricks
    /// per shard
    Disperse { data: u64, redundancy: u64 },
}

impl Default for Durability {
    fn default() -> Self {
        Self::Replicate {
            replica: DEFAULT_REPLICA,
        }
    }
}

impl Durability {
    /// Number of bricks in one brick-set (one distribute shard)
    #[must_use]
    pub const fn set_size(&self) -> u64 {
        match self {
            Self::None => 1,
            Self::Replicate { replica } => *replica,
            Self::Disperse { data, redundancy } => *data + *redundancy,
        }
    }

    /// Minimum number of distinct nodes a cluster needs to host one
    /// brick-set under anti-affinity
    #[must_use]
    pub const fn min_node_count(&self) -> u64 {
        self.set_size()
    }

    /// Raw size of each brick for a shard of `shard_size` logical bytes
    #[must_use]
    pub const fn brick_size(&self, shard_size: u64) -> u64 {
        match self {
            Self::None | Self::Replicate { .. } => shard_size,
            Self::Disperse { data, .. } => shard_size / *data,
        }
    }

    /// Check that a fully iterated placement holds enough bricks.
    ///
    /// Every policy here requires the complete set; a partial set is
    /// never committed.
    #[must_use]
    pub fn quorum_ok(&self, placed: u64) -> bool {
        placed == self.set_size()
    }

    /// Validate request-supplied parameters
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::None => Ok(()),
            Self::Replicate { replica } => {
                if matches!(replica, 2 | 3) {
                    Ok(())
                } else {
                    Err(Error::invalid_request(format!(
                        "replica count {replica} not supported, must be 2 or 3"
                    )))
                }
            }
            Self::Disperse { data, redundancy } => {
                if *data < 2 {
                    Err(Error::invalid_request(format!(
                        "disperse data count {data} must be at least 2"
                    )))
                } else if *redundancy < 1 {
                    Err(Error::invalid_request(
                        "disperse redundancy must be at least 1",
                    ))
                } else if redundancy >= data {
                    Err(Error::invalid_request(format!(
                        "disperse redundancy {redundancy} must be lower than data count {data}"
                    )))
                } else {
                    Ok(())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brickio_common::GIB;

    #[test]
    fn test_none_durability() {
        let d = Durability::None;
        assert_eq!(d.set_size(), 1);
        assert_eq!(d.min_node_count(), 1);
        assert_eq!(d.brick_size(100 * GIB), 100 * GIB);
        assert!(d.quorum_ok(1));
        assert!(!d.quorum_ok(0));
        assert!(d.validate().is_ok());
    }

    #[test]
    fn test_replicate_durability() {
        let d = Durability::Replicate { replica: 2 };
        assert_eq!(d.set_size(), 2);
        assert_eq!(d.min_node_count(), 2);
        assert_eq!(d.brick_size(100 * GIB), 100 * GIB);
        assert!(!d.quorum_ok(1));
        assert!(d.quorum_ok(2));
        assert!(d.validate().is_ok());
        assert!(Durability::Replicate { replica: 5 }.validate().is_err());
    }

    #[test]
    fn test_disperse_durability() {
        let d = Durability::Disperse {
            data: 4,
            redundancy: 2,
        };
        assert_eq!(d.set_size(), 6);
        assert_eq!(d.min_node_count(), 6);
        assert_eq!(d.brick_size(100 * GIB), 25 * GIB);
        assert!(d.validate().is_ok());
        assert!(
            Durability::Disperse {
                data: 2,
                redundancy: 2
            }
            .validate()
            .is_err()
        );
        assert!(
            Durability::Disperse {
                data: 1,
                redundancy: 1
            }
            .validate()
            .is_err()
        );
    }

    #[test]
    fn test_default_is_replica_three() {
        assert_eq!(
            Durability::default(),
            Durability::Replicate { replica: 3 }
        );
    }
}
