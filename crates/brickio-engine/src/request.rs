//! Volume request types
//!
//! The request surface exposed to whatever front end sits above the
//! engine. Requests resolve into the durability policy and snapshot
//! settings stored on the volume record.

use brickio_common::{DEFAULT_THINP_SNAPSHOT_FACTOR, Error, Result};
use brickio_placement::Durability;
use brickio_placement::durability::DEFAULT_REPLICA;
use brickio_store::SnapshotPolicy;
use serde::{Deserialize, Serialize};

/// Requested durability, with defaults left to the engine
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DurabilityRequest {
    None,
    Replicate {
        #[serde(default)]
        replica: Option<u64>,
    },
    Disperse {
        data: u64,
        redundancy: u64,
    },
}

/// Requested snapshot behavior
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct SnapshotRequest {
    #[serde(default)]
    pub enable: bool,
    /// Thin-pool factor; unset with `enable` falls back to 1.5
    #[serde(default)]
    pub factor: Option<f64>,
}

/// Create-volume request
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VolumeCreateRequest {
    /// Logical size in GiB, required and non-zero
    pub size: u64,
    /// Volume name; defaults to `vol_<id>`
    #[serde(default)]
    pub name: Option<String>,
    /// Candidate clusters searched in order; empty means any
    #[serde(default)]
    pub clusters: Vec<String>,
    /// Durability; defaults to replica-3
    #[serde(default)]
    pub durability: Option<DurabilityRequest>,
    #[serde(default)]
    pub snapshot: SnapshotRequest,
}

impl VolumeCreateRequest {
    /// Validate the request and resolve defaults
    pub fn resolve(&self) -> Result<(Durability, SnapshotPolicy)> {
        if self.size == 0 {
            return Err(Error::invalid_request("volume size must be greater than 0"));
        }

        let durability = match self.durability {
            None => Durability::default(),
            Some(DurabilityRequest::None) => Durability::None,
            Some(DurabilityRequest::Replicate { replica }) => Durability::Replicate {
                replica: replica.unwrap_or(DEFAULT_REPLICA),
            },
            Some(DurabilityRequest::Disperse { data, redundancy }) => {
                Durability::Disperse { data, redundancy }
            }
        };
        durability.validate()?;

        let snapshot = if self.snapshot.enable {
            let factor = self
                .snapshot
                .factor
                .unwrap_or(DEFAULT_THINP_SNAPSHOT_FACTOR);
            if factor < 1.0 {
                return Err(Error::invalid_request(format!(
                    "snapshot factor {factor} must be at least 1.0"
                )));
            }
            SnapshotPolicy {
                enable: true,
                factor,
            }
        } else {
            SnapshotPolicy {
                enable: false,
                factor: 1.0,
            }
        };

        Ok((durability, snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let request = VolumeCreateRequest {
            size: 1024,
            ..Default::default()
        };
        let (durability, snapshot) = request.resolve().unwrap();
        assert_eq!(durability, Durability::Replicate { replica: 3 });
        assert!(!snapshot.enable);
        assert!((snapshot.factor - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_snapshot_factor_defaults_when_enabled() {
        let request = VolumeCreateRequest {
            size: 100,
            snapshot: SnapshotRequest {
                enable: true,
                factor: None,
            },
            ..Default::default()
        };
        let (_, snapshot) = request.resolve().unwrap();
        assert!(snapshot.enable);
        assert!((snapshot.factor - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_size_rejected() {
        let request = VolumeCreateRequest::default();
        assert!(matches!(
            request.resolve(),
            Err(Error::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_bad_snapshot_factor_rejected() {
        let request = VolumeCreateRequest {
            size: 10,
            snapshot: SnapshotRequest {
                enable: true,
                factor: Some(0.5),
            },
            ..Default::default()
        };
        assert!(request.resolve().is_err());
    }

    #[test]
    fn test_replica_default_and_validation() {
        let request = VolumeCreateRequest {
            size: 10,
            durability: Some(DurabilityRequest::Replicate { replica: None }),
            ..Default::default()
        };
        let (durability, _) = request.resolve().unwrap();
        assert_eq!(durability.set_size(), 3);

        let request = VolumeCreateRequest {
            size: 10,
            durability: Some(DurabilityRequest::Replicate { replica: Some(7) }),
            ..Default::default()
        };
        assert!(request.resolve().is_err());
    }
}
