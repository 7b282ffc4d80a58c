//! Brickio CLI - Admin Command Line Interface
//!
//! Administrative commands over a local topology store: load a
//! topology, inspect clusters, create, expand and delete volumes.
//! Placement runs for real against the store; the remote side is the
//! mock executor, so this binary doubles as a dry-run planner. The
//! production transport wires the same engine to an SSH executor and
//! lives with the service deployment.

use anyhow::{Context, Result};
use brickio_common::PlacementLimits;
use brickio_engine::{
    DurabilityRequest, SnapshotRequest, TopologyFile, TopologyManager, VolumeCreateRequest,
    VolumeEngine,
};
use brickio_executor::{Executor, MockExecutor};
use brickio_placement::SimpleAllocator;
use brickio_store::Db;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "brickio-cli")]
#[command(about = "Brickio Admin CLI")]
#[command(version)]
struct Args {
    /// Path of the topology store
    #[arg(long, env = "BRICKIO_DB", default_value = "brickio.db")]
    db: PathBuf,

    /// Optional config file with placement limits
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Topology operations
    Topology {
        #[command(subcommand)]
        action: TopologyCommands,
    },
    /// Cluster operations
    Cluster {
        #[command(subcommand)]
        action: ClusterCommands,
    },
    /// Volume operations
    Volume {
        #[command(subcommand)]
        action: VolumeCommands,
    },
}

#[derive(Subcommand, Debug)]
enum TopologyCommands {
    /// Load a topology JSON file into the store
    Load {
        /// Topology file
        file: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum ClusterCommands {
    /// List all clusters
    List,
    /// Show cluster details
    Info {
        /// Cluster ID
        cluster_id: String,
    },
}

#[derive(Subcommand, Debug)]
enum VolumeCommands {
    /// Create a volume
    Create {
        /// Size of volume in GiB
        #[arg(long)]
        size: u64,
        /// Name of the volume
        #[arg(long)]
        name: Option<String>,
        /// Durability type
        #[arg(long, value_parser = ["none", "replicate", "disperse"], default_value = "replicate")]
        durability: String,
        /// Replica count for replicated volumes
        #[arg(long)]
        replica: Option<u64>,
        /// Data brick count for dispersed volumes
        #[arg(long, default_value_t = 4)]
        disperse_data: u64,
        /// Redundancy brick count for dispersed volumes
        #[arg(long, default_value_t = 2)]
        redundancy: u64,
        /// Snapshot factor; enables snapshots
        #[arg(long)]
        snapshot_factor: Option<f64>,
        /// Comma-separated candidate cluster IDs
        #[arg(long, value_delimiter = ',')]
        clusters: Vec<String>,
    },
    /// Expand a volume
    Expand {
        /// Volume ID
        volume_id: String,
        /// Size to add, in GiB
        #[arg(long)]
        expand_size: u64,
    },
    /// Delete a volume
    Delete {
        /// Volume ID
        volume_id: String,
    },
    /// Show volume details
    Info {
        /// Volume ID
        volume_id: String,
    },
    /// List all volumes
    List,
}

/// Optional file/env overrides, merged through the config crate
#[derive(Debug, Default, Deserialize)]
struct CliConfig {
    #[serde(default)]
    limits: Option<PlacementLimits>,
}

fn load_config(path: Option<&PathBuf>) -> Result<CliConfig> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path.as_path()));
    }
    builder = builder.add_source(config::Environment::with_prefix("BRICKIO").separator("__"));
    builder
        .build()
        .context("load configuration")?
        .try_deserialize()
        .context("parse configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(args.log_level.clone())),
        )
        .init();

    let cli_config = load_config(args.config.as_ref())?;
    let limits = cli_config.limits.unwrap_or_default();

    let db = Arc::new(Db::open(&args.db).context("open topology store")?);
    let allocator = Arc::new(SimpleAllocator::new());
    let topology = TopologyManager::new(Arc::clone(&db), Arc::clone(&allocator));
    topology.restore().context("restore allocator")?;

    let executor = Arc::new(MockExecutor::new()) as Arc<dyn Executor>;
    let engine = VolumeEngine::with_limits(Arc::clone(&db), executor, allocator, limits);

    match args.command {
        Commands::Topology { action } => match action {
            TopologyCommands::Load { file } => {
                let raw = std::fs::read_to_string(&file)
                    .with_context(|| format!("read topology file {}", file.display()))?;
                let parsed: TopologyFile =
                    serde_json::from_str(&raw).context("parse topology file")?;
                let clusters = topology.topology_load(&parsed)?;
                for cluster_id in clusters {
                    println!("Created cluster {cluster_id}");
                }
            }
        },
        Commands::Cluster { action } => match action {
            ClusterCommands::List => {
                for cluster_id in topology.clusters()? {
                    println!("{cluster_id}");
                }
            }
            ClusterCommands::Info { cluster_id } => {
                let (cluster, nodes) = topology.cluster_info(&cluster_id)?;
                println!("Cluster: {}", cluster.id);
                println!("Volumes: {}", cluster.volumes.len());
                for node in nodes {
                    println!(
                        "  Node {} zone {} manage {} storage {} devices {}",
                        node.id,
                        node.zone,
                        node.hostnames.manage,
                        node.hostnames.storage,
                        node.devices.len()
                    );
                }
            }
        },
        Commands::Volume { action } => match action {
            VolumeCommands::Create {
                size,
                name,
                durability,
                replica,
                disperse_data,
                redundancy,
                snapshot_factor,
                clusters,
            } => {
                let durability = match durability.as_str() {
                    "none" => DurabilityRequest::None,
                    "disperse" => DurabilityRequest::Disperse {
                        data: disperse_data,
                        redundancy,
                    },
                    _ => DurabilityRequest::Replicate { replica },
                };
                let request = VolumeCreateRequest {
                    size,
                    name,
                    clusters,
                    durability: Some(durability),
                    snapshot: SnapshotRequest {
                        enable: snapshot_factor.is_some(),
                        factor: snapshot_factor,
                    },
                };
                let volume = engine.create(&request).await?;
                print_volume(&engine, &volume.id)?;
            }
            VolumeCommands::Expand {
                volume_id,
                expand_size,
            } => {
                engine.expand(&volume_id, expand_size).await?;
                print_volume(&engine, &volume_id)?;
            }
            VolumeCommands::Delete { volume_id } => {
                engine.destroy(&volume_id).await?;
                println!("Volume {volume_id} deleted");
            }
            VolumeCommands::Info { volume_id } => {
                print_volume(&engine, &volume_id)?;
            }
            VolumeCommands::List => {
                for volume_id in engine.volumes()? {
                    println!("{volume_id}");
                }
            }
        },
    }

    Ok(())
}

fn print_volume(engine: &VolumeEngine, volume_id: &str) -> Result<()> {
    let (volume, bricks) = engine.volume_info(volume_id)?;
    println!("Name: {}", volume.name);
    println!("Size: {} GiB", volume.size);
    println!("Id: {}", volume.id);
    if let Some(cluster) = &volume.cluster {
        println!("Cluster: {cluster}");
    }
    if let Some(mount) = &volume.mount {
        println!("Mount: {}", mount.device);
        println!(
            "Mount options: backup-volfile-servers={}",
            mount.backup_volfile_servers.join(",")
        );
    }
    println!("Bricks:");
    for brick in bricks {
        println!(
            "  {} node {} device {} size {} bytes",
            brick.id, brick.node_id, brick.device_id, brick.size
        );
    }
    Ok(())
}
