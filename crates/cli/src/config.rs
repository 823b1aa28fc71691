//! Command line and environment configuration.
//!
//! Every option can also be set through an `LB_*` environment variable.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use corelib::{HasherKind, PoolConfig, RequestIdPolicy, RingConfig};
use provisioning::DockerConfig;

#[derive(Parser, Debug)]
#[command(name = "ring-balancer", version, about = "Consistent-hashing HTTP load balancer")]
pub struct CliConfig {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the load balancer.
    Serve(ServeArgs),
    /// Run a replica backend.
    Replica(ReplicaArgs),
    /// Route synthetic requests over an in-memory ring and report the spread.
    Simulate(SimulateArgs),
}

/// Ring shape shared by `serve` and `simulate`.
#[derive(Args, Debug, Clone)]
pub struct RingArgs {
    /// Number of ring cells.
    #[arg(long, env = "LB_SLOTS", default_value_t = corelib::ring::DEFAULT_SLOTS)]
    pub slots: usize,

    /// Virtual nodes per server.
    #[arg(long, env = "LB_VNODES", default_value_t = corelib::ring::DEFAULT_VNODES)]
    pub vnodes: usize,

    /// Placement hash: `sip` or `xxh3`.
    #[arg(long, env = "LB_HASHER", default_value = "sip")]
    pub hasher: HasherKind,
}

impl RingArgs {
    pub fn ring_config(&self) -> RingConfig {
        RingConfig {
            slots: self.slots,
            vnodes: self.vnodes,
            hasher: self.hasher,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionerKind {
    /// One docker container per server.
    Docker,
    /// Externally managed backends at fixed addresses.
    Fixed,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "LB_LISTEN", default_value = "0.0.0.0:5000")]
    pub listen: SocketAddr,

    #[command(flatten)]
    pub ring: RingArgs,

    /// Request id derivation: `path` or `random`.
    #[arg(long, env = "LB_REQUEST_ID", default_value = "path")]
    pub request_id: RequestIdPolicy,

    /// Milliseconds Add/Remove wait for a concurrent mutation; unset waits forever.
    #[arg(long, env = "LB_CONTROL_TIMEOUT_MS")]
    pub control_timeout_ms: Option<u64>,

    /// Milliseconds allowed for one forwarded request.
    #[arg(long, env = "LB_FORWARD_TIMEOUT_MS", default_value_t = 5000)]
    pub forward_timeout_ms: u64,

    /// How backends are started and stopped.
    #[arg(long, value_enum, env = "LB_PROVISIONER", default_value = "docker")]
    pub provisioner: ProvisionerKind,

    /// Port backends listen on.
    #[arg(long, env = "LB_BACKEND_PORT", default_value_t = 5000)]
    pub backend_port: u16,

    /// `HOST=ADDRESS` mappings for the fixed provisioner.
    #[arg(long = "backend", env = "LB_BACKENDS", value_delimiter = ',')]
    pub backends: Vec<String>,

    /// Refuse hostnames without a `--backend` mapping.
    #[arg(long, env = "LB_STRICT_BACKENDS")]
    pub strict_backends: bool,

    /// Docker executable.
    #[arg(long, env = "LB_DOCKER", default_value = "docker")]
    pub docker: String,

    /// Run docker through sudo.
    #[arg(long, env = "LB_DOCKER_SUDO")]
    pub sudo: bool,

    /// Image every backend container runs.
    #[arg(long, env = "LB_IMAGE", default_value = "ring-balancer-replica:latest")]
    pub image: String,

    /// Docker network the containers join.
    #[arg(long, env = "LB_NETWORK")]
    pub network: Option<String>,

    /// Build the image from this directory before starting.
    #[arg(long, env = "LB_BUILD_CONTEXT")]
    pub build_context: Option<PathBuf>,

    /// Servers to add at startup.
    #[arg(long, env = "LB_REPLICAS", default_value_t = 0)]
    pub replicas: usize,

    /// Hostnames for the startup servers.
    #[arg(long = "hostname", env = "LB_HOSTNAMES", value_delimiter = ',')]
    pub hostnames: Vec<String>,
}

impl ServeArgs {
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            ring: self.ring.ring_config(),
            control_timeout: self.control_timeout_ms.map(Duration::from_millis),
        }
    }

    pub fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms)
    }

    pub fn docker_config(&self) -> DockerConfig {
        DockerConfig {
            binary: self.docker.clone(),
            sudo: self.sudo,
            image: self.image.clone(),
            network: self.network.clone(),
            port: self.backend_port,
            build_context: self.build_context.clone(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ReplicaArgs {
    /// Server id reported by `/home`.
    #[arg(long, env = "ID")]
    pub id: String,

    /// Address to listen on.
    #[arg(long, env = "LB_REPLICA_LISTEN", default_value = "0.0.0.0:5000")]
    pub listen: SocketAddr,
}

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub ring: RingArgs,

    /// Servers on the ring for the distribution run.
    #[arg(long, default_value_t = 3)]
    pub servers: u32,

    /// Synthetic requests per run.
    #[arg(long, default_value_t = 10_000)]
    pub requests: usize,

    /// Largest server count in the average-load sweep; 0 skips the sweep.
    #[arg(long, default_value_t = 6)]
    pub sweep_to: u32,

    /// Print JSON instead of text.
    #[arg(long)]
    pub json: bool,
}
