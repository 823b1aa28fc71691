//! Command implementations.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use corelib::ring::RingBuilder;
use corelib::{Dispatcher, Provisioner, RingConfig, ServerId, ServerPool};
use provisioning::{DockerProvisioner, FixedProvisioner};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::info;
use transport::{replica_router, serve_until, shutdown_signal, HttpForwarder};

use crate::config::{
    CliConfig, Command, ProvisionerKind, ReplicaArgs, ServeArgs, SimulateArgs,
};

impl CliConfig {
    /// Execute the selected subcommand.
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Serve(args) => serve(args).await,
            Command::Replica(args) => replica(args).await,
            Command::Simulate(args) => print_simulation(&args),
        }
    }
}

// ── serve ──────────────────────────────────────────────────────

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let provisioner = build_provisioner(&args).await?;
    info!(
        provisioner = provisioner.name(),
        slots = args.ring.slots,
        vnodes = args.ring.vnodes,
        hasher = ?args.ring.hasher,
        policy = ?args.request_id,
        "starting load balancer"
    );

    let pool = Arc::new(ServerPool::new(args.pool_config(), provisioner)?);
    if args.replicas > 0 {
        let snapshot = pool
            .add(args.replicas, args.hostnames.clone())
            .await
            .context("adding startup servers")?;
        info!(servers = snapshot.count, replicas = ?snapshot.replicas, "startup servers ready");
    }

    let dispatcher = Dispatcher::new(
        pool,
        Arc::new(HttpForwarder::new(args.forward_timeout())),
        args.request_id,
    );
    let listener = TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("binding {}", args.listen))?;

    serve_until(listener, dispatcher, shutdown_signal()).await?;
    Ok(())
}

async fn build_provisioner(args: &ServeArgs) -> anyhow::Result<Arc<dyn Provisioner>> {
    match args.provisioner {
        ProvisionerKind::Docker => {
            let docker = DockerProvisioner::new(args.docker_config());
            docker.build_image().await.context("building backend image")?;
            Ok(Arc::new(docker))
        }
        ProvisionerKind::Fixed => {
            let mut fixed = FixedProvisioner::from_mappings(args.backend_port, &args.backends)?;
            if args.strict_backends {
                fixed = fixed.strict();
            }
            Ok(Arc::new(fixed))
        }
    }
}

// ── replica ────────────────────────────────────────────────────

async fn replica(args: ReplicaArgs) -> anyhow::Result<()> {
    let listener = TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("binding {}", args.listen))?;
    info!(id = %args.id, addr = %args.listen, "replica listening");

    axum::serve(listener, replica_router(args.id))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

// ── simulate ───────────────────────────────────────────────────

/// How many synthetic requests each server received.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Distribution {
    pub servers: u32,
    pub requests: usize,
    pub per_server: BTreeMap<u32, usize>,
}

impl Distribution {
    pub fn average(&self) -> f64 {
        if self.servers == 0 {
            return 0.0;
        }
        self.requests as f64 / self.servers as f64
    }

    /// Population standard deviation of the per-server counts.
    pub fn std_dev(&self) -> f64 {
        if self.servers == 0 {
            return 0.0;
        }
        let mean = self.average();
        let variance = (1..=self.servers)
            .map(|id| {
                let count = self.per_server.get(&id).copied().unwrap_or(0) as f64;
                (count - mean).powi(2)
            })
            .sum::<f64>()
            / self.servers as f64;
        variance.sqrt()
    }
}

/// One point of the average-load sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepPoint {
    pub servers: u32,
    pub average: f64,
    pub std_dev: f64,
}

/// Route `requests` random request ids over a ring holding servers
/// `1..=servers`.
pub fn simulate(config: &RingConfig, servers: u32, requests: usize) -> anyhow::Result<Distribution> {
    let mut builder = RingBuilder::from_config(config.clone());
    for id in 1..=servers {
        builder = builder.add_server(ServerId(id));
    }
    let ring = builder.build()?;

    let mut per_server = BTreeMap::new();
    let mut routed = 0;
    for _ in 0..requests {
        if let Some(server) = ring.server_for_request(rand::random()) {
            *per_server.entry(server.0).or_insert(0) += 1;
            routed += 1;
        }
    }
    Ok(Distribution {
        servers,
        requests: routed,
        per_server,
    })
}

/// Run `simulate` for every server count from 2 to `max_servers`.
pub fn sweep(config: &RingConfig, max_servers: u32, requests: usize) -> anyhow::Result<Vec<SweepPoint>> {
    (2..=max_servers)
        .map(|servers| {
            let run = simulate(config, servers, requests)?;
            Ok(SweepPoint {
                servers,
                average: run.average(),
                std_dev: run.std_dev(),
            })
        })
        .collect()
}

#[derive(Serialize)]
struct SimulationReport {
    distribution: Distribution,
    sweep: Vec<SweepPoint>,
}

fn print_simulation(args: &SimulateArgs) -> anyhow::Result<()> {
    let config = args.ring.ring_config();
    let distribution = simulate(&config, args.servers, args.requests)?;
    let sweep = sweep(&config, args.sweep_to, args.requests)?;

    if args.json {
        let report = SimulationReport {
            distribution,
            sweep,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} requests over {} servers ({} slots, {} vnodes):",
        distribution.requests, distribution.servers, config.slots, config.vnodes
    );
    for id in 1..=distribution.servers {
        let count = distribution.per_server.get(&id).copied().unwrap_or(0);
        println!("  server {id:>3}: {count}");
    }
    if !sweep.is_empty() {
        println!("average load per server:");
        for point in &sweep {
            println!(
                "  {:>3} servers: avg {:>10.1}  std dev {:>10.1}",
                point.servers, point.average, point.std_dev
            );
        }
    }
    Ok(())
}
