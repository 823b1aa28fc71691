//! Command line front end for the ring balancer.
//!
//! Provides commands for:
//! - Running the load balancer
//! - Running a replica backend
//! - Simulating load distribution over an in-memory ring

pub mod commands;
pub mod config;

pub use commands::{simulate, sweep, Distribution, SweepPoint};
pub use config::{CliConfig, Command, ProvisionerKind, ReplicaArgs, RingArgs, ServeArgs, SimulateArgs};
