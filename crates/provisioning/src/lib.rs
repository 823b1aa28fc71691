//! Backend provisioning for the load balancer.
//!
//! This crate provides `Provisioner` implementations that decide how a backend
//! comes to life:
//! - **DockerProvisioner**: one container per server, driven through the
//!   docker CLI
//! - **FixedProvisioner**: backends run elsewhere; only addresses are mapped

pub mod error;
pub mod provisioner;

pub use error::ProvisionError;
pub use provisioner::{DockerConfig, DockerProvisioner, FixedProvisioner};
