//! Provisioner implementations.
//!
//! Each provisioner answers three questions for the pool: how to start a
//! backend, how to stop it, and where to reach it.
//!
//! - **DockerProvisioner**: containers on a shared docker network, reached by
//!   container name
//! - **FixedProvisioner**: externally managed backends at known addresses

pub mod docker;
pub mod fixed;

pub use docker::{DockerConfig, DockerProvisioner};
pub use fixed::FixedProvisioner;
