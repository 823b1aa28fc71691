//! Core library for the consistent-hashing load balancer.
//!
//! This crate provides the pieces that decide where requests go:
//! - Hash functions for virtual nodes and requests
//! - The fixed-size slot ring with bounded linear probing
//! - The server pool that keeps ring and registry in step
//! - The dispatcher that resolves and forwards requests
//! - Contracts for the provisioning and forwarding collaborators

pub mod dispatch;
pub mod error;
pub mod hash;
pub mod network;
pub mod node;
pub mod pool;
pub mod provision;
pub mod ring;
pub mod vnode;

pub use dispatch::{Dispatcher, RequestIdPolicy};
pub use error::{Error, Result};
pub use hash::{HasherKind, RingHasher};
pub use network::{ForwardResponse, Forwarder};
pub use node::{ServerId, ServerRecord};
pub use pool::{PoolConfig, ServerPool, Snapshot, TeardownFailure};
pub use provision::Provisioner;
pub use ring::{HashRing, RingBuilder, RingConfig};
pub use vnode::VirtualNode;
