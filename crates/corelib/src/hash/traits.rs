//! Core hasher trait definitions.

use std::fmt::Debug;

use crate::node::ServerId;

/// Maps virtual nodes and requests to raw ring positions.
///
/// Implementations must be pure: the same inputs always produce the same
/// output, for the lifetime of the process. The two functions should be
/// independent of each other so request positions do not cluster around
/// virtual-node positions.
pub trait RingHasher: Send + Sync + Debug + 'static {
    /// Raw position of replica `replica` of `server`.
    fn virtual_node(&self, server: ServerId, replica: usize) -> u64;

    /// Raw position of a request id.
    fn request(&self, request_id: u64) -> u64;

    /// Returns the name of this hasher.
    fn name(&self) -> &'static str;
}
