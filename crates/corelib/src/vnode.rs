//! Virtual node abstractions.
//!
//! # Virtual Nodes (VNodes) Concept
//!
//! Each server is placed on the ring several times. Every placement is a
//! virtual node, identified by `(server, replica)` for `replica` in `0..K`.
//! Virtual nodes are never stored: the ring only records which server owns a
//! cell, and the virtual node is recomputed from the hasher whenever the ring
//! needs to find it again. This provides:
//!
//! 1. **Better Load Distribution**: K positions per server smooth out gaps
//! 2. **Gradual Rebalancing**: a join or leave only moves the requests owned
//!    by that server's chains
//! 3. **No Reverse Index**: removal recomputes home slots instead of keeping
//!    a server → cells map
//!
//! # Performance Characteristics
//!
//! - **Memory**: O(1) per virtual node (nothing stored)
//! - **Placement**: O(K · probe length)
//! - **Removal**: O(K · probe length)

use crate::hash::RingHasher;
use crate::node::ServerId;

/// A virtual node of a server on the slot ring.
///
/// # Invariants
///
/// - `position` is `hasher.virtual_node(server, replica)` for the ring's hasher
/// - The home slot is `position % slots`; collisions push the actual cell
///   forward from there
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VirtualNode {
    /// The server that owns this virtual node.
    pub server: ServerId,
    /// Replica index in `0..K`.
    pub replica: usize,
    /// Raw 64-bit hash position before reduction to a slot.
    pub position: u64,
}

impl VirtualNode {
    /// Compute virtual node `replica` of `server`.
    ///
    /// # Example
    /// ```rust
    /// use corelib::hash::SipRingHasher;
    /// use corelib::{ServerId, VirtualNode};
    ///
    /// let hasher = SipRingHasher;
    /// let vnode = VirtualNode::from_index(&hasher, ServerId(1), 0);
    /// assert!(vnode.home_slot(512) < 512);
    /// ```
    pub fn from_index(hasher: &dyn RingHasher, server: ServerId, replica: usize) -> Self {
        Self {
            server,
            replica,
            position: hasher.virtual_node(server, replica),
        }
    }

    /// All `vnodes` virtual nodes of `server`, in replica order.
    pub fn all_for(
        hasher: &dyn RingHasher,
        server: ServerId,
        vnodes: usize,
    ) -> impl Iterator<Item = VirtualNode> + '_ {
        (0..vnodes).map(move |replica| Self::from_index(hasher, server, replica))
    }

    /// Cell the virtual node hashes to before any probing.
    #[inline]
    pub fn home_slot(&self, slots: usize) -> usize {
        (self.position % slots as u64) as usize
    }
}

impl std::fmt::Display for VirtualNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "VNode(server={}, replica={}, pos={:016x})",
            self.server, self.replica, self.position
        )
    }
}
