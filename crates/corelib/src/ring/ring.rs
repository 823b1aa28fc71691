//! Hash ring data structure.
//!
//! A fixed array of `slots` cells, each empty or owned by a server. Servers
//! own `vnodes` cells each, claimed by bounded linear probing from the home
//! slot of each virtual node.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::hash::{HasherKind, RingHasher};
use crate::node::ServerId;
use crate::ring::position::Probe;
use crate::vnode::VirtualNode;

/// Default number of cells in the ring.
pub const DEFAULT_SLOTS: usize = 512;

/// Default number of virtual nodes per server.
pub const DEFAULT_VNODES: usize = 9;

/// Shape of the ring.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingConfig {
    /// Number of cells. Fixed for the lifetime of the ring.
    pub slots: usize,
    /// Virtual nodes per server.
    pub vnodes: usize,
    /// Hash functions used for placement and lookup.
    pub hasher: HasherKind,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            slots: DEFAULT_SLOTS,
            vnodes: DEFAULT_VNODES,
            hasher: HasherKind::default(),
        }
    }
}

impl RingConfig {
    /// Check that the ring can hold at least one server.
    pub fn validate(&self) -> Result<()> {
        if self.slots == 0 {
            return Err(Error::InvalidConfig("ring must have at least one slot".into()));
        }
        if self.vnodes == 0 {
            return Err(Error::InvalidConfig(
                "servers need at least one virtual node".into(),
            ));
        }
        if self.vnodes > self.slots {
            return Err(Error::InvalidConfig(format!(
                "{} virtual nodes do not fit in {} slots",
                self.vnodes, self.slots
            )));
        }
        Ok(())
    }

    /// Largest number of servers the ring can hold.
    pub fn max_servers(&self) -> usize {
        self.slots / self.vnodes
    }
}

/// Consistent hash ring over a fixed slot array.
///
/// The ring knows server ids only; hostnames and the id → record mapping are
/// owned by the pool. The ring is not synchronized: the pool keeps it behind
/// the same lock as its registry so the two never diverge.
#[derive(Clone, Debug)]
pub struct HashRing {
    cells: Box<[Option<ServerId>]>,
    vnodes: usize,
    occupied: usize,
    hasher: Arc<dyn RingHasher>,
}

impl HashRing {
    /// Create an empty ring with the default shape (512 slots, 9 vnodes).
    pub fn new() -> Self {
        Self::from_parts(DEFAULT_SLOTS, DEFAULT_VNODES, HasherKind::default().build())
    }

    /// Create an empty ring from a configuration.
    pub fn with_config(config: &RingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(config.slots, config.vnodes, config.hasher.build()))
    }

    /// Create an empty ring with an explicit hasher.
    pub fn with_hasher(slots: usize, vnodes: usize, hasher: Arc<dyn RingHasher>) -> Result<Self> {
        RingConfig {
            slots,
            vnodes,
            hasher: HasherKind::default(),
        }
        .validate()?;
        Ok(Self::from_parts(slots, vnodes, hasher))
    }

    fn from_parts(slots: usize, vnodes: usize, hasher: Arc<dyn RingHasher>) -> Self {
        let mut ring = Self {
            cells: vec![None; slots].into_boxed_slice(),
            vnodes,
            occupied: 0,
            hasher,
        };
        ring.init();
        ring
    }

    /// Reset every cell to empty.
    pub fn init(&mut self) {
        self.cells.iter_mut().for_each(|cell| *cell = None);
        self.occupied = 0;
    }

    /// Place all virtual nodes of `server`.
    ///
    /// Each virtual node takes the first empty cell at or after its home slot.
    /// The scan gives up after one full lap; in that case every cell written
    /// by this call is cleared again and `RingFull` is returned, so a failed
    /// add leaves the ring exactly as it was.
    ///
    /// # Errors
    /// - `Validation` if `server` already owns cells
    /// - `RingFull` if a virtual node found no empty cell
    pub fn add_server(&mut self, server: ServerId) -> Result<()> {
        if self.contains(server) {
            return Err(Error::validation(format!(
                "server {server} is already on the ring"
            )));
        }

        let slots = self.slots();
        let hasher = Arc::clone(&self.hasher);
        let mut placed = Vec::with_capacity(self.vnodes);

        for vnode in VirtualNode::all_for(hasher.as_ref(), server, self.vnodes) {
            let empty = Probe::new(vnode.home_slot(slots), slots).find(|&s| self.cells[s].is_none());
            match empty {
                Some(slot) => {
                    self.cells[slot] = Some(server);
                    self.occupied += 1;
                    placed.push(slot);
                }
                None => {
                    for slot in &placed {
                        self.cells[*slot] = None;
                    }
                    self.occupied -= placed.len();
                    warn!(%server, placed = placed.len(), "ring full, placement rolled back");
                    return Err(Error::RingFull {
                        server,
                        placed: placed.len(),
                        required: self.vnodes,
                    });
                }
            }
        }

        debug!(%server, cells = ?placed, "added server to ring");
        Ok(())
    }

    /// Clear every cell owned by `server` and return how many were cleared.
    ///
    /// For each virtual node the probe chain is walked from its home slot to
    /// the first cell still owned by `server`; that cell and the contiguous
    /// run of `server` cells after it are cleared. Empty cells do not end the
    /// walk, since earlier removals can leave holes inside a chain. Each walk
    /// covers at most one lap, and each one clears at least one remaining
    /// cell, so K walks reclaim every cell the server held.
    pub fn remove_server(&mut self, server: ServerId) -> usize {
        let slots = self.slots();
        let hasher = Arc::clone(&self.hasher);
        let mut cleared = 0;

        for vnode in VirtualNode::all_for(hasher.as_ref(), server, self.vnodes) {
            if cleared == self.vnodes {
                break;
            }
            let start = Probe::new(vnode.home_slot(slots), slots)
                .find(|&s| self.cells[s] == Some(server));
            let Some(start) = start else {
                continue;
            };
            for slot in Probe::new(start, slots) {
                if self.cells[slot] != Some(server) {
                    break;
                }
                self.cells[slot] = None;
                cleared += 1;
            }
        }

        self.occupied -= cleared;
        if cleared > 0 {
            debug!(%server, cleared, "removed server from ring");
        }
        cleared
    }

    /// Owner of the first occupied cell at or after the request's slot.
    ///
    /// Returns `None` when the ring is empty.
    pub fn server_for_request(&self, request_id: u64) -> Option<ServerId> {
        if self.occupied == 0 {
            return None;
        }
        let hash = self.hasher.request(request_id);
        Probe::from_hash(hash, self.slots()).find_map(|slot| self.cells[slot])
    }

    /// Number of cells.
    #[inline]
    pub fn slots(&self) -> usize {
        self.cells.len()
    }

    /// Virtual nodes per server.
    #[inline]
    pub fn vnodes(&self) -> usize {
        self.vnodes
    }

    /// Number of occupied cells.
    #[inline]
    pub fn occupied(&self) -> usize {
        self.occupied
    }

    /// Number of empty cells.
    #[inline]
    pub fn free_slots(&self) -> usize {
        self.slots() - self.occupied
    }

    /// True when no cell is occupied.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    /// True when one more server is guaranteed to fit.
    ///
    /// A bounded scan over a ring with at least one empty cell always finds
    /// it, so K free cells are enough for K virtual nodes.
    #[inline]
    pub fn has_room_for_server(&self) -> bool {
        self.free_slots() >= self.vnodes
    }

    /// Largest number of servers this ring can hold.
    pub fn max_servers(&self) -> usize {
        self.slots() / self.vnodes
    }

    /// Raw view of the cells.
    pub fn cells(&self) -> &[Option<ServerId>] {
        &self.cells
    }

    /// Indices of the cells owned by `server`.
    pub fn cells_of(&self, server: ServerId) -> Vec<usize> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| **cell == Some(server))
            .map(|(slot, _)| slot)
            .collect()
    }

    /// True if `server` owns at least one cell.
    pub fn contains(&self, server: ServerId) -> bool {
        self.cells.iter().any(|cell| *cell == Some(server))
    }

    /// Distinct servers that own cells.
    pub fn servers(&self) -> BTreeSet<ServerId> {
        self.cells.iter().flatten().copied().collect()
    }

    /// Get the hasher name (for logging/debugging).
    pub fn hasher_name(&self) -> &'static str {
        self.hasher.name()
    }
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for rings with a non-default shape or initial servers.
///
/// # Example
/// ```rust
/// use corelib::ring::RingBuilder;
/// use corelib::ServerId;
///
/// let ring = RingBuilder::new()
///     .with_slots(64)
///     .with_vnodes(4)
///     .add_server(ServerId(1))
///     .build()
///     .unwrap();
/// assert_eq!(ring.occupied(), 4);
/// ```
#[derive(Debug, Default)]
pub struct RingBuilder {
    config: RingConfig,
    servers: Vec<ServerId>,
}

impl RingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn from_config(config: RingConfig) -> Self {
        Self {
            config,
            servers: Vec::new(),
        }
    }

    pub fn with_slots(mut self, slots: usize) -> Self {
        self.config.slots = slots;
        self
    }

    pub fn with_vnodes(mut self, vnodes: usize) -> Self {
        self.config.vnodes = vnodes;
        self
    }

    pub fn with_hasher(mut self, hasher: HasherKind) -> Self {
        self.config.hasher = hasher;
        self
    }

    /// Queue a server to be placed when the ring is built.
    pub fn add_server(mut self, server: ServerId) -> Self {
        self.servers.push(server);
        self
    }

    /// Build the ring, placing queued servers in order.
    pub fn build(self) -> Result<HashRing> {
        let mut ring = HashRing::with_config(&self.config)?;
        for server in self.servers {
            ring.add_server(server)?;
        }
        Ok(ring)
    }
}
