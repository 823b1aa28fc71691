//! Server pool: the authoritative registry of live backends.
//!
//! # Locking
//!
//! The ring and the id → record map live together in one `PoolState` behind a
//! reader/writer lock. Routing takes the read side for a ring lookup plus a
//! registry lookup. The write side is only taken for the short, synchronous
//! step that changes both, so routing never observes a ring cell whose id is
//! missing from the registry, or the reverse.
//!
//! Add and Remove are additionally serialized by a control-plane mutex held
//! for the whole operation, including the provisioning calls. While it is
//! held no other mutation can run, which makes id allocation atomic with the
//! publish that follows it. No lock on the state is ever held across an
//! `.await`.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::node::{ServerId, ServerRecord};
use crate::provision::Provisioner;
use crate::ring::{HashRing, RingConfig};

/// Pool configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Ring shape.
    pub ring: RingConfig,
    /// How long Add/Remove wait for a concurrent mutation before failing with
    /// `LockTimeout`. `None` waits indefinitely.
    pub control_timeout: Option<Duration>,
}

/// Point-in-time view of the pool.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub count: usize,
    /// Hostnames in id order.
    pub replicas: Vec<String>,
}

/// A backend whose teardown failed during shutdown.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TeardownFailure {
    pub hostname: String,
    pub error: Error,
}

/// Ring and registry, always mutated together.
#[derive(Debug)]
struct PoolState {
    ring: HashRing,
    servers: BTreeMap<ServerId, ServerRecord>,
}

impl PoolState {
    fn next_id(&self) -> ServerId {
        self.servers
            .keys()
            .next_back()
            .map_or(ServerId(1), |max| max.next())
    }

    fn id_of(&self, hostname: &str) -> Option<ServerId> {
        self.servers
            .values()
            .rev()
            .find(|record| record.hostname == hostname)
            .map(|record| record.id)
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            count: self.servers.len(),
            replicas: self.servers.values().map(|r| r.hostname.clone()).collect(),
        }
    }

    /// Place the server's virtual nodes and make its record visible.
    fn publish(&mut self, record: ServerRecord) -> Result<()> {
        self.ring.add_server(record.id)?;
        self.servers.insert(record.id, record);
        Ok(())
    }

    /// Drop the record and clear its cells.
    fn retire(&mut self, id: ServerId) -> Option<ServerRecord> {
        let record = self.servers.remove(&id)?;
        self.ring.remove_server(id);
        Some(record)
    }

    fn drain(&mut self) -> Vec<ServerRecord> {
        self.ring.init();
        std::mem::take(&mut self.servers).into_values().collect()
    }

    fn is_consistent(&self) -> bool {
        let registered: BTreeSet<ServerId> = self.servers.keys().copied().collect();
        registered == self.ring.servers()
            && registered
                .iter()
                .all(|id| self.ring.cells_of(*id).len() == self.ring.vnodes())
    }
}

/// Registry of live backends plus the ring that routes to them.
///
/// Shared between the control plane and every routing task behind an `Arc`.
pub struct ServerPool {
    state: RwLock<PoolState>,
    control: Mutex<()>,
    provisioner: Arc<dyn Provisioner>,
    control_timeout: Option<Duration>,
    closed: AtomicBool,
}

impl ServerPool {
    /// Create an empty pool.
    pub fn new(config: PoolConfig, provisioner: Arc<dyn Provisioner>) -> Result<Self> {
        let ring = HashRing::with_config(&config.ring)?;
        info!(
            slots = ring.slots(),
            vnodes = ring.vnodes(),
            hasher = ring.hasher_name(),
            provisioner = provisioner.name(),
            "server pool created"
        );
        Ok(Self {
            state: RwLock::new(PoolState {
                ring,
                servers: BTreeMap::new(),
            }),
            control: Mutex::new(()),
            provisioner,
            control_timeout: config.control_timeout,
            closed: AtomicBool::new(false),
        })
    }

    /// One more than the largest live id, or 1 for an empty pool.
    ///
    /// Only stable while the caller holds the control lock; `add` allocates
    /// ids under it.
    pub fn next_id(&self) -> ServerId {
        self.state.read().next_id()
    }

    /// Start and register `count` servers.
    ///
    /// Supplied hostnames are used first; the rest are generated by the
    /// provisioner. Each server is started before it is published, so it is
    /// never routable while its backend is down. A `RingFull` or start failure
    /// stops the batch; servers published before it stay registered.
    ///
    /// # Errors
    /// - `Validation` if `hostnames` is longer than `count`, contains
    ///   duplicates or blanks, or names a live server. Nothing is changed.
    /// - `RingFull` if the ring cannot take another server
    /// - `ProvisioningFailed` if a backend did not start
    pub async fn add(&self, count: usize, hostnames: Vec<String>) -> Result<Snapshot> {
        validate_payload(count, &hostnames, "newly added instances")?;
        let _control = self.lock_control().await?;

        {
            let state = self.state.read();
            if let Some(taken) = hostnames.iter().find(|h| state.id_of(h).is_some()) {
                return Err(Error::validation(format!(
                    "hostname '{taken}' is already registered"
                )));
            }
        }

        let mut supplied: VecDeque<String> = hostnames.into();
        for _ in 0..count {
            let (id, hostname, has_room, required) = {
                let state = self.state.read();
                let id = state.next_id();
                let hostname = match supplied.pop_front() {
                    Some(hostname) => hostname,
                    None => self.unused_hostname(&state, id),
                };
                (id, hostname, state.ring.has_room_for_server(), state.ring.vnodes())
            };

            if !has_room {
                warn!(server = %id, %hostname, "no room on the ring for another server");
                return Err(Error::RingFull {
                    server: id,
                    placed: 0,
                    required,
                });
            }

            if let Err(e) = self.provisioner.start(id, &hostname).await {
                warn!(server = %id, %hostname, error = %e, "backend failed to start");
                return Err(e);
            }

            let published = self
                .state
                .write()
                .publish(ServerRecord::new(id, hostname.clone()));
            if let Err(e) = published {
                warn!(server = %id, %hostname, error = %e, "placement failed, stopping backend");
                if let Err(stop_err) = self.provisioner.stop(&hostname).await {
                    warn!(%hostname, error = %stop_err, "failed to stop unplaced backend");
                }
                return Err(e);
            }

            info!(server = %id, %hostname, "server added");
        }

        Ok(self.published_snapshot())
    }

    /// Remove `count` servers: the named ones first, then random picks.
    ///
    /// Random picks are sampled uniformly without replacement from the servers
    /// not named. Every removed server leaves the ring and the registry before
    /// its backend is stopped; a failed stop does not put it back.
    ///
    /// # Errors
    /// - `Validation` if `hostnames` is longer than `count`, has duplicates,
    ///   or names a server that is not live. Nothing is changed.
    /// - `ProvisioningFailed` for the first backend that failed to stop
    /// - `InsufficientServers` if fewer than `count` servers were live; all of
    ///   them are removed
    pub async fn remove(&self, count: usize, hostnames: Vec<String>) -> Result<Snapshot> {
        validate_payload(count, &hostnames, "removable instances")?;
        let _control = self.lock_control().await?;

        let victims = {
            let state = self.state.read();
            let mut named = Vec::with_capacity(hostnames.len());
            for hostname in &hostnames {
                let id = state.id_of(hostname).ok_or_else(|| {
                    Error::validation(format!("hostname '{hostname}' is not registered"))
                })?;
                named.push(id);
            }

            let others: Vec<ServerId> = state
                .servers
                .keys()
                .filter(|id| !named.contains(id))
                .copied()
                .collect();
            let wanted = (count - named.len()).min(others.len());
            let mut rng = rand::rng();
            named.extend(
                rand::seq::index::sample(&mut rng, others.len(), wanted)
                    .into_iter()
                    .map(|i| others[i]),
            );
            named
        };

        let mut removed = 0;
        let mut teardown_error = None;
        for id in victims {
            let retired = self.state.write().retire(id);
            let Some(record) = retired else {
                continue;
            };
            removed += 1;
            info!(server = %id, hostname = %record.hostname, "server removed");

            if let Err(e) = self.provisioner.stop(&record.hostname).await {
                warn!(server = %id, hostname = %record.hostname, error = %e, "backend failed to stop");
                teardown_error.get_or_insert(e);
            }
        }

        let snapshot = self.published_snapshot();
        if let Some(e) = teardown_error {
            return Err(e);
        }
        if removed < count {
            return Err(Error::InsufficientServers {
                requested: count,
                removed,
            });
        }
        Ok(snapshot)
    }

    /// Consistent count and hostname list.
    pub fn snapshot(&self) -> Snapshot {
        self.state.read().snapshot()
    }

    /// Record of the server that owns `request_id`.
    ///
    /// # Errors
    /// - `NotFound` if the ring is empty
    /// - `BackendNotRegistered` if the owning id has no record
    pub fn resolve(&self, request_id: u64) -> Result<ServerRecord> {
        let state = self.state.read();
        let id = state
            .ring
            .server_for_request(request_id)
            .ok_or(Error::NotFound)?;
        state
            .servers
            .get(&id)
            .cloned()
            .ok_or(Error::BackendNotRegistered(id))
    }

    /// Network address of a backend, from the provisioner.
    pub async fn resolve_address(&self, hostname: &str) -> Result<String> {
        self.provisioner.resolve_address(hostname).await
    }

    /// Record for `id`, if live.
    pub fn get(&self, id: ServerId) -> Option<ServerRecord> {
        self.state.read().servers.get(&id).cloned()
    }

    /// Id of the live server named `hostname`.
    pub fn id_of(&self, hostname: &str) -> Option<ServerId> {
        self.state.read().id_of(hostname)
    }

    /// All live records in id order.
    pub fn records(&self) -> Vec<ServerRecord> {
        self.state.read().servers.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().servers.is_empty()
    }

    /// Copy of the ring cells, for inspection.
    pub fn ring_cells(&self) -> Vec<Option<ServerId>> {
        self.state.read().ring.cells().to_vec()
    }

    /// Run `f` against the ring under the read lock.
    pub fn with_ring<R>(&self, f: impl FnOnce(&HashRing) -> R) -> R {
        f(&self.state.read().ring)
    }

    /// True when the ring and registry hold the same ids, each with a full
    /// set of virtual nodes.
    pub fn is_consistent(&self) -> bool {
        self.state.read().is_consistent()
    }

    /// True once `shutdown` has started.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Refuse new control-plane and routing work from now on.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!("server pool closed to new work");
        }
    }

    /// Refuse new work, then stop every registered backend.
    ///
    /// Waits for an in-flight Add/Remove to finish first. Teardown failures
    /// are logged and returned; they do not interrupt the sequence.
    pub async fn shutdown(&self) -> Vec<TeardownFailure> {
        self.close();
        let _control = self.control.lock().await;

        let records = self.state.write().drain();
        metrics::gauge!("lb_pool_servers").set(0.0);
        info!(servers = records.len(), "tearing down backends");

        let mut failures = Vec::new();
        for record in records {
            match self.provisioner.stop(&record.hostname).await {
                Ok(()) => debug!(hostname = %record.hostname, "backend stopped"),
                Err(error) => {
                    warn!(hostname = %record.hostname, %error, "backend teardown failed");
                    failures.push(TeardownFailure {
                        hostname: record.hostname,
                        error,
                    });
                }
            }
        }
        failures
    }

    async fn lock_control(&self) -> Result<MutexGuard<'_, ()>> {
        if self.is_closed() {
            return Err(Error::ShuttingDown);
        }
        let guard = match self.control_timeout {
            Some(limit) => tokio::time::timeout(limit, self.control.lock())
                .await
                .map_err(|_| Error::LockTimeout(limit))?,
            None => self.control.lock().await,
        };
        // Shutdown may have started while we waited.
        if self.is_closed() {
            return Err(Error::ShuttingDown);
        }
        Ok(guard)
    }

    fn unused_hostname(&self, state: &PoolState, id: ServerId) -> String {
        let base = self.provisioner.hostname_for(id);
        let mut candidate = base.clone();
        let mut suffix = 1;
        while state.id_of(&candidate).is_some() {
            candidate = format!("{base}-{suffix}");
            suffix += 1;
        }
        candidate
    }

    fn published_snapshot(&self) -> Snapshot {
        let snapshot = self.snapshot();
        metrics::gauge!("lb_pool_servers").set(snapshot.count as f64);
        snapshot
    }
}

impl std::fmt::Debug for ServerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerPool")
            .field("servers", &self.len())
            .field("provisioner", &self.provisioner.name())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Reject payloads before any state is touched.
fn validate_payload(count: usize, hostnames: &[String], what: &str) -> Result<()> {
    if hostnames.len() > count {
        return Err(Error::validation(format!(
            "Length of hostname list is more than {what}"
        )));
    }
    if hostnames.iter().any(|h| h.trim().is_empty()) {
        return Err(Error::validation("hostnames must not be empty"));
    }
    let unique: BTreeSet<&str> = hostnames.iter().map(String::as_str).collect();
    if unique.len() != hostnames.len() {
        return Err(Error::validation("hostname list contains duplicates"));
    }
    Ok(())
}
