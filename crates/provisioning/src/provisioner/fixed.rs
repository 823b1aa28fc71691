//! Fixed-address provisioner for externally managed backends.

use std::collections::HashMap;

use async_trait::async_trait;
use corelib::{Provisioner, Result, ServerId};
use parking_lot::RwLock;
use tracing::debug;

use crate::error::ProvisionError;

/// Provisioner for backends that are started and stopped by something else.
///
/// Start and stop only log. Addresses come from an explicit hostname map;
/// unmapped hostnames fall back to `<hostname>:<default_port>` unless the
/// provisioner is strict, in which case starting them fails.
#[derive(Debug)]
pub struct FixedProvisioner {
    addresses: RwLock<HashMap<String, String>>,
    default_port: u16,
    strict: bool,
}

impl FixedProvisioner {
    pub fn new(default_port: u16) -> Self {
        Self {
            addresses: RwLock::new(HashMap::new()),
            default_port,
            strict: false,
        }
    }

    /// Only hostnames with a mapped address may be started.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Map `hostname` to `address` (`host:port`).
    pub fn with_address(self, hostname: impl Into<String>, address: impl Into<String>) -> Self {
        self.insert(hostname, address);
        self
    }

    pub fn insert(&self, hostname: impl Into<String>, address: impl Into<String>) {
        self.addresses.write().insert(hostname.into(), address.into());
    }

    /// Parse `HOST=ADDRESS` pairs into a provisioner.
    pub fn from_mappings<I, S>(default_port: u16, mappings: I) -> std::result::Result<Self, ProvisionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let provisioner = Self::new(default_port);
        for mapping in mappings {
            let mapping = mapping.as_ref();
            let (host, address) = mapping
                .split_once('=')
                .filter(|(h, a)| !h.is_empty() && !a.is_empty())
                .ok_or_else(|| ProvisionError::InvalidMapping(mapping.to_string()))?;
            provisioner.insert(host.trim(), address.trim());
        }
        Ok(provisioner)
    }

    fn address_of(&self, hostname: &str) -> std::result::Result<String, ProvisionError> {
        if let Some(address) = self.addresses.read().get(hostname) {
            return Ok(address.clone());
        }
        if self.strict {
            return Err(ProvisionError::UnknownHost(hostname.to_string()));
        }
        Ok(format!("{hostname}:{}", self.default_port))
    }
}

#[async_trait]
impl Provisioner for FixedProvisioner {
    async fn start(&self, id: ServerId, hostname: &str) -> Result<()> {
        let address = self.address_of(hostname).map_err(|e| e.for_host(hostname))?;
        debug!(server = %id, %hostname, %address, "using externally managed backend");
        Ok(())
    }

    async fn stop(&self, hostname: &str) -> Result<()> {
        debug!(%hostname, "externally managed backend released");
        Ok(())
    }

    async fn resolve_address(&self, hostname: &str) -> Result<String> {
        self.address_of(hostname).map_err(|e| e.for_host(hostname))
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}
