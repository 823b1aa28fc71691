//! Provisioning error types.

use thiserror::Error;

/// Errors raised while driving backend lifecycles.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("no address configured for {0}")]
    UnknownHost(String),

    #[error("invalid backend mapping '{0}', expected HOST=ADDRESS")]
    InvalidMapping(String),
}

impl ProvisionError {
    /// Convert into the core error for the backend `hostname`.
    pub fn for_host(self, hostname: &str) -> corelib::Error {
        corelib::Error::ProvisioningFailed {
            hostname: hostname.to_string(),
            reason: self.to_string(),
        }
    }
}
