//! Server identities for the hash ring.
//!
//! Servers are identified on the ring by a compact `ServerId`; everything else
//! about a server (its hostname) lives in the pool's `ServerRecord`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Compact identifier for a backend server.
///
/// Ids are assigned by the pool as one more than the current maximum, so the
/// first server is `ServerId(1)`. Zero is never handed out.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct ServerId(pub u32);

impl ServerId {
    /// The id that follows this one.
    #[inline]
    pub fn next(self) -> Self {
        ServerId(self.0 + 1)
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registered backend server.
///
/// Keep this struct small and cheap to clone; it is copied out of the pool on
/// every routed request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub id: ServerId,
    /// Hostname the provisioner started the backend under.
    pub hostname: String,
}

impl ServerRecord {
    /// Construct a new record.
    pub fn new(id: ServerId, hostname: impl Into<String>) -> Self {
        Self {
            id,
            hostname: hostname.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_id_next() {
        assert_eq!(ServerId(1).next(), ServerId(2));
        assert!(ServerId(1) < ServerId(2));
    }

    #[test]
    fn test_record_display_id() {
        let record = ServerRecord::new(ServerId(7), "s7");
        assert_eq!(record.id.to_string(), "7");
        assert_eq!(record.hostname, "s7");
    }
}
