//! Hash functions that place virtual nodes and requests on the ring.
//!
//! A `RingHasher` turns `(server, replica)` pairs and request ids into raw
//! 64-bit positions; the ring reduces them modulo its slot count. Hashers are
//! stateless and thread-safe, so one instance is shared by every lookup.

pub mod sip;
pub mod traits;
pub mod xxh3;

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Error;

pub use sip::SipRingHasher;
pub use traits::RingHasher;
pub use xxh3::Xxh3RingHasher;

/// Stable request id for a request path.
///
/// Repeated requests for the same path always map to the same id, which keeps
/// them sticky to one backend while the ring is unchanged.
#[inline]
pub fn path_request_id(path: &str) -> u64 {
    xxhash_rust::xxh3::xxh3_64(path.as_bytes())
}

/// Selects a `RingHasher` implementation by name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HasherKind {
    #[default]
    Sip,
    Xxh3,
}

impl HasherKind {
    /// Build the hasher this kind names.
    pub fn build(self) -> Arc<dyn RingHasher> {
        match self {
            HasherKind::Sip => Arc::new(SipRingHasher::default()),
            HasherKind::Xxh3 => Arc::new(Xxh3RingHasher::default()),
        }
    }
}

impl FromStr for HasherKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sip" | "siphash" => Ok(HasherKind::Sip),
            "xxh3" | "xxhash" => Ok(HasherKind::Xxh3),
            other => Err(Error::InvalidConfig(format!("unknown hasher '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_request_id_is_stable() {
        assert_eq!(path_request_id("/home"), path_request_id("/home"));
        assert_ne!(path_request_id("/home"), path_request_id("/heartbeat"));
    }

    #[test]
    fn test_hasher_kind_parse() {
        assert_eq!("sip".parse::<HasherKind>().unwrap(), HasherKind::Sip);
        assert_eq!("XXH3".parse::<HasherKind>().unwrap(), HasherKind::Xxh3);
        assert!("md5".parse::<HasherKind>().is_err());
    }

    #[test]
    fn test_build_names() {
        assert_eq!(HasherKind::Sip.build().name(), "SipRingHasher");
        assert_eq!(HasherKind::Xxh3.build().name(), "Xxh3RingHasher");
    }
}
