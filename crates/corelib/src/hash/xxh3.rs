//! xxh3 ring hasher.

use xxhash_rust::xxh3::xxh3_64_with_seed;

use crate::hash::traits::RingHasher;
use crate::node::ServerId;

const VNODE_SEED: u64 = 0x51_7cc1_b727_220a;
const REQUEST_SEED: u64 = 0x2545_f491_4f6c_dd1d;

/// xxh3-64 over little-endian encodings, seeded per purpose.
#[derive(Clone, Debug, Default)]
pub struct Xxh3RingHasher;

impl RingHasher for Xxh3RingHasher {
    fn virtual_node(&self, server: ServerId, replica: usize) -> u64 {
        let mut buf = [0u8; 12];
        buf[..4].copy_from_slice(&server.0.to_le_bytes());
        buf[4..].copy_from_slice(&(replica as u64).to_le_bytes());
        xxh3_64_with_seed(&buf, VNODE_SEED)
    }

    fn request(&self, request_id: u64) -> u64 {
        xxh3_64_with_seed(&request_id.to_le_bytes(), REQUEST_SEED)
    }

    fn name(&self) -> &'static str {
        "Xxh3RingHasher"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_servers_do_not_share_positions() {
        let hasher = Xxh3RingHasher;
        assert_ne!(
            hasher.virtual_node(ServerId(1), 0),
            hasher.virtual_node(ServerId(2), 0)
        );
    }
}
