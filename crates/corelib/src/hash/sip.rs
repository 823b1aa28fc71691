//! SipHash-1-3 ring hasher.

use std::hash::Hasher;

use siphasher::sip::SipHasher13;

use crate::hash::traits::RingHasher;
use crate::node::ServerId;

const VNODE_KEYS: (u64, u64) = (0x5d2f_9c31_a4e7_0b18, 0x1b87_3593_cc9e_2d51);
const REQUEST_KEYS: (u64, u64) = (0x9e37_79b9_7f4a_7c15, 0xc2b2_ae3d_27d4_eb4f);

/// SipHash-1-3 with separate keys for virtual nodes and requests.
#[derive(Clone, Debug, Default)]
pub struct SipRingHasher;

impl RingHasher for SipRingHasher {
    fn virtual_node(&self, server: ServerId, replica: usize) -> u64 {
        let mut hasher = SipHasher13::new_with_keys(VNODE_KEYS.0, VNODE_KEYS.1);
        hasher.write_u32(server.0);
        hasher.write_u64(replica as u64);
        hasher.finish()
    }

    fn request(&self, request_id: u64) -> u64 {
        let mut hasher = SipHasher13::new_with_keys(REQUEST_KEYS.0, REQUEST_KEYS.1);
        hasher.write_u64(request_id);
        hasher.finish()
    }

    fn name(&self) -> &'static str {
        "SipRingHasher"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_vnode_positions_differ_per_replica() {
        let hasher = SipRingHasher;
        let positions: HashSet<u64> = (0..9)
            .map(|j| hasher.virtual_node(ServerId(1), j))
            .collect();
        assert_eq!(positions.len(), 9);
    }

    #[test]
    fn test_deterministic() {
        let hasher = SipRingHasher;
        assert_eq!(
            hasher.virtual_node(ServerId(3), 2),
            hasher.virtual_node(ServerId(3), 2)
        );
        assert_eq!(hasher.request(42), hasher.request(42));
    }
}
