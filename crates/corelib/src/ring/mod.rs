//! Consistent hash ring implementation.
//!
//! The ring is a fixed-size slot array. Virtual nodes claim cells by linear
//! probing from their home slot; requests are served by the first occupied
//! cell at or after theirs.

pub mod position;
pub mod ring;

pub use position::Probe;
pub use ring::{HashRing, RingBuilder, RingConfig, DEFAULT_SLOTS, DEFAULT_VNODES};
