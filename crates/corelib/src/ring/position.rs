//! Bounded linear probing over the slot array.

/// Cells visited by a forward scan that starts at `start` and wraps around.
///
/// The probe yields at most `slots` indices, so a scan over a full or empty
/// ring always terminates after one lap.
#[derive(Clone, Debug)]
pub struct Probe {
    next: usize,
    slots: usize,
    remaining: usize,
}

impl Probe {
    /// Probe starting at `start % slots`.
    pub fn new(start: usize, slots: usize) -> Self {
        Self {
            next: if slots == 0 { 0 } else { start % slots },
            slots,
            remaining: slots,
        }
    }

    /// Probe starting at the slot a raw hash reduces to.
    pub fn from_hash(hash: u64, slots: usize) -> Self {
        let start = if slots == 0 { 0 } else { (hash % slots as u64) as usize };
        Self::new(start, slots)
    }
}

impl Iterator for Probe {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let slot = self.next;
        self.next = (self.next + 1) % self.slots;
        self.remaining -= 1;
        Some(slot)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Probe {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_wraps() {
        let cells: Vec<usize> = Probe::new(6, 8).collect();
        assert_eq!(cells, vec![6, 7, 0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_probe_bounded() {
        assert_eq!(Probe::new(0, 512).count(), 512);
        assert_eq!(Probe::new(3, 0).count(), 0);
    }

    #[test]
    fn test_from_hash_reduces() {
        assert_eq!(Probe::from_hash(1029, 512).next(), Some(5));
    }
}
