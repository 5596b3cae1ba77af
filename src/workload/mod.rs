//! Key and value generation for the synthetic workload.
//!
//! The key population is generated once at startup from the OS entropy
//! source and shared read-only across all workers. Values are generated
//! fresh for every write. Key selection is uniform random rather than
//! round-robin so measurement traffic does not exhibit artificial locality.

use crate::core::{BenchError, KeySelection, Result};
use rand::rngs::OsRng;
use rand::{Rng, RngCore};

/// Fixed population of random byte-string keys.
///
/// Key lengths vary over 8..=16 bytes. Immutable after construction.
pub struct KeyPopulation {
    keys: Vec<Vec<u8>>,
    selection: KeySelection,
}

impl KeyPopulation {
    /// Generate `key_space` random keys.
    ///
    /// Fails only if the OS entropy source does, which aborts startup.
    pub fn generate(key_space: usize, selection: KeySelection) -> Result<Self> {
        let mut keys = Vec::with_capacity(key_space);
        for i in 0..key_space {
            let key_len = 8 + (i % 9);
            let mut key = vec![0u8; key_len];
            OsRng
                .try_fill_bytes(&mut key)
                .map_err(|e| BenchError::entropy(format!("failed to generate key {}: {}", i, e)))?;
            keys.push(key);
        }
        Ok(KeyPopulation { keys, selection })
    }

    /// Number of keys in the population.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if the population is empty.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Uniformly select a key; O(1).
    pub fn next_key(&self) -> &[u8] {
        let idx = match self.selection {
            KeySelection::Secure => OsRng.gen_range(0..self.keys.len()),
            KeySelection::Fast => fastrand::usize(0..self.keys.len()),
        };
        &self.keys[idx]
    }

    /// Generate `size` fresh random bytes for a write, independent per call.
    pub fn next_value(&self, size: usize) -> Vec<u8> {
        let mut value = vec![0u8; size];
        match self.selection {
            KeySelection::Secure => OsRng.fill_bytes(&mut value),
            KeySelection::Fast => fill_fast(&mut value),
        }
        value
    }
}

fn fill_fast(buf: &mut [u8]) {
    let mut chunks = buf.chunks_exact_mut(8);
    for chunk in &mut chunks {
        chunk.copy_from_slice(&fastrand::u64(..).to_le_bytes());
    }
    for byte in chunks.into_remainder() {
        *byte = fastrand::u8(..);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_key_lengths_in_range() {
        let pop = KeyPopulation::generate(100, KeySelection::Fast).unwrap();
        assert_eq!(pop.len(), 100);
        for i in 0..100 {
            let len = pop.keys[i].len();
            assert!((8..=16).contains(&len), "key {} has length {}", i, len);
        }
    }

    #[test]
    fn test_next_key_stays_in_population() {
        let pop = KeyPopulation::generate(32, KeySelection::Secure).unwrap();
        let known: HashSet<&[u8]> = pop.keys.iter().map(|k| k.as_slice()).collect();
        for _ in 0..1000 {
            assert!(known.contains(pop.next_key()));
        }
    }

    #[test]
    fn test_values_are_independent() {
        let pop = KeyPopulation::generate(1, KeySelection::Secure).unwrap();
        let a = pop.next_value(64);
        let b = pop.next_value(64);
        assert_eq!(a.len(), 64);
        assert_eq!(b.len(), 64);
        // 64 random bytes colliding twice is effectively impossible.
        assert_ne!(a, b);
    }

    #[test]
    fn test_fill_fast_covers_remainder() {
        let mut buf = [0u8; 13];
        fill_fast(&mut buf);
        // Not a randomness test, just exercising the non-multiple-of-8 path.
        assert_eq!(buf.len(), 13);
    }
}
