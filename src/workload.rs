//! Randomized workload generation.
//!
//! Keys and values are byte strings over a fixed alphabet. Sizes are purely
//! parameters; a 1-byte key and a 1 MiB value go through the same path.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::SizeBounds;

/// Symbols that may appear in generated keys and values. Deliberately
/// includes whitespace so the store's quoting path gets exercised, but no
/// quote or backslash characters.
pub const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz1234567890 \t\n_";

/// Seeded generator of random byte strings.
pub struct Generator {
    rng: StdRng,
}

impl Generator {
    /// Create a generator with an explicit seed. The same seed replays the
    /// same workload byte-for-byte.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generate a byte string whose length is uniform in `[min, max)` and
    /// whose bytes are independently uniform over [`ALPHABET`].
    pub fn gen_bytes(&mut self, bounds: &SizeBounds) -> Vec<u8> {
        let len = self.rng.gen_range(bounds.min..bounds.max);
        (0..len)
            .map(|_| ALPHABET[self.rng.gen_range(0..ALPHABET.len())])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn alphabet_has_no_quote_or_backslash() {
        assert!(!ALPHABET.contains(&b'"'));
        assert!(!ALPHABET.contains(&b'\\'));
    }

    #[test]
    fn same_seed_replays_same_workload() {
        let bounds = SizeBounds::new(8, 64).unwrap();
        let mut a = Generator::from_seed(42);
        let mut b = Generator::from_seed(42);
        for _ in 0..20 {
            assert_eq!(a.gen_bytes(&bounds), b.gen_bytes(&bounds));
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let bounds = SizeBounds::new(32, 33).unwrap();
        let mut a = Generator::from_seed(1);
        let mut b = Generator::from_seed(2);
        let streams_differ = (0..10).any(|_| a.gen_bytes(&bounds) != b.gen_bytes(&bounds));
        assert!(streams_differ);
    }

    #[test]
    fn single_length_bounds_pin_the_length() {
        let bounds = SizeBounds::new(500, 501).unwrap();
        let mut gen = Generator::from_seed(0);
        assert_eq!(gen.gen_bytes(&bounds).len(), 500);
    }

    #[test]
    fn one_mebibyte_value_is_just_a_parameter() {
        let bounds = SizeBounds::new(1024 * 1024, 1024 * 1024 + 1).unwrap();
        let mut gen = Generator::from_seed(9);
        let value = gen.gen_bytes(&bounds);
        assert_eq!(value.len(), 1024 * 1024);
        assert!(value.iter().all(|b| ALPHABET.contains(b)));
    }

    proptest! {
        #[test]
        fn lengths_and_bytes_stay_in_bounds(
            seed in any::<u64>(),
            min in 0usize..256,
            span in 1usize..256,
        ) {
            let bounds = SizeBounds::new(min, min + span).unwrap();
            let mut gen = Generator::from_seed(seed);
            let out = gen.gen_bytes(&bounds);
            prop_assert!(out.len() >= min && out.len() < min + span);
            prop_assert!(out.iter().all(|b| ALPHABET.contains(b)));
        }
    }
}
