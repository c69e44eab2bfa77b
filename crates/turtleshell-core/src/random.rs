//! Seeded randomness shared by bootstrap partitioning, random-baseline
//! selection, tie shuffling and CRF training order.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// A deterministic generator for `seed`.
pub fn seeded(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Shuffles `items` in place with a generator seeded from `seed`.
pub fn shuffle_seeded<T>(items: &mut [T], seed: u64) {
    items.shuffle(&mut seeded(seed));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shuffle_is_reproducible() {
        let mut a: Vec<u32> = (0..20).collect();
        let mut b = a.clone();
        shuffle_seeded(&mut a, 3);
        shuffle_seeded(&mut b, 3);
        assert_eq!(a, b);
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut items: Vec<u32> = (0..50).collect();
        shuffle_seeded(&mut items, 11);
        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn shared_generator_advances_between_shuffles() {
        let mut rng = seeded(5);
        let mut first: Vec<u32> = (0..30).collect();
        let mut second = first.clone();
        first.shuffle(&mut rng);
        second.shuffle(&mut rng);
        assert_ne!(first, second);
    }

    #[test]
    fn shuffle_handles_tiny_slices() {
        let mut empty: Vec<u8> = Vec::new();
        shuffle_seeded(&mut empty, 0);
        let mut one = vec![7];
        shuffle_seeded(&mut one, 0);
        assert_eq!(one, vec![7]);
    }
}
