use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal, Uniform};

/// Deterministic uniform/Gaussian draws, seeded once at construction.
///
/// Backed by `StdRng` (a ChaCha-based stream whose output is stable across
/// platforms for a fixed `rand` version), so equal seeds and equal call
/// sequences reproduce bitwise-equal output. All pipeline stages that need
/// randomness draw from a single owned `Rng` in a well-defined serial order;
/// see `dogm::Dogm` for how that order is kept stable across `rayon`'s
/// parallel loops.
pub struct Rng {
    inner: StdRng,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
        }
    }

    pub fn uniform(&mut self, lo: f32, hi: f32) -> f32 {
        Uniform::new(lo, hi).sample(&mut self.inner)
    }

    pub fn normal(&mut self, mean: f32, stddev: f32) -> f32 {
        if stddev <= 0.0 {
            return mean;
        }
        Normal::new(mean, stddev).unwrap().sample(&mut self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_seeds_reproduce_bitwise_equal_sequences() {
        let mut a = Rng::new(42);
        let mut b = Rng::new(42);
        let draws_a: Vec<f32> = (0..64)
            .map(|i| {
                if i % 2 == 0 {
                    a.uniform(-1.0, 1.0)
                } else {
                    a.normal(0.0, 1.0)
                }
            })
            .collect();
        let draws_b: Vec<f32> = (0..64)
            .map(|i| {
                if i % 2 == 0 {
                    b.uniform(-1.0, 1.0)
                } else {
                    b.normal(0.0, 1.0)
                }
            })
            .collect();
        assert_eq!(draws_a, draws_b);
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = Rng::new(1);
        let mut b = Rng::new(2);
        let x = a.uniform(0.0, 1.0);
        let y = b.uniform(0.0, 1.0);
        assert_ne!(x, y);
    }
}
