use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Seeded LCG shared by every random choice in the simulation.
#[derive(Resource, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimRng {
    state: u64,
}

impl Default for SimRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl SimRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Derive an independent stream, e.g. one per subsystem.
    pub fn with_label(seed: u64, label: &str) -> Self {
        Self::new(seed ^ hash_seed(label))
    }

    pub fn state(&self) -> u64 {
        self.state
    }

    pub fn next_u64(&mut self) -> u64 {
        next_u64(&mut self.state)
    }

    /// Uniform in [0, 1).
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }

    /// Uniform in [0, max). Returns 0 when `max` is 0.
    pub fn range_usize(&mut self, max: usize) -> usize {
        if max == 0 {
            return 0;
        }
        ((self.next_u64() >> 33) % max as u64) as usize
    }

    pub fn range_f32(&mut self, min: f32, max: f32) -> f32 {
        min + (max - min) * self.next_f32()
    }
}

fn next_u64(state: &mut u64) -> u64 {
    *state = state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1);
    *state
}

pub fn hash_seed(value: &str) -> u64 {
    let mut hash = 1469598103934665603u64;
    for byte in value.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(1099511628211);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = SimRng::new(7);
        let mut b = SimRng::new(7);
        for _ in 0..16 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn ranges_stay_in_bounds() {
        let mut rng = SimRng::with_label(42, "ranges");
        for _ in 0..1000 {
            assert!(rng.range_usize(7) < 7);
            let value = rng.range_f32(-5.0, 5.0);
            assert!((-5.0..5.0).contains(&value));
        }
        assert_eq!(rng.range_usize(0), 0);
    }
}
