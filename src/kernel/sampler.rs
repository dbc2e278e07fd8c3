use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Inclusive bounds, in whole seconds, for the pause between two scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingPolicy {
    pub min_interval_secs: u64,
    pub max_interval_secs: u64,
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self {
            min_interval_secs: 5,
            max_interval_secs: 15,
        }
    }
}

impl SamplingPolicy {
    /// Swapped bounds are normalised rather than rejected.
    pub fn bounds(&self) -> (u64, u64) {
        if self.min_interval_secs <= self.max_interval_secs {
            (self.min_interval_secs, self.max_interval_secs)
        } else {
            (self.max_interval_secs, self.min_interval_secs)
        }
    }

    pub fn next_interval(&self, random: &mut dyn RandomSource) -> Duration {
        let (min, max) = self.bounds();
        Duration::from_secs(random.interval_secs(min, max))
    }
}

/// Every random choice the device makes goes through here.
pub trait RandomSource: Send {
    /// Uniform integer in `[min, max]`.
    fn interval_secs(&mut self, min: u64, max: u64) -> u64;

    /// Uniform index in `[0, len)`. Callers guarantee `len > 0`.
    fn pick_index(&mut self, len: usize) -> usize;
}

pub struct ThreadRandom {
    rng: StdRng,
}

impl ThreadRandom {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for ThreadRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for ThreadRandom {
    fn interval_secs(&mut self, min: u64, max: u64) -> u64 {
        self.rng.gen_range(min..=max)
    }

    fn pick_index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }
}

/// Replays fixed sequences. When a queue runs dry it falls back to the
/// lower bound / first index, so a script never panics mid-test.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRandom {
    intervals: VecDeque<u64>,
    indices: VecDeque<usize>,
}

impl ScriptedRandom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_intervals(mut self, secs: impl IntoIterator<Item = u64>) -> Self {
        self.intervals.extend(secs);
        self
    }

    /// Indices are consumed in pick order: badge first, then action.
    pub fn with_indices(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.indices.extend(indices);
        self
    }
}

impl RandomSource for ScriptedRandom {
    fn interval_secs(&mut self, min: u64, max: u64) -> u64 {
        self.intervals
            .pop_front()
            .map(|s| s.clamp(min, max))
            .unwrap_or(min)
    }

    fn pick_index(&mut self, len: usize) -> usize {
        self.indices
            .pop_front()
            .map(|i| i.min(len.saturating_sub(1)))
            .unwrap_or(0)
    }
}

/// `DEVICE_` followed by a three digit number.
pub fn random_device_id(random: &mut dyn RandomSource) -> String {
    format!("DEVICE_{}", random.interval_secs(100, 999))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn intervals_stay_in_bounds_and_cover_the_range() {
        let policy = SamplingPolicy::default();
        let mut random = ThreadRandom::seeded(7);
        let mut seen = HashSet::new();
        for _ in 0..5_000 {
            let secs = policy.next_interval(&mut random).as_secs();
            assert!((5..=15).contains(&secs), "out of range: {secs}");
            seen.insert(secs);
        }
        // Both endpoints must be reachable.
        assert_eq!(seen.len(), 11);
    }

    #[test]
    fn swapped_bounds_are_normalised() {
        let policy = SamplingPolicy { min_interval_secs: 9, max_interval_secs: 3 };
        assert_eq!(policy.bounds(), (3, 9));
    }

    #[test]
    fn scripted_values_are_clamped() {
        let mut random = ScriptedRandom::new().with_intervals([1, 20]).with_indices([7]);
        assert_eq!(random.interval_secs(5, 15), 5);
        assert_eq!(random.interval_secs(5, 15), 15);
        assert_eq!(random.interval_secs(5, 15), 5);
        assert_eq!(random.pick_index(3), 2);
        assert_eq!(random.pick_index(3), 0);
    }

    #[test]
    fn device_ids_have_three_digits() {
        let mut random = ThreadRandom::seeded(1);
        for _ in 0..200 {
            let id = random_device_id(&mut random);
            let digits = id.strip_prefix("DEVICE_").unwrap();
            assert_eq!(digits.len(), 3);
            assert!(digits.parse::<u16>().is_ok());
        }
    }
}
