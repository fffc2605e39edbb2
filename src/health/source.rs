use rand::{rngs::StdRng, Rng, SeedableRng};

use super::HealthSample;

const BUFFERING_PROBABILITY: f64 = 0.05;

/// Supplies health telemetry to the simulator.
///
/// A production deployment would back this with media server or CDN stats;
/// [`RandomHealthSource`] stands in for it locally.
pub trait HealthSource: Send {
    fn next_sample(&mut self) -> HealthSample;
    fn viewer_count(&mut self) -> u32;
}

pub struct RandomHealthSource {
    rng: StdRng,
}

impl RandomHealthSource {
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

impl Default for RandomHealthSource {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthSource for RandomHealthSource {
    fn next_sample(&mut self) -> HealthSample {
        HealthSample {
            bitrate_kbps: self.rng.gen_range(2500..3500),
            fps: self.rng.gen_range(28..=31),
            latency_ms: self.rng.gen_range(50..150),
            buffering: self.rng.gen_bool(BUFFERING_PROBABILITY),
            dropped_frames: self.rng.gen_range(0..5),
        }
    }

    fn viewer_count(&mut self) -> u32 {
        self.rng.gen_range(50..150)
    }
}
