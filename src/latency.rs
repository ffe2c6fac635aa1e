//! Latency Sampler
//!
//! Per-(publisher, subscriber) latency distributions with a seeded RNG for
//! deterministic replay. Lognormal sampling reuses the teacher's
//! Box-Muller approach; `StdRng` is swapped for `ChaCha8Rng` since that's
//! the RNG the wider backtesting engine's determinism contract names.

use crate::clock::Micros;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Latency distribution parameters for one ordered `(publisher, subscriber)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LatencyParams {
    /// Lognormal: draws come from `exp(Normal(mu, sigma))` where
    /// `mu = ln(median_us)`, clamped into `[1, max_cap_us]`.
    Lognormal {
        median_us: f64,
        sigma: f64,
        max_cap_us: Micros,
    },
    /// Fixed latency, still floored to 1µs and capped.
    Fixed {
        latency_us: Micros,
        max_cap_us: Micros,
    },
}

impl LatencyParams {
    pub fn fixed(latency_us: Micros) -> Self {
        Self::Fixed {
            latency_us,
            max_cap_us: latency_us.max(1),
        }
    }

    /// 1µs fixed latency used for internal system pairs (spec §4.6,
    /// §9 Open Question 2: no debug-only randomization branch for these).
    pub fn internal_system_pair() -> Self {
        Self::fixed(1)
    }

    // Calibration profiles from spec §4.6.

    pub fn co_located_hft() -> Self {
        Self::Lognormal {
            median_us: 50.0,
            sigma: 0.42,
            max_cap_us: 200,
        }
    }

    pub fn metro_cross_connect() -> Self {
        Self::Lognormal {
            median_us: 300.0,
            sigma: 0.66,
            max_cap_us: 2_000,
        }
    }

    pub fn same_city_vps() -> Self {
        Self::Lognormal {
            median_us: 1_000.0,
            sigma: 0.67,
            max_cap_us: 5_000,
        }
    }

    pub fn domestic_retail() -> Self {
        Self::Lognormal {
            median_us: 12_000.0,
            sigma: 0.54,
            max_cap_us: 60_000,
        }
    }

    pub fn inter_continental() -> Self {
        Self::Lognormal {
            median_us: 60_000.0,
            sigma: 0.42,
            max_cap_us: 150_000,
        }
    }

    /// Sample a latency in microseconds, clamped to `[1, max_cap_us]`.
    pub fn sample(&self, rng: &mut ChaCha8Rng) -> Micros {
        match self {
            Self::Fixed {
                latency_us,
                max_cap_us,
            } => (*latency_us).clamp(1, (*max_cap_us).max(1)),

            Self::Lognormal {
                median_us,
                sigma,
                max_cap_us,
            } => {
                let mu = median_us.max(f64::MIN_POSITIVE).ln();
                let z = sample_standard_normal(rng);
                let sample = (mu + sigma * z).exp();
                (sample.round() as Micros).clamp(1, (*max_cap_us).max(1))
            }
        }
    }
}

/// Standard normal sample via the Box-Muller transform.
fn sample_standard_normal(rng: &mut ChaCha8Rng) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Running per-pair sampling diagnostics (supplementary, see SPEC_FULL.md).
#[derive(Debug, Clone, Default)]
pub struct LatencyStats {
    pub samples: u64,
    pub sum_us: i64,
    pub max_us: Micros,
}

impl LatencyStats {
    pub fn record(&mut self, latency_us: Micros) {
        self.samples += 1;
        self.sum_us += latency_us;
        self.max_us = self.max_us.max(latency_us);
    }

    pub fn avg_us(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.sum_us as f64 / self.samples as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn fixed_latency_is_exact_after_clamp() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let p = LatencyParams::Fixed {
            latency_us: 100,
            max_cap_us: 100,
        };
        for _ in 0..50 {
            assert_eq!(p.sample(&mut rng), 100);
        }
    }

    #[test]
    fn fixed_latency_floors_to_one_microsecond() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let p = LatencyParams::Fixed {
            latency_us: 0,
            max_cap_us: 10,
        };
        assert_eq!(p.sample(&mut rng), 1);
    }

    #[test]
    fn lognormal_latency_respects_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let p = LatencyParams::Lognormal {
            median_us: 1_000.0,
            sigma: 0.5,
            max_cap_us: 10_000,
        };
        for _ in 0..1000 {
            let sample = p.sample(&mut rng);
            assert!((1..=10_000).contains(&sample), "sample {sample} out of bounds");
        }
    }

    #[test]
    fn deterministic_given_same_seed() {
        let p = LatencyParams::co_located_hft();
        let mut rng1 = ChaCha8Rng::seed_from_u64(7);
        let mut rng2 = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..100 {
            assert_eq!(p.sample(&mut rng1), p.sample(&mut rng2));
        }
    }

    #[test]
    fn internal_system_pair_is_always_one_microsecond() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let p = LatencyParams::internal_system_pair();
        for _ in 0..10 {
            assert_eq!(p.sample(&mut rng), 1);
        }
    }
}
