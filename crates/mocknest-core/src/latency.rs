//! Latency sampling and chaos fault injection
//!
//! Chaos and latency draws share one non-cryptographic PRNG seeded once at
//! process start; template randomness lives in `templating` and uses its
//! own sources.

use crate::catalog::{ChaosSpec, LatencyMode, LatencySpec};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

static RNG: Lazy<Mutex<SmallRng>> = Lazy::new(|| Mutex::new(SmallRng::from_os_rng()));

fn uniform_f64() -> f64 {
    RNG.lock().random::<f64>()
}

fn uniform_range(lo: u64, hi: u64) -> u64 {
    if hi <= lo {
        return lo;
    }
    RNG.lock().random_range(lo..=hi)
}

fn uniform_index(len: usize) -> usize {
    RNG.lock().random_range(0..len)
}

impl LatencySpec {
    /// Draw one delay sample.
    ///
    /// Percentile mode buckets a uniform draw: below 0.5 yields p50, below
    /// 0.95 yields p95, the rest p99.
    pub fn sample(&self) -> Duration {
        let millis = match self.mode {
            LatencyMode::Fixed => self.min,
            LatencyMode::Random => uniform_range(self.min, self.max),
            LatencyMode::Percentile => {
                let u = uniform_f64();
                if u < 0.5 {
                    self.p50
                } else if u < 0.95 {
                    self.p95
                } else {
                    self.p99
                }
            }
        };
        Duration::from_millis(millis)
    }
}

impl ChaosSpec {
    /// Decide whether this request fails
    pub fn should_fail(&self) -> bool {
        if !self.enabled || self.failure_rate <= 0.0 {
            return false;
        }
        if self.failure_rate >= 1.0 {
            return true;
        }
        uniform_f64() < self.failure_rate
    }

    /// Pick the status code for an injected failure (500 when none are
    /// configured)
    pub fn pick_error_code(&self) -> u16 {
        if self.error_codes.is_empty() {
            500
        } else {
            self.error_codes[uniform_index(self.error_codes.len())]
        }
    }

    /// Extra latency drawn on the non-failure path, when bounds are set
    pub fn sample_latency(&self) -> Option<Duration> {
        if self.latency_min == 0 && self.latency_max == 0 {
            return None;
        }
        Some(Duration::from_millis(uniform_range(
            self.latency_min,
            self.latency_max,
        )))
    }
}

/// Resolve the delay for a response: the latency block wins over the plain
/// `delay` field.
pub fn effective_delay(latency: Option<&LatencySpec>, delay_ms: u64) -> Duration {
    match latency {
        Some(spec) => spec.sample(),
        None => Duration::from_millis(delay_ms),
    }
}

/// Sleep for the given duration when non-zero
pub async fn apply_delay(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_mode_is_constant() {
        let spec = LatencySpec {
            mode: LatencyMode::Fixed,
            min: 30,
            ..Default::default()
        };
        for _ in 0..10 {
            assert_eq!(spec.sample(), Duration::from_millis(30));
        }
    }

    #[test]
    fn random_mode_stays_in_bounds() {
        let spec = LatencySpec {
            mode: LatencyMode::Random,
            min: 10,
            max: 20,
            ..Default::default()
        };
        for _ in 0..200 {
            let d = spec.sample().as_millis() as u64;
            assert!((10..=20).contains(&d));
        }
    }

    #[test]
    fn percentile_frequencies_are_plausible() {
        let spec = LatencySpec {
            mode: LatencyMode::Percentile,
            p50: 1,
            p95: 2,
            p99: 3,
            ..Default::default()
        };
        let mut counts = [0usize; 3];
        let n = 20_000;
        for _ in 0..n {
            match spec.sample().as_millis() {
                1 => counts[0] += 1,
                2 => counts[1] += 1,
                3 => counts[2] += 1,
                other => panic!("unexpected sample {other}"),
            }
        }
        let p50 = counts[0] as f64 / n as f64;
        let p95 = counts[1] as f64 / n as f64;
        let p99 = counts[2] as f64 / n as f64;
        assert!((p50 - 0.5).abs() < 0.05, "p50 share was {p50}");
        assert!((p95 - 0.45).abs() < 0.05, "p95 share was {p95}");
        assert!((p99 - 0.05).abs() < 0.02, "p99 share was {p99}");
    }

    #[test]
    fn chaos_rate_extremes() {
        let never = ChaosSpec {
            enabled: true,
            failure_rate: 0.0,
            ..Default::default()
        };
        let always = ChaosSpec {
            enabled: true,
            failure_rate: 1.0,
            ..Default::default()
        };
        let disabled = ChaosSpec {
            enabled: false,
            failure_rate: 1.0,
            ..Default::default()
        };
        for _ in 0..50 {
            assert!(!never.should_fail());
            assert!(always.should_fail());
            assert!(!disabled.should_fail());
        }
    }

    #[test]
    fn chaos_empirical_rate() {
        let chaos = ChaosSpec {
            enabled: true,
            failure_rate: 0.3,
            ..Default::default()
        };
        let n = 20_000;
        let failures = (0..n).filter(|_| chaos.should_fail()).count();
        let rate = failures as f64 / n as f64;
        assert!((rate - 0.3).abs() < 0.05, "empirical rate was {rate}");
    }

    #[test]
    fn error_code_selection() {
        let chaos = ChaosSpec {
            enabled: true,
            failure_rate: 1.0,
            error_codes: vec![502, 503],
            ..Default::default()
        };
        for _ in 0..50 {
            assert!(matches!(chaos.pick_error_code(), 502 | 503));
        }
        let bare = ChaosSpec::default();
        assert_eq!(bare.pick_error_code(), 500);
    }

    #[test]
    fn delay_precedence() {
        let latency = LatencySpec {
            mode: LatencyMode::Fixed,
            min: 7,
            ..Default::default()
        };
        assert_eq!(effective_delay(Some(&latency), 99), Duration::from_millis(7));
        assert_eq!(effective_delay(None, 99), Duration::from_millis(99));
    }
}
