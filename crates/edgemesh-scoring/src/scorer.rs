//! Composite device scoring.
//!
//! Evaluates a device using a weighted combination of:
//! - **CPU idle**: share of CPU not currently in use
//! - **CPU capacity**: cores × max frequency against a reference machine
//! - **Network**: link bandwidth against a reference link
//! - **Latency**: round-trip time from the requesting device
//!
//! Each component is normalized to `0.0..=100.0` before weighting, so with
//! the default weights (which sum to 1.0) a healthy device scores in the
//! same range. The result is clamped at zero.

use serde::{Deserialize, Serialize};

/// Sentinel for "could not be scored". Outside the valid (non-negative)
/// score range and never produced by [`composite_score`].
pub const INVALID_SCORE: f64 = -1.0;

/// Cores × GHz of the machine that earns a full CPU-capacity component.
const REFERENCE_CORE_GHZ: f64 = 16.0;

/// Link bandwidth that earns a full network component. Also the link speed
/// assumed for a device that does not configure its own.
pub const REFERENCE_BANDWIDTH_MBPS: f64 = 1000.0;

/// Round-trip time at which the latency component drops to half.
const RTT_HALF_SCORE_MS: f64 = 20.0;

/// Raw resource numbers for one device, as sampled on that device.
///
/// This is also the payload a peer returns for a resource query, so it is
/// serializable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    pub cpu_usage_percent: f64,
    pub cpu_count: u32,
    pub cpu_max_freq_mhz: f64,
    pub bandwidth_mbps: f64,
    /// Round-trip time between the sampled device and the requester.
    pub rtt_ms: f64,
}

impl ResourceSample {
    fn is_finite(&self) -> bool {
        self.cpu_usage_percent.is_finite()
            && self.cpu_max_freq_mhz.is_finite()
            && self.bandwidth_mbps.is_finite()
            && self.rtt_ms.is_finite()
    }
}

/// Individual score components for debugging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub cpu_idle: f64,
    pub cpu_capacity: f64,
    pub network: f64,
    pub latency: f64,
}

/// Weights for the scoring components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub cpu_idle: f64,
    pub cpu_capacity: f64,
    pub network: f64,
    pub latency: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            cpu_idle: 0.35,
            cpu_capacity: 0.25,
            network: 0.2,
            latency: 0.2,
        }
    }
}

impl ScoreBreakdown {
    /// Compute the normalized components of a sample.
    pub fn from_sample(sample: &ResourceSample) -> Self {
        let cpu_idle = (100.0 - sample.cpu_usage_percent).clamp(0.0, 100.0);

        let core_ghz = f64::from(sample.cpu_count) * sample.cpu_max_freq_mhz / 1000.0;
        let cpu_capacity = (core_ghz / REFERENCE_CORE_GHZ).min(1.0) * 100.0;

        // Not clamped below: a negative bandwidth report drags the total down.
        let network = (sample.bandwidth_mbps / REFERENCE_BANDWIDTH_MBPS).min(1.0) * 100.0;

        let latency = if sample.rtt_ms < 0.0 {
            0.0
        } else {
            100.0 / (1.0 + sample.rtt_ms / RTT_HALF_SCORE_MS)
        };

        Self {
            cpu_idle,
            cpu_capacity,
            network,
            latency,
        }
    }

    pub fn weighted(&self, weights: &ScoringWeights) -> f64 {
        weights.cpu_idle * self.cpu_idle
            + weights.cpu_capacity * self.cpu_capacity
            + weights.network * self.network
            + weights.latency * self.latency
    }
}

/// Score a sample. Returns [`INVALID_SCORE`] for non-finite input,
/// otherwise a value `>= 0.0`.
pub fn composite_score(sample: &ResourceSample, weights: &ScoringWeights) -> f64 {
    if !sample.is_finite() {
        return INVALID_SCORE;
    }
    let score = ScoreBreakdown::from_sample(sample).weighted(weights);
    if score.is_nan() { INVALID_SCORE } else { score.max(0.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(usage: f64, cores: u32, mhz: f64, mbps: f64, rtt: f64) -> ResourceSample {
        ResourceSample {
            cpu_usage_percent: usage,
            cpu_count: cores,
            cpu_max_freq_mhz: mhz,
            bandwidth_mbps: mbps,
            rtt_ms: rtt,
        }
    }

    #[test]
    fn idle_machine_outscores_busy_machine() {
        let weights = ScoringWeights::default();
        let idle = composite_score(&sample(5.0, 4, 2000.0, 100.0, 2.0), &weights);
        let busy = composite_score(&sample(95.0, 4, 2000.0, 100.0, 2.0), &weights);

        assert!(idle > busy, "idle ({idle}) should beat busy ({busy})");
    }

    #[test]
    fn lower_rtt_scores_higher() {
        let weights = ScoringWeights {
            cpu_idle: 0.0,
            cpu_capacity: 0.0,
            network: 0.0,
            latency: 1.0,
        };
        let near = composite_score(&sample(50.0, 4, 2000.0, 100.0, 1.0), &weights);
        let far = composite_score(&sample(50.0, 4, 2000.0, 100.0, 200.0), &weights);

        assert!(near > far);
    }

    #[test]
    fn components_are_capped() {
        let b = ScoreBreakdown::from_sample(&sample(0.0, 64, 5000.0, 10_000.0, 0.0));

        assert_eq!(b.cpu_idle, 100.0);
        assert_eq!(b.cpu_capacity, 100.0);
        assert_eq!(b.network, 100.0);
        assert_eq!(b.latency, 100.0);
        assert!((b.weighted(&ScoringWeights::default()) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn negative_total_is_clamped_to_zero() {
        let weights = ScoringWeights {
            cpu_idle: 0.0,
            cpu_capacity: 0.0,
            network: 1.0,
            latency: 0.0,
        };
        let score = composite_score(&sample(50.0, 1, 1000.0, -500.0, 5.0), &weights);

        assert_eq!(score, 0.0);
    }

    #[test]
    fn non_finite_sample_is_invalid() {
        let weights = ScoringWeights::default();
        assert_eq!(
            composite_score(&sample(f64::NAN, 4, 2000.0, 100.0, 2.0), &weights),
            INVALID_SCORE
        );
        assert_eq!(
            composite_score(&sample(10.0, 4, 2000.0, f64::INFINITY, 2.0), &weights),
            INVALID_SCORE
        );
    }

    #[test]
    fn sample_serializes_as_flat_map() {
        let json = serde_json::to_value(sample(12.5, 8, 2400.0, 300.0, 3.0)).unwrap();
        assert_eq!(json["cpu_count"], 8);
        assert_eq!(json["rtt_ms"], 3.0);
    }
}
