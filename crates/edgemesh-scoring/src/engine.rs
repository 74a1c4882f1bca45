//! Scoring engine — ordered sampling plus composite scoring.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::SampleResult;
use crate::sampler::ResourceSampler;
use crate::scorer::{INVALID_SCORE, ResourceSample, ScoringWeights, composite_score};

/// Produces comparable scores for this device or for pre-gathered samples.
///
/// Stateless per call apart from the sampler it owns; share it behind an
/// `Arc` across tasks.
pub struct ScoringEngine {
    sampler: Arc<dyn ResourceSampler>,
    weights: ScoringWeights,
}

impl ScoringEngine {
    pub fn new(sampler: Arc<dyn ResourceSampler>, weights: ScoringWeights) -> Self {
        Self { sampler, weights }
    }

    /// Sample this device as seen from `device_id`.
    ///
    /// Metrics are taken in a fixed order: CPU usage, CPU count, CPU max
    /// frequency, bandwidth, then RTT to `device_id`. The first failure
    /// aborts the sample.
    pub fn sample(&self, device_id: &str) -> SampleResult<ResourceSample> {
        let cpu_usage_percent = self.sampler.cpu_usage_percent()?;
        let cpu_count = self.sampler.cpu_count()?;
        let cpu_max_freq_mhz = self.sampler.cpu_max_freq_mhz()?;
        let bandwidth_mbps = self.sampler.network_bandwidth_mbps()?;
        let rtt_ms = self.sampler.network_rtt_ms(device_id)?;

        Ok(ResourceSample {
            cpu_usage_percent,
            cpu_count,
            cpu_max_freq_mhz,
            bandwidth_mbps,
            rtt_ms,
        })
    }

    /// Score this device for a request coming from `device_id`.
    ///
    /// Returns [`INVALID_SCORE`] if any metric cannot be sampled.
    pub fn score_of(&self, device_id: &str) -> f64 {
        match self.sample(device_id) {
            Ok(sample) => self.score_from_resources(&sample),
            Err(e) => {
                warn!(%device_id, error = %e, "resource sampling failed");
                INVALID_SCORE
            }
        }
    }

    /// Score a sample gathered elsewhere (typically from a remote peer).
    pub fn score_from_resources(&self, sample: &ResourceSample) -> f64 {
        let score = composite_score(sample, &self.weights);
        debug!(score, ?sample, "computed score");
        score
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::SampleError;

    /// Records the order metrics are requested in.
    #[derive(Default)]
    struct ScriptedSampler {
        calls: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl ScriptedSampler {
        fn failing_on(metric: &'static str) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_on: Some(metric),
            }
        }

        fn record(&self, metric: &'static str) -> SampleResult<()> {
            self.calls.lock().unwrap().push(metric.to_string());
            if self.fail_on == Some(metric) {
                return Err(SampleError::unavailable(metric, "scripted failure"));
            }
            Ok(())
        }
    }

    impl ResourceSampler for ScriptedSampler {
        fn cpu_usage_percent(&self) -> SampleResult<f64> {
            self.record("cpu_usage").map(|_| 20.0)
        }
        fn cpu_count(&self) -> SampleResult<u32> {
            self.record("cpu_count").map(|_| 4)
        }
        fn cpu_max_freq_mhz(&self) -> SampleResult<f64> {
            self.record("cpu_freq").map(|_| 2000.0)
        }
        fn network_bandwidth_mbps(&self) -> SampleResult<f64> {
            self.record("bandwidth").map(|_| 100.0)
        }
        fn network_rtt_ms(&self, device_id: &str) -> SampleResult<f64> {
            self.calls.lock().unwrap().push(format!("rtt:{device_id}"));
            if self.fail_on == Some("rtt") {
                return Err(SampleError::UnknownRtt(device_id.to_string()));
            }
            Ok(4.0)
        }
    }

    #[test]
    fn samples_in_fixed_order_with_rtt_last() {
        let sampler = Arc::new(ScriptedSampler::default());
        let engine = ScoringEngine::new(sampler.clone(), ScoringWeights::default());

        let score = engine.score_of("peer-1");

        assert!(score >= 0.0);
        assert_eq!(
            *sampler.calls.lock().unwrap(),
            vec!["cpu_usage", "cpu_count", "cpu_freq", "bandwidth", "rtt:peer-1"]
        );
    }

    #[test]
    fn any_sample_failure_yields_invalid_score() {
        for metric in ["cpu_usage", "cpu_count", "cpu_freq", "bandwidth", "rtt"] {
            let engine = ScoringEngine::new(
                Arc::new(ScriptedSampler::failing_on(metric)),
                ScoringWeights::default(),
            );
            assert_eq!(engine.score_of("peer-1"), INVALID_SCORE, "failing on {metric}");
        }
    }

    #[test]
    fn failure_stops_sampling() {
        let sampler = Arc::new(ScriptedSampler::failing_on("cpu_count"));
        let engine = ScoringEngine::new(sampler.clone(), ScoringWeights::default());

        engine.score_of("peer-1");

        assert_eq!(*sampler.calls.lock().unwrap(), vec!["cpu_usage", "cpu_count"]);
    }

    #[test]
    fn live_and_pregathered_scores_agree() {
        let engine = ScoringEngine::new(Arc::new(ScriptedSampler::default()), ScoringWeights::default());
        let sample = engine.sample("peer-1").unwrap();

        assert_eq!(engine.score_of("peer-1"), engine.score_from_resources(&sample));
    }
}
