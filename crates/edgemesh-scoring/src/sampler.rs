//! Resource sampling on this device.
//!
//! [`ResourceSampler`] is the seam between the scoring engine and the
//! machine it runs on. [`SystemSampler`] is the production implementation
//! backed by `sysinfo`; RTT comes from an [`RttSource`] (the device
//! registry), since it depends on the device being scored against.

use std::sync::{Arc, Mutex};

use sysinfo::{CpuRefreshKind, System};
use tracing::debug;

use crate::error::{SampleError, SampleResult};

/// Source of the last known round-trip time to a device.
pub trait RttSource: Send + Sync {
    fn rtt_ms(&self, device_id: &str) -> SampleResult<f64>;
}

/// Samples raw resource metrics of the local device.
///
/// The engine calls these in declaration order. `network_rtt_ms` is always
/// last and is the only metric that depends on a remote device.
pub trait ResourceSampler: Send + Sync {
    fn cpu_usage_percent(&self) -> SampleResult<f64>;
    fn cpu_count(&self) -> SampleResult<u32>;
    fn cpu_max_freq_mhz(&self) -> SampleResult<f64>;
    fn network_bandwidth_mbps(&self) -> SampleResult<f64>;
    fn network_rtt_ms(&self, device_id: &str) -> SampleResult<f64>;
}

/// `sysinfo`-backed sampler.
///
/// Bandwidth is not observable from the OS counters alone, so it is the
/// configured link speed of this device.
pub struct SystemSampler {
    system: Mutex<System>,
    bandwidth_mbps: f64,
    rtt: Arc<dyn RttSource>,
}

impl SystemSampler {
    pub fn new(rtt: Arc<dyn RttSource>, bandwidth_mbps: f64) -> Self {
        let mut system = System::new();
        // Prime usage counters; the first reading after this is meaningful.
        system.refresh_cpu_specifics(CpuRefreshKind::everything());
        Self {
            system: Mutex::new(system),
            bandwidth_mbps,
            rtt,
        }
    }

    fn with_system<T>(
        &self,
        metric: &'static str,
        f: impl FnOnce(&mut System) -> T,
    ) -> SampleResult<T> {
        let mut system = self
            .system
            .lock()
            .map_err(|_| SampleError::unavailable(metric, "system handle poisoned"))?;
        Ok(f(&mut system))
    }
}

impl ResourceSampler for SystemSampler {
    fn cpu_usage_percent(&self) -> SampleResult<f64> {
        let usage = self.with_system("cpu_usage", |sys| {
            sys.refresh_cpu_specifics(CpuRefreshKind::new().with_cpu_usage());
            sys.global_cpu_info().cpu_usage()
        })?;
        debug!(usage, "sampled cpu usage");
        Ok(f64::from(usage))
    }

    fn cpu_count(&self) -> SampleResult<u32> {
        let count = self.with_system("cpu_count", |sys| sys.cpus().len())?;
        if count == 0 {
            return Err(SampleError::unavailable("cpu_count", "no cpus reported"));
        }
        Ok(count as u32)
    }

    fn cpu_max_freq_mhz(&self) -> SampleResult<f64> {
        let freq = self.with_system("cpu_freq", |sys| {
            sys.refresh_cpu_specifics(CpuRefreshKind::new().with_frequency());
            sys.cpus().iter().map(|c| c.frequency()).max().unwrap_or(0)
        })?;
        if freq == 0 {
            return Err(SampleError::unavailable("cpu_freq", "no frequency reported"));
        }
        Ok(freq as f64)
    }

    fn network_bandwidth_mbps(&self) -> SampleResult<f64> {
        if !(self.bandwidth_mbps.is_finite() && self.bandwidth_mbps > 0.0) {
            return Err(SampleError::unavailable(
                "bandwidth",
                format!("invalid link speed {}", self.bandwidth_mbps),
            ));
        }
        Ok(self.bandwidth_mbps)
    }

    fn network_rtt_ms(&self, device_id: &str) -> SampleResult<f64> {
        self.rtt.rtt_ms(device_id)
    }
}
