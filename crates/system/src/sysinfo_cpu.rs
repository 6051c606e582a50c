//! Fallback sampler for hosts without cgroup accounting.
//!
//! Implements the same contract as [`CgroupCpu`](crate::CgroupCpu) on top
//! of the `sysinfo` platform query. Measurement here is deliberate
//! blocking: `usage` sleeps for the configured interval and lets the
//! platform diff its own counters across it.

use std::thread;
use std::time::Duration;

use meter_core::{CpuInfo, Result};
use sysinfo::{CpuRefreshKind, MINIMUM_CPU_UPDATE_INTERVAL, RefreshKind, System};

use crate::CpuSampler;

/// Aggregate-CPU-percent sampler over a fixed blocking interval.
pub struct SysinfoCpu {
    interval: Duration,
    sys: System,
}

impl SysinfoCpu {
    /// Store the sampling interval and run one blocking calibration pass so
    /// the first real reading has a baseline to diff against.
    pub fn new(interval: Duration) -> Result<Self> {
        let mut cpu = Self {
            interval,
            sys: System::new(),
        };
        cpu.usage()?;
        Ok(cpu)
    }
}

impl CpuSampler for SysinfoCpu {
    /// Blocks the calling thread for the configured interval, then reports
    /// the aggregate (not per-core) CPU percentage scaled ×10 to match the
    /// cgroup sampler's permille convention.
    fn usage(&mut self) -> Result<u64> {
        self.sys.refresh_cpu_usage();
        thread::sleep(self.interval.max(MINIMUM_CPU_UPDATE_INTERVAL));
        self.sys.refresh_cpu_usage();
        Ok((self.sys.global_cpu_usage() as f64 * 10.0) as u64)
    }

    /// Queried fresh on every call, unlike the cgroup sampler.
    fn info(&self) -> CpuInfo {
        let sys = System::new_with_specifics(
            RefreshKind::nothing().with_cpu(CpuRefreshKind::nothing().with_frequency()),
        );
        let frequency = sys
            .cpus()
            .first()
            .map(|cpu| cpu.frequency() * 1_000_000)
            .unwrap_or(0);
        CpuInfo {
            frequency,
            quota: sys.cpus().len() as f64,
        }
    }
}
