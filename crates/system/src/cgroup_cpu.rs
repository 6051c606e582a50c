//! Quota-aware CPU usage sampler.
//!
//! Combines the process's cgroup accounting with the host aggregate from
//! `/proc/stat` to report utilization normalized against the cgroup-imposed
//! core quota, so `1000` always means "fully saturating what this process
//! is allowed to use" regardless of how big the host is.

use meter_core::{CpuInfo, Result};
use sysinfo::{CpuRefreshKind, System};
use tracing::debug;

use crate::cgroup::Cgroup;
use crate::host;
use crate::CpuSampler;

/// CPU sampler normalized against the container core quota.
///
/// The previous-sample baselines are plain fields; concurrent `usage` calls
/// on a shared instance are unsound, which `&mut self` enforces.
pub struct CgroupCpu {
    frequency: u64,
    quota: f64,
    cores: u64,
    pre_system: u64,
    pre_total: u64,
}

impl CgroupCpu {
    /// Discover core count, pinning, CFS quota and frequency, and seed the
    /// usage baselines. Fails if any underlying pseudo-file read fails.
    pub fn new() -> Result<Self> {
        let mut cores = logical_cores();
        if cores == 0 {
            // Platform query came up empty; count the CPUs that have ever
            // accumulated time instead.
            cores = per_cpu_usage()?.len() as u64;
        }

        let pinned = pinned_budget(cpu_sets()?.len() as f64, cores);
        let mut quota = pinned;
        if let Ok(cfs_quota) = cpu_quota() {
            if cfs_quota != -1 {
                quota = effective_quota(pinned, cfs_quota, cpu_period()?);
            }
        }

        let frequency = host::cpu_max_freq();
        let pre_system = host::system_cpu_usage()?;
        let pre_total = total_cpu_usage()?;

        debug!(cores, quota, frequency, "cgroup CPU sampler initialized");
        Ok(Self {
            frequency,
            quota,
            cores,
            pre_system,
            pre_total,
        })
    }

    /// Fold one `(process, host)` snapshot pair into the baselines and
    /// report the permille usage it implies.
    ///
    /// An unchanged host aggregate (the call came faster than the host
    /// clock's resolution) reads as `0` without ever dividing, and so does
    /// a counter that went backward. The baselines move in every case.
    fn observe(&mut self, total: u64, system: u64) -> u64 {
        let mut usage = 0;
        if system != self.pre_system {
            let delta_total = total.saturating_sub(self.pre_total);
            let delta_system = system.saturating_sub(self.pre_system);
            if delta_system > 0 {
                usage = scaled_usage(delta_total, self.cores, delta_system, self.quota);
            }
        }
        self.pre_system = system;
        self.pre_total = total;
        usage
    }
}

impl CpuSampler for CgroupCpu {
    fn usage(&mut self) -> Result<u64> {
        let total = total_cpu_usage()?;
        let system = host::system_cpu_usage()?;
        Ok(self.observe(total, system))
    }

    fn info(&self) -> CpuInfo {
        CpuInfo {
            frequency: self.frequency,
            quota: self.quota,
        }
    }
}

/// Process CPU-time delta scaled by total logical cores, over host-time
/// delta scaled by the effective quota: permille of the allotted quota.
fn scaled_usage(delta_total: u64, cores: u64, delta_system: u64, quota: f64) -> u64 {
    let used = delta_total as u128 * cores as u128 * 1000;
    (used as f64 / (delta_system as f64 * quota)) as u64
}

/// An empty cpuset reads as "no pinning at all": budget the whole machine
/// rather than carrying a zero quota into the usage division.
fn pinned_budget(pinned_cores: f64, cores: u64) -> f64 {
    if pinned_cores > 0.0 {
        pinned_cores
    } else {
        cores as f64
    }
}

/// Pinned-core budget, capped by the CFS limit when one is configured.
fn effective_quota(pinned_cores: f64, cfs_quota: i64, cfs_period: u64) -> f64 {
    if cfs_quota == -1 {
        return pinned_cores;
    }
    let limit = cfs_quota as f64 / cfs_period as f64;
    if limit < pinned_cores {
        limit
    } else {
        pinned_cores
    }
}

fn logical_cores() -> u64 {
    let mut sys = System::new();
    sys.refresh_cpu_list(CpuRefreshKind::nothing());
    sys.cpus().len() as u64
}

// Each helper resolves the membership afresh: quota and pinning can change
// underneath a live process.

fn total_cpu_usage() -> Result<u64> {
    Cgroup::current()?.cpuacct_usage()
}

fn per_cpu_usage() -> Result<Vec<u64>> {
    Cgroup::current()?.cpuacct_usage_percpu()
}

fn cpu_sets() -> Result<Vec<u64>> {
    Cgroup::current()?.cpuset_cpus()
}

fn cpu_quota() -> Result<i64> {
    Cgroup::current()?.cfs_quota_us()
}

fn cpu_period() -> Result<u64> {
    Cgroup::current()?.cfs_period_us()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampler(pre_total: u64, pre_system: u64) -> CgroupCpu {
        CgroupCpu {
            frequency: 0,
            quota: 1.0,
            cores: 2,
            pre_system,
            pre_total,
        }
    }

    #[test]
    fn observe_reports_permille_of_quota() {
        let mut cpu = sampler(1_000, 5_000);
        // 1000 ns of process time over 2000 ns of host time, 2 cores,
        // 1 core of quota: exactly at the limit.
        assert_eq!(cpu.observe(2_000, 7_000), 1000);
        assert_eq!(cpu.pre_total, 2_000);
        assert_eq!(cpu.pre_system, 7_000);
    }

    #[test]
    fn identical_host_time_reads_zero_without_dividing() {
        let mut cpu = sampler(1_000, 5_000);
        assert_eq!(cpu.observe(1_500, 5_000), 0);
        // Baselines still move so the next delta is well-formed.
        assert_eq!(cpu.pre_total, 1_500);
        assert_eq!(cpu.pre_system, 5_000);
    }

    #[test]
    fn regressed_counters_read_zero() {
        let mut cpu = sampler(1_000, 5_000);
        // Both counters went backward (e.g. the cgroup was recreated).
        assert_eq!(cpu.observe(900, 4_000), 0);
        assert_eq!(cpu.pre_total, 900);
        assert_eq!(cpu.pre_system, 4_000);
    }

    #[test]
    fn empty_cpuset_budgets_the_whole_machine() {
        assert_eq!(pinned_budget(0.0, 8), 8.0);
        assert_eq!(pinned_budget(3.0, 8), 3.0);
    }

    #[test]
    fn unlimited_cfs_quota_keeps_pinned_count() {
        assert_eq!(effective_quota(8.0, -1, 100_000), 8.0);
    }

    #[test]
    fn finite_cfs_quota_caps_the_budget() {
        // 50 ms of CPU per 100 ms period is half a core.
        assert_eq!(effective_quota(8.0, 50_000, 100_000), 0.5);
    }

    #[test]
    fn cfs_quota_above_pinning_changes_nothing() {
        assert_eq!(effective_quota(2.0, 400_000, 100_000), 2.0);
    }

    #[test]
    fn saturating_the_quota_reads_one_thousand() {
        // 500 ns of process time out of 2000 ns host time, 2 cores, half a
        // core of quota: exactly at the limit.
        assert_eq!(scaled_usage(500, 2, 2000, 0.5), 1000);
    }

    #[test]
    fn idle_process_reads_zero() {
        assert_eq!(scaled_usage(0, 4, 10_000, 2.0), 0);
    }
}
