//! Host-wide CPU readings from `/proc` and sysfs.

use std::fs;
use std::sync::OnceLock;

use meter_core::{MeterError, Result};
use tracing::debug;

const PROC_STAT: &str = "/proc/stat";
const PROC_CPUINFO: &str = "/proc/cpuinfo";
const SYSFS_MAX_FREQ: &str = "/sys/devices/system/cpu/cpu0/cpufreq/cpuinfo_max_freq";

const NANOS_PER_SEC: u64 = 1_000_000_000;
/// Documented fallback when `sysconf(_SC_CLK_TCK)` is unavailable.
const DEFAULT_CLOCK_TICKS: u64 = 100;

/// Scheduler ticks per second, resolved once from the OS.
pub fn clock_ticks() -> u64 {
    static TICKS: OnceLock<u64> = OnceLock::new();
    *TICKS.get_or_init(|| {
        nix::unistd::sysconf(nix::unistd::SysconfVar::CLK_TCK)
            .ok()
            .flatten()
            .filter(|&t| t > 0)
            .map(|t| t as u64)
            .unwrap_or(DEFAULT_CLOCK_TICKS)
    })
}

/// Host aggregate CPU time in nanoseconds, summed over the first seven
/// fields (user, nice, system, idle, iowait, irq, softirq) of the `cpu`
/// line in `/proc/stat`.
pub fn system_cpu_usage() -> Result<u64> {
    let content = fs::read_to_string(PROC_STAT).map_err(|source| MeterError::FileAccess {
        path: PROC_STAT.to_string(),
        source,
    })?;
    parse_proc_stat(&content, clock_ticks())
}

fn parse_proc_stat(content: &str, clock_ticks: u64) -> Result<u64> {
    for line in content.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.first() != Some(&"cpu") {
            continue;
        }
        if fields.len() < 8 {
            return Err(MeterError::Format {
                file: PROC_STAT.to_string(),
                reason: format!("cpu line has {} fields, expected at least 8", fields.len()),
            });
        }
        let mut ticks: u64 = 0;
        for token in &fields[1..8] {
            let v: u64 = token.parse().map_err(|_| MeterError::Parse {
                file: PROC_STAT.to_string(),
                token: token.to_string(),
            })?;
            ticks += v;
        }
        // Widened so a big, long-running host cannot overflow the product.
        return Ok((ticks as u128 * NANOS_PER_SEC as u128 / clock_ticks as u128) as u64);
    }
    Err(MeterError::Format {
        file: PROC_STAT.to_string(),
        reason: "no cpu line".to_string(),
    })
}

/// Best-effort CPU frequency in Hz from `/proc/cpuinfo`; `0` when nothing
/// usable is found.
pub fn cpu_freq() -> u64 {
    match fs::read_to_string(PROC_CPUINFO) {
        Ok(content) => parse_cpuinfo_freq(&content),
        Err(_) => 0,
    }
}

fn parse_cpuinfo_freq(content: &str) -> u64 {
    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        if matches!(key.trim(), "cpu MHz" | "clock") {
            if let Ok(mhz) = value.trim().replace("MHz", "").trim().parse::<f64>() {
                return (mhz * 1_000_000.0) as u64;
            }
        }
    }
    0
}

/// Maximum CPU frequency: the sysfs scaling limit of logical CPU 0 wins
/// over the `/proc/cpuinfo` value when both are readable.
pub fn cpu_max_freq() -> u64 {
    let freq = cpu_freq();
    let Ok(data) = fs::read_to_string(SYSFS_MAX_FREQ) else {
        debug!("no sysfs max frequency, using /proc/cpuinfo value {freq}");
        return freq;
    };
    match data.trim().parse::<u64>() {
        Ok(max) => max,
        Err(_) => freq,
    }
}
