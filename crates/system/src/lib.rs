pub mod cgroup;
pub mod cgroup_cpu;
pub mod host;
pub mod sysinfo_cpu;

pub use cgroup::Cgroup;
pub use cgroup_cpu::CgroupCpu;
pub use sysinfo_cpu::SysinfoCpu;

use std::time::Duration;

use meter_core::{CpuInfo, CpuStat, Result};
use tokio::sync::mpsc;
use tokio::time;
use tracing::warn;

/// A source of quota-normalized CPU usage readings.
///
/// `usage` takes `&mut self` because samplers carry unsynchronized
/// previous-sample baselines: a shared instance needs external
/// serialization, so give each measuring context its own.
pub trait CpuSampler {
    /// Current CPU usage, permille-like: `1000` means the process fully
    /// saturates its allotted quota.
    fn usage(&mut self) -> Result<u64>;

    /// Static CPU facts (frequency in Hz, effective core quota).
    fn info(&self) -> CpuInfo;
}

/// Spawn a background Tokio task that polls `sampler` every `interval` and
/// forwards [`CpuStat`] readings through the returned channel.
///
/// Each sample runs on the blocking pool: [`SysinfoCpu`] deliberately
/// sleeps for its whole measurement interval, and that must not stall a
/// runtime worker. A failed sample is logged and the last good reading is
/// re-sent, so the stream never goes silent once it has started. The task
/// stops automatically when the receiver is dropped.
pub fn spawn_monitor<S>(sampler: S, interval: Duration) -> mpsc::Receiver<CpuStat>
where
    S: CpuSampler + Send + 'static,
{
    let (tx, rx) = mpsc::channel(4);

    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        let mut last = CpuStat::default();
        let mut sampler = sampler;

        loop {
            ticker.tick().await;
            let (returned, result) = match tokio::task::spawn_blocking(move || {
                let mut sampler = sampler;
                let result = sampler.usage();
                (sampler, result)
            })
            .await
            {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("CPU sampler task failed: {e}");
                    break;
                }
            };
            sampler = returned;

            match result {
                Ok(usage) => last = CpuStat { usage },
                Err(e) => warn!("CPU sample failed: {e}"),
            }
            if tx.send(last).await.is_err() {
                break; // all receivers dropped
            }
        }
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use meter_core::MeterError;

    /// Yields 1, 2, 3, … with a failure on every third call.
    #[derive(Default)]
    struct FlakySampler {
        calls: u64,
        readings: u64,
    }

    impl CpuSampler for FlakySampler {
        fn usage(&mut self) -> Result<u64> {
            self.calls += 1;
            if self.calls % 3 == 0 {
                return Err(MeterError::Subsystem("cpuacct".into()));
            }
            self.readings += 1;
            Ok(self.readings)
        }

        fn info(&self) -> CpuInfo {
            CpuInfo::default()
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn monitor_forwards_readings() {
        let mut rx = spawn_monitor(FlakySampler::default(), Duration::from_millis(5));

        assert_eq!(rx.recv().await.unwrap().usage, 1);
        assert_eq!(rx.recv().await.unwrap().usage, 2);
        // Third sample fails; the last good reading is repeated.
        assert_eq!(rx.recv().await.unwrap().usage, 2);
        assert_eq!(rx.recv().await.unwrap().usage, 3);
    }
}
