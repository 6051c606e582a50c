use serde::{Deserialize, Serialize};

/// Static CPU facts reported by a sampler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuInfo {
    /// CPU frequency in Hz.
    pub frequency: u64,
    /// Effective core-count budget available to this process.
    pub quota: f64,
}

/// A point-in-time CPU usage reading.
///
/// `usage` is permille-like: `1000` means the process fully saturates its
/// allotted quota.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuStat {
    pub usage: u64,
}
