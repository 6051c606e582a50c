//! cgroup (v1) filesystem reader for the current process.
//!
//! Membership is resolved from `/proc/<pid>/cgroup`, one line per hierarchy
//! in the exact form `hierarchyID:subsystemList:path`; each subsystem name
//! maps to its directory under `/sys/fs/cgroup`. Nothing is cached: every
//! query re-reads the pseudo-files so a container move is picked up
//! immediately.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use meter_core::{MeterError, Result};

const CGROUP_ROOT: &str = "/sys/fs/cgroup";

/// Resolved per-subsystem cgroup paths for one process.
#[derive(Debug, Clone)]
pub struct Cgroup {
    subsystems: HashMap<String, PathBuf>,
}

impl Cgroup {
    /// Resolve the calling process's cgroup membership. A fresh mapping is
    /// built on every call.
    pub fn current() -> Result<Self> {
        let file = format!("/proc/{}/cgroup", std::process::id());
        let content = read_file(&file)?;
        Ok(Self {
            subsystems: parse_membership(&file, &content)?,
        })
    }

    /// CFS quota in microseconds; `-1` means unlimited.
    pub fn cfs_quota_us(&self) -> Result<i64> {
        self.read_value("cpu", "cpu.cfs_quota_us")
    }

    /// CFS period in microseconds.
    pub fn cfs_period_us(&self) -> Result<u64> {
        self.read_value("cpu", "cpu.cfs_period_us")
    }

    /// Cumulative CPU time consumed by this cgroup, in nanoseconds.
    pub fn cpuacct_usage(&self) -> Result<u64> {
        self.read_value("cpuacct", "cpuacct.usage")
    }

    /// Cumulative per-logical-CPU usage in nanoseconds.
    ///
    /// Entries that are exactly zero are dropped: on hosts with
    /// `possible_cpus` padding they belong to CPUs that were never online.
    pub fn cpuacct_usage_percpu(&self) -> Result<Vec<u64>> {
        let path = self.subsystem("cpuacct")?.join("cpuacct.usage_percpu");
        let data = read_file(&path)?;
        let mut usage = Vec::new();
        for token in data.split_whitespace() {
            let v: u64 = parse_number(&path, token)?;
            if v != 0 {
                usage.push(v);
            }
        }
        Ok(usage)
    }

    /// Logical CPU indices this cgroup is pinned to, from the `cpuset.cpus`
    /// range list (e.g. `"0-2,4"`).
    pub fn cpuset_cpus(&self) -> Result<Vec<u64>> {
        let path = self.subsystem("cpuset")?.join("cpuset.cpus");
        let data = read_file(&path)?;
        parse_uint_list(&path, &data)
    }

    fn subsystem(&self, name: &str) -> Result<&Path> {
        self.subsystems
            .get(name)
            .map(PathBuf::as_path)
            .ok_or_else(|| MeterError::Subsystem(name.to_string()))
    }

    fn read_value<T: FromStr>(&self, subsystem: &str, file: &str) -> Result<T> {
        let path = self.subsystem(subsystem)?.join(file);
        let data = read_file(&path)?;
        parse_number(&path, &data)
    }
}

/// Parse `/proc/<pid>/cgroup` into a subsystem → directory mapping.
///
/// Comma-separated subsystem lists (`cpu,cpuacct`) expand into one entry
/// per name. The root path `/` maps to the bare subsystem directory.
fn parse_membership(file: &str, content: &str) -> Result<HashMap<String, PathBuf>> {
    let mut subsystems = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() != 3 {
            return Err(MeterError::Format {
                file: file.to_string(),
                reason: format!("expected 'hierarchy:subsystems:path', got '{line}'"),
            });
        }
        let dir = fields[2];
        for name in fields[1].split(',') {
            let path = if dir == "/" {
                Path::new(CGROUP_ROOT).join(name)
            } else {
                Path::new(CGROUP_ROOT)
                    .join(name)
                    .join(dir.trim_start_matches('/'))
            };
            subsystems.insert(name.to_string(), path);
        }
    }
    Ok(subsystems)
}

/// Parse a compact range list like `"0-2,4"` into `[0, 1, 2, 4]`.
/// An empty input is an empty set.
fn parse_uint_list(path: &Path, data: &str) -> Result<Vec<u64>> {
    let mut cpus = Vec::new();
    if data.is_empty() {
        return Ok(cpus);
    }
    for part in data.split(',') {
        match part.split_once('-') {
            Some((lo, hi)) => {
                let lo: u64 = parse_number(path, lo)?;
                let hi: u64 = parse_number(path, hi)?;
                if lo > hi {
                    return Err(MeterError::Format {
                        file: path.display().to_string(),
                        reason: format!("inverted range '{part}'"),
                    });
                }
                cpus.extend(lo..=hi);
            }
            None => cpus.push(parse_number(path, part)?),
        }
    }
    Ok(cpus)
}

fn read_file(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(data) => Ok(data.trim().to_string()),
        Err(source) => Err(MeterError::FileAccess {
            path: path.display().to_string(),
            source,
        }),
    }
}

fn parse_number<T: FromStr>(file: &Path, token: &str) -> Result<T> {
    token.parse().map_err(|_| MeterError::Parse {
        file: file.display().to_string(),
        token: token.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_expands_subsystem_lists() {
        let content = "8:cpuacct,cpu:/user.slice\n10:cpuset:/\n";
        let map = parse_membership("/proc/1/cgroup", content).unwrap();

        assert_eq!(
            map["cpu"],
            Path::new("/sys/fs/cgroup/cpu/user.slice").to_path_buf()
        );
        assert_eq!(
            map["cpuacct"],
            Path::new("/sys/fs/cgroup/cpuacct/user.slice").to_path_buf()
        );
        // Root path maps to the bare subsystem directory.
        assert_eq!(map["cpuset"], Path::new("/sys/fs/cgroup/cpuset").to_path_buf());
    }

    #[test]
    fn membership_rejects_malformed_lines() {
        let err = parse_membership("/proc/1/cgroup", "8:cpu\n").unwrap_err();
        assert!(matches!(err, MeterError::Format { .. }));
    }

    #[test]
    fn uint_list_ranges_and_singles() {
        let path = Path::new("cpuset.cpus");
        assert_eq!(parse_uint_list(path, "0-2,4").unwrap(), vec![0, 1, 2, 4]);
        assert_eq!(parse_uint_list(path, "3").unwrap(), vec![3]);
        assert_eq!(parse_uint_list(path, "").unwrap(), Vec::<u64>::new());
    }

    #[test]
    fn uint_list_rejects_garbage() {
        let path = Path::new("cpuset.cpus");
        assert!(matches!(
            parse_uint_list(path, "2-1").unwrap_err(),
            MeterError::Format { .. }
        ));
        assert!(matches!(
            parse_uint_list(path, "a-b").unwrap_err(),
            MeterError::Parse { .. }
        ));
    }

    #[test]
    fn percpu_usage_drops_zero_entries() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("cpuacct.usage_percpu"), "100 0 200\n").unwrap();

        let cg = Cgroup {
            subsystems: HashMap::from([("cpuacct".to_string(), dir.path().to_path_buf())]),
        };
        assert_eq!(cg.cpuacct_usage_percpu().unwrap(), vec![100, 200]);
    }

    #[test]
    fn quota_reads_signed_values() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("cpu.cfs_quota_us"), "-1\n").unwrap();
        fs::write(dir.path().join("cpu.cfs_period_us"), "100000\n").unwrap();

        let cg = Cgroup {
            subsystems: HashMap::from([("cpu".to_string(), dir.path().to_path_buf())]),
        };
        assert_eq!(cg.cfs_quota_us().unwrap(), -1);
        assert_eq!(cg.cfs_period_us().unwrap(), 100_000);
    }

    #[test]
    fn missing_subsystem_is_reported() {
        let cg = Cgroup {
            subsystems: HashMap::new(),
        };
        assert!(matches!(
            cg.cfs_quota_us().unwrap_err(),
            MeterError::Subsystem(name) if name == "cpu"
        ));
    }
}
