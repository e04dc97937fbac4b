pub mod checks;
#[cfg(test)]
pub mod fake;
pub mod system;

use crate::snapshot::{
    BatterySnapshot, CpuSnapshot, DiskSnapshot, MemorySnapshot, NetworkSnapshot, ProcessEntry,
    SnapshotSet, SystemSnapshot,
};
use std::fmt::Display;
use std::net::IpAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::debug;

pub const MIN_CPU_INTERVAL: Duration = Duration::from_secs(1);
pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("нет доступа к {0}")]
    PermissionDenied(String),
    #[error("ресурс недоступен: {0}")]
    Unavailable(String),
    #[error("не удалось разрешить имя {host}: {reason}")]
    Resolve { host: String, reason: String },
}

#[derive(Debug, Clone, Default)]
pub struct RawIdentity {
    pub os_name: Option<String>,
    pub host_name: Option<String>,
    pub kernel_release: Option<String>,
    pub kernel_version: Option<String>,
    pub machine: String,
    pub processor: Option<String>,
    pub boot_time_unix: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub device: String,
    pub mount_point: String,
    pub fs_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiskUsage {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NetCounters {
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawBattery {
    pub percent: f64,
    pub power_plugged: bool,
    /// Negative values are OS sentinels ("calculating", "unlimited").
    pub secs_left: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawProcess {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: Option<f32>,
}

/// Raw access to the host. Every method is a single OS query; policy
/// (skipping, sentinels, ordering) lives in [`Sampler`].
pub trait HostProbe {
    fn identity(&mut self) -> RawIdentity;
    /// Blocks for `interval` while measuring utilization.
    fn cpu(&mut self, interval: Duration) -> CpuSnapshot;
    fn logical_cpu_count(&mut self) -> usize;
    fn memory(&mut self) -> MemorySnapshot;
    fn partitions(&mut self) -> Vec<Partition>;
    fn disk_usage(&mut self, partition: &Partition) -> Result<DiskUsage, ProbeError>;
    fn resolve_host(&mut self, host_name: &str) -> Result<IpAddr, ProbeError>;
    fn net_counters(&mut self) -> NetCounters;
    fn battery(&mut self) -> Option<RawBattery>;
    fn process_ids(&mut self) -> Vec<u32>;
    fn process(&mut self, pid: u32) -> Result<RawProcess, ProbeError>;
    fn thermal_sensor_count(&mut self) -> usize;
    /// Interfaces carrying at least one IPv4 or IPv6 address.
    fn addressed_interface_count(&mut self) -> usize;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SkippedItems {
    pub partitions: usize,
    pub processes: usize,
}

/// Runs `probe` over every item and keeps only the successes. Returns the
/// collected values and the number of items that were dropped.
pub fn collect_successes<I, T, E, F>(items: I, kind: &str, mut probe: F) -> (Vec<T>, usize)
where
    I: IntoIterator,
    E: Display,
    F: FnMut(&I::Item) -> Result<T, E>,
{
    let mut out = Vec::new();
    let mut skipped = 0_usize;
    for item in items {
        match probe(&item) {
            Ok(value) => out.push(value),
            Err(err) => {
                skipped += 1;
                debug!(kind, error = %err, "элемент пропущен");
            }
        }
    }
    (out, skipped)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerSettings {
    pub cpu_interval: Duration,
    pub top_processes: usize,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            cpu_interval: MIN_CPU_INTERVAL,
            top_processes: 5,
        }
    }
}

pub struct Sampler<'a> {
    probe: &'a mut dyn HostProbe,
    settings: SamplerSettings,
    skipped: SkippedItems,
}

impl<'a> Sampler<'a> {
    pub fn new(probe: &'a mut dyn HostProbe, settings: SamplerSettings) -> Self {
        Self {
            probe,
            settings,
            skipped: SkippedItems::default(),
        }
    }

    pub fn skipped(&self) -> SkippedItems {
        self.skipped
    }

    /// Captures every snapshot sequentially. The CPU sample runs alone so the
    /// interval doubles as the freshness window of the aggregate figure.
    pub fn capture_all(&mut self) -> SnapshotSet {
        let system = self.capture_system_identity();
        let cpu = self.capture_cpu();
        let memory = self.capture_memory();
        let disks = self.capture_disks();
        let network = self.capture_network();
        let battery = self.capture_battery();
        let processes = self.capture_processes(self.settings.top_processes);
        SnapshotSet {
            system,
            cpu,
            memory,
            disks,
            network,
            battery,
            processes,
        }
    }

    pub fn capture_system_identity(&mut self) -> SystemSnapshot {
        self.capture_system_identity_at(now_unix())
    }

    fn capture_system_identity_at(&mut self, now_unix: u64) -> SystemSnapshot {
        let raw = self.probe.identity();
        SystemSnapshot {
            os_name: raw.os_name.unwrap_or_else(|| UNKNOWN.to_string()),
            host_name: raw.host_name.unwrap_or_else(|| UNKNOWN.to_string()),
            kernel_release: raw.kernel_release.unwrap_or_else(|| UNKNOWN.to_string()),
            kernel_version: raw.kernel_version.unwrap_or_else(|| UNKNOWN.to_string()),
            machine: raw.machine,
            processor: raw.processor.unwrap_or_else(|| UNKNOWN.to_string()),
            boot_time_unix: raw.boot_time_unix,
            uptime_seconds: now_unix.saturating_sub(raw.boot_time_unix),
        }
    }

    pub fn capture_cpu(&mut self) -> CpuSnapshot {
        let interval = self.settings.cpu_interval.max(MIN_CPU_INTERVAL);
        self.probe.cpu(interval)
    }

    pub fn capture_memory(&mut self) -> MemorySnapshot {
        self.probe.memory()
    }

    pub fn capture_disks(&mut self) -> Vec<DiskSnapshot> {
        let partitions = self.probe.partitions();
        let probe = &mut *self.probe;
        let (disks, skipped) = collect_successes(partitions, "partition", |p| {
            probe.disk_usage(p).map(|usage| disk_snapshot(p, usage))
        });
        self.skipped.partitions += skipped;
        disks
    }

    pub fn capture_network(&mut self) -> NetworkSnapshot {
        let host_name = self
            .probe
            .identity()
            .host_name
            .unwrap_or_else(|| UNKNOWN.to_string());
        let ip_address = match self.probe.resolve_host(&host_name) {
            Ok(ip) => Some(ip),
            Err(err) => {
                debug!(host = %host_name, error = %err, "адрес хоста недоступен");
                None
            }
        };
        let counters = self.probe.net_counters();
        NetworkSnapshot {
            host_name,
            ip_address,
            bytes_sent: counters.bytes_sent,
            bytes_received: counters.bytes_received,
        }
    }

    pub fn capture_battery(&mut self) -> BatterySnapshot {
        match self.probe.battery() {
            None => BatterySnapshot::Absent,
            Some(raw) => BatterySnapshot::Present {
                percent: raw.percent,
                plugged_in: raw.power_plugged,
                minutes_left: (raw.secs_left > 0).then(|| raw.secs_left as u64 / 60),
            },
        }
    }

    pub fn capture_processes(&mut self, n: usize) -> Vec<ProcessEntry> {
        let pids = self.probe.process_ids();
        let probe = &mut *self.probe;
        let (processes, skipped) = collect_successes(pids, "process", |pid| probe.process(*pid));
        self.skipped.processes += skipped;
        top_processes(processes, n)
    }
}

/// Stable descending sort by CPU percent, so equal entries keep their
/// enumeration order. An unset percentage sorts as zero.
pub fn top_processes(processes: Vec<RawProcess>, n: usize) -> Vec<ProcessEntry> {
    let mut entries: Vec<ProcessEntry> = processes
        .into_iter()
        .map(|p| ProcessEntry {
            pid: p.pid,
            name: p.name,
            cpu_percent: p.cpu_percent.unwrap_or(0.0),
        })
        .collect();
    entries.sort_by(|a, b| b.cpu_percent.total_cmp(&a.cpu_percent));
    entries.truncate(n);
    entries
}

fn disk_snapshot(partition: &Partition, usage: DiskUsage) -> DiskSnapshot {
    let usage_percent = if usage.total_bytes > 0 {
        let pct = usage.used_bytes as f64 / usage.total_bytes as f64 * 100.0;
        (pct * 10.0).round() / 10.0
    } else {
        0.0
    };
    DiskSnapshot {
        device: partition.device.clone(),
        mount_point: partition.mount_point.clone(),
        fs_type: partition.fs_type.clone(),
        total_bytes: usage.total_bytes,
        used_bytes: usage.used_bytes,
        free_bytes: usage.free_bytes,
        usage_percent,
    }
}

pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
