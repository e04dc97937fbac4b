//! Scripted probe used by unit tests across the crate.

use super::{
    DiskUsage, HostProbe, NetCounters, Partition, ProbeError, RawBattery, RawIdentity,
    RawProcess,
};
use crate::snapshot::{CpuSnapshot, MemorySnapshot, MemoryStat};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

const GIB: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct FakeProbe {
    pub identity: RawIdentity,
    pub cpu: CpuSnapshot,
    pub memory: MemorySnapshot,
    pub partitions: Vec<Partition>,
    pub failing_mounts: Vec<String>,
    pub resolvable: bool,
    pub net: NetCounters,
    pub battery: Option<RawBattery>,
    pub processes: Vec<RawProcess>,
    pub vanished_pids: Vec<u32>,
    pub thermal_sensors: usize,
    pub addressed_interfaces: usize,
    pub cpu_intervals: Vec<Duration>,
}

impl Default for FakeProbe {
    fn default() -> Self {
        Self {
            identity: RawIdentity {
                os_name: Some("Linux".to_string()),
                host_name: Some("testhost".to_string()),
                kernel_release: Some("6.1.0-test".to_string()),
                kernel_version: Some("#1 SMP PREEMPT_DYNAMIC".to_string()),
                machine: "x86_64".to_string(),
                processor: Some("Test CPU @ 3.00GHz".to_string()),
                boot_time_unix: 1_700_000_000,
            },
            cpu: CpuSnapshot {
                physical_cores: Some(2),
                logical_cores: 4,
                per_core_percent: vec![12.5, 3.0, 0.0, 47.3],
                total_percent: 15.7,
            },
            memory: MemorySnapshot {
                virtual_memory: MemoryStat {
                    total_bytes: 16 * GIB,
                    available_bytes: Some(10 * GIB),
                    used_bytes: 5 * GIB,
                    free_bytes: 2 * GIB,
                    usage_percent: 37.5,
                },
                swap: MemoryStat {
                    total_bytes: 2 * GIB,
                    available_bytes: None,
                    used_bytes: 0,
                    free_bytes: 2 * GIB,
                    usage_percent: 0.0,
                },
            },
            partitions: vec![
                partition("/dev/sda1", "/", "ext4"),
                partition("/dev/sda2", "/home", "ext4"),
                partition("/dev/sdb1", "/mnt/secret", "xfs"),
            ],
            failing_mounts: Vec::new(),
            resolvable: true,
            net: NetCounters {
                bytes_sent: 3 * 1024 * 1024,
                bytes_received: 5 * 1024 * 1024 + 512 * 1024,
            },
            battery: Some(RawBattery {
                percent: 80.0,
                power_plugged: true,
                secs_left: -1,
            }),
            processes: vec![
                process(1, "init", 0.0),
                process(42, "postgres", 12.5),
                process(77, "cargo", 3.4),
            ],
            vanished_pids: Vec::new(),
            thermal_sensors: 2,
            addressed_interfaces: 2,
            cpu_intervals: Vec::new(),
        }
    }
}

impl FakeProbe {
    /// Processes get pids 100, 101, ... in the given order.
    pub fn with_process_cpu(cpu: &[f32]) -> Self {
        let processes = cpu
            .iter()
            .enumerate()
            .map(|(i, pct)| process(100 + i as u32, &format!("proc-{i}"), *pct))
            .collect();
        Self {
            processes,
            ..Self::default()
        }
    }

    pub fn fail_usage_for(&mut self, mount: &str) {
        self.failing_mounts.push(mount.to_string());
    }

    /// A host with nothing detectable.
    pub fn empty() -> Self {
        let mut probe = Self::default();
        probe.cpu = CpuSnapshot {
            physical_cores: None,
            logical_cores: 0,
            per_core_percent: Vec::new(),
            total_percent: 0.0,
        };
        probe.memory.virtual_memory.total_bytes = 0;
        probe.partitions.clear();
        probe.battery = None;
        probe.thermal_sensors = 0;
        probe.addressed_interfaces = 0;
        probe
    }
}

impl HostProbe for FakeProbe {
    fn identity(&mut self) -> RawIdentity {
        self.identity.clone()
    }

    fn cpu(&mut self, interval: Duration) -> CpuSnapshot {
        self.cpu_intervals.push(interval);
        self.cpu.clone()
    }

    fn logical_cpu_count(&mut self) -> usize {
        self.cpu.logical_cores
    }

    fn memory(&mut self) -> MemorySnapshot {
        self.memory.clone()
    }

    fn partitions(&mut self) -> Vec<Partition> {
        self.partitions.clone()
    }

    fn disk_usage(&mut self, partition: &Partition) -> Result<DiskUsage, ProbeError> {
        if self.failing_mounts.contains(&partition.mount_point) {
            return Err(ProbeError::PermissionDenied(partition.mount_point.clone()));
        }
        Ok(DiskUsage {
            total_bytes: 100 * GIB,
            used_bytes: 25 * GIB,
            free_bytes: 75 * GIB,
        })
    }

    fn resolve_host(&mut self, host_name: &str) -> Result<IpAddr, ProbeError> {
        if self.resolvable {
            Ok(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)))
        } else {
            Err(ProbeError::Resolve {
                host: host_name.to_string(),
                reason: "name service unavailable".to_string(),
            })
        }
    }

    fn net_counters(&mut self) -> NetCounters {
        self.net
    }

    fn battery(&mut self) -> Option<RawBattery> {
        self.battery
    }

    fn process_ids(&mut self) -> Vec<u32> {
        self.processes.iter().map(|p| p.pid).collect()
    }

    fn process(&mut self, pid: u32) -> Result<RawProcess, ProbeError> {
        if self.vanished_pids.contains(&pid) {
            return Err(ProbeError::Unavailable(format!("процесс {pid}")));
        }
        self.processes
            .iter()
            .find(|p| p.pid == pid)
            .cloned()
            .ok_or_else(|| ProbeError::Unavailable(format!("процесс {pid}")))
    }

    fn thermal_sensor_count(&mut self) -> usize {
        self.thermal_sensors
    }

    fn addressed_interface_count(&mut self) -> usize {
        self.addressed_interfaces
    }
}

fn partition(device: &str, mount: &str, fs: &str) -> Partition {
    Partition {
        device: device.to_string(),
        mount_point: mount.to_string(),
        fs_type: fs.to_string(),
    }
}

fn process(pid: u32, name: &str, cpu: f32) -> RawProcess {
    RawProcess {
        pid,
        name: name.to_string(),
        cpu_percent: Some(cpu),
    }
}
