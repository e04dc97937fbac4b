use crate::collectors::{
    DiskUsage, HostProbe, NetCounters, Partition, ProbeError, RawBattery, RawIdentity,
    RawProcess,
};
use crate::snapshot::{CpuSnapshot, MemorySnapshot, MemoryStat};
#[cfg(any(unix, test))]
use std::collections::HashSet;
#[cfg(target_os = "linux")]
use std::fs;
use std::net::{IpAddr, ToSocketAddrs};
#[cfg(target_os = "linux")]
use std::path::Path;
use std::thread;
use std::time::Duration;
use sysinfo::{
    ComponentExt, CpuExt, DiskExt, NetworkExt, NetworksExt, Pid, PidExt, ProcessExt, System,
    SystemExt,
};
use tracing::debug;

/// Production probe. One instance is created per pipeline run, so CPU deltas
/// never leak between requests.
pub struct SysinfoProbe {
    system: System,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl HostProbe for SysinfoProbe {
    fn identity(&mut self) -> RawIdentity {
        self.system.refresh_cpu();
        let kernel_version = read_kernel_build().or_else(|| self.system.long_os_version());
        RawIdentity {
            os_name: self.system.name(),
            host_name: self.system.host_name(),
            kernel_release: self.system.kernel_version(),
            kernel_version,
            machine: std::env::consts::ARCH.to_string(),
            processor: self
                .system
                .cpus()
                .first()
                .map(|c| c.brand().trim().to_string())
                .filter(|b| !b.is_empty()),
            boot_time_unix: self.system.boot_time(),
        }
    }

    fn cpu(&mut self, interval: Duration) -> CpuSnapshot {
        self.system.refresh_cpu();
        thread::sleep(interval.max(System::MINIMUM_CPU_UPDATE_INTERVAL));
        self.system.refresh_cpu();

        let per_core_percent: Vec<f32> = self.system.cpus().iter().map(|c| c.cpu_usage()).collect();
        CpuSnapshot {
            physical_cores: self.system.physical_core_count(),
            logical_cores: per_core_percent.len(),
            total_percent: self.system.global_cpu_info().cpu_usage(),
            per_core_percent,
        }
    }

    fn logical_cpu_count(&mut self) -> usize {
        self.system.refresh_cpu();
        self.system.cpus().len()
    }

    fn memory(&mut self) -> MemorySnapshot {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        let available = self.system.available_memory();
        let swap_total = self.system.total_swap();
        let swap_used = self.system.used_swap();

        MemorySnapshot {
            virtual_memory: MemoryStat {
                total_bytes: total,
                available_bytes: Some(available),
                used_bytes: self.system.used_memory(),
                free_bytes: self.system.free_memory(),
                // Reclaimable cache counts as available, as the kernel reports it.
                usage_percent: percent(total.saturating_sub(available), total),
            },
            swap: MemoryStat {
                total_bytes: swap_total,
                available_bytes: None,
                used_bytes: swap_used,
                free_bytes: self.system.free_swap(),
                usage_percent: percent(swap_used, swap_total),
            },
        }
    }

    fn partitions(&mut self) -> Vec<Partition> {
        self.system.refresh_disks_list();
        self.system
            .disks()
            .iter()
            .map(|d| Partition {
                device: d.name().to_string_lossy().to_string(),
                mount_point: d.mount_point().to_string_lossy().to_string(),
                fs_type: String::from_utf8_lossy(d.file_system()).to_string(),
            })
            .collect()
    }

    fn disk_usage(&mut self, partition: &Partition) -> Result<DiskUsage, ProbeError> {
        let disk = self
            .system
            .disks_mut()
            .iter_mut()
            .find(|d| d.mount_point().to_string_lossy() == partition.mount_point.as_str())
            .ok_or_else(|| ProbeError::Unavailable(partition.mount_point.clone()))?;

        if !disk.refresh() {
            return Err(ProbeError::PermissionDenied(partition.mount_point.clone()));
        }
        let total = disk.total_space();
        if total == 0 {
            return Err(ProbeError::Unavailable(partition.mount_point.clone()));
        }
        let free = disk.available_space();
        Ok(DiskUsage {
            total_bytes: total,
            used_bytes: total.saturating_sub(free),
            free_bytes: free,
        })
    }

    fn resolve_host(&mut self, host_name: &str) -> Result<IpAddr, ProbeError> {
        let resolve_err = |reason: String| ProbeError::Resolve {
            host: host_name.to_string(),
            reason,
        };
        let addrs: Vec<IpAddr> = (host_name, 0)
            .to_socket_addrs()
            .map_err(|err| resolve_err(err.to_string()))?
            .map(|a| a.ip())
            .collect();
        addrs
            .iter()
            .find(|ip| ip.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| resolve_err("пустой ответ".to_string()))
    }

    fn net_counters(&mut self) -> NetCounters {
        self.system.refresh_networks_list();
        self.system
            .networks()
            .iter()
            .fold(NetCounters::default(), |acc, (_, data)| NetCounters {
                bytes_sent: acc.bytes_sent.saturating_add(data.total_transmitted()),
                bytes_received: acc.bytes_received.saturating_add(data.total_received()),
            })
    }

    fn battery(&mut self) -> Option<RawBattery> {
        read_battery()
    }

    /// Refreshes the process table twice, one minimum CPU update interval
    /// apart, so per-process CPU usage covers that window.
    fn process_ids(&mut self) -> Vec<u32> {
        self.system.refresh_processes();
        thread::sleep(System::MINIMUM_CPU_UPDATE_INTERVAL);
        self.system.refresh_processes();

        let mut pids: Vec<u32> = self.system.processes().keys().map(|p| p.as_u32()).collect();
        pids.sort_unstable();
        pids
    }

    fn process(&mut self, pid: u32) -> Result<RawProcess, ProbeError> {
        let process = self
            .system
            .process(Pid::from_u32(pid))
            .ok_or_else(|| ProbeError::Unavailable(format!("процесс {pid}")))?;
        Ok(RawProcess {
            pid,
            name: process.name().to_string(),
            cpu_percent: Some(process.cpu_usage()),
        })
    }

    fn thermal_sensor_count(&mut self) -> usize {
        self.system.refresh_components_list();
        let components =
            count_readings(self.system.components().iter().map(|c| c.temperature()));
        let zones = count_linux_thermal_zones();
        debug!(
            sysinfo_components = components,
            thermal_zones = zones,
            "датчики температуры по источникам"
        );
        components + zones
    }

    fn addressed_interface_count(&mut self) -> usize {
        interface_count(&mut self.system)
    }
}

/// Any value a sensor reports, zero included, is a reading. NaN is what an
/// unreadable sensor yields.
fn count_readings(temps: impl IntoIterator<Item = f32>) -> usize {
    temps.into_iter().filter(|t| !t.is_nan()).count()
}

#[cfg(unix)]
fn interface_count(_system: &mut System) -> usize {
    count_addressed_interfaces(interface_addresses())
}

/// No address enumeration here; every listed interface counts.
#[cfg(not(unix))]
fn interface_count(system: &mut System) -> usize {
    system.refresh_networks_list();
    system.networks().iter().count()
}

/// One entry per `getifaddrs` record: interface name and whether the record
/// holds an IPv4/IPv6 address. Link-layer records report `false`.
#[cfg(unix)]
fn interface_addresses() -> Vec<(String, bool)> {
    match nix::ifaddrs::getifaddrs() {
        Ok(addrs) => addrs
            .map(|ifa| {
                let has_ip = ifa.address.as_ref().is_some_and(|addr| {
                    addr.as_sockaddr_in().is_some() || addr.as_sockaddr_in6().is_some()
                });
                (ifa.interface_name, has_ip)
            })
            .collect(),
        Err(err) => {
            debug!(error = %err, "не удалось получить адреса интерфейсов");
            Vec::new()
        }
    }
}

#[cfg(any(unix, test))]
fn count_addressed_interfaces(entries: impl IntoIterator<Item = (String, bool)>) -> usize {
    entries
        .into_iter()
        .filter(|(_, has_ip)| *has_ip)
        .map(|(name, _)| name)
        .collect::<HashSet<_>>()
        .len()
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = part as f64 / total as f64 * 100.0;
    (pct * 10.0).round() / 10.0
}

#[cfg(target_os = "linux")]
fn read_kernel_build() -> Option<String> {
    fs::read_to_string("/proc/sys/kernel/version")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(not(target_os = "linux"))]
fn read_kernel_build() -> Option<String> {
    None
}

#[cfg(target_os = "linux")]
fn count_linux_thermal_zones() -> usize {
    let Ok(entries) = fs::read_dir("/sys/class/thermal") else {
        return 0;
    };

    entries
        .flatten()
        .filter(|entry| {
            let path = entry.path();
            let is_zone = path
                .file_name()
                .and_then(|v| v.to_str())
                .is_some_and(|name| name.starts_with("thermal_zone"));
            is_zone && read_trimmed(&path.join("temp")).and_then(|v| v.parse::<f64>().ok()).is_some()
        })
        .count()
}

#[cfg(not(target_os = "linux"))]
fn count_linux_thermal_zones() -> usize {
    0
}

#[cfg(target_os = "linux")]
fn read_battery() -> Option<RawBattery> {
    let entries = fs::read_dir("/sys/class/power_supply").ok()?;

    let mut ac_online = None;
    let mut battery_dir = None;
    for entry in entries.flatten() {
        let path = entry.path();
        match read_trimmed(&path.join("type")).as_deref() {
            Some("Battery") if battery_dir.is_none() => {
                if read_trimmed(&path.join("present")).as_deref() != Some("0") {
                    battery_dir = Some(path);
                }
            }
            Some("Mains") => {
                if let Some(online) = read_trimmed(&path.join("online")) {
                    ac_online = Some(online == "1");
                }
            }
            _ => {}
        }
    }

    let dir = battery_dir?;
    let percent = read_trimmed(&dir.join("capacity"))?.parse::<f64>().ok()?;
    let status = read_trimmed(&dir.join("status")).unwrap_or_default();
    let power_plugged = ac_online.unwrap_or(status != "Discharging");
    let secs_left = if power_plugged {
        SECS_LEFT_UNLIMITED
    } else {
        battery_secs_left(&dir).unwrap_or(SECS_LEFT_UNKNOWN)
    };

    Some(RawBattery {
        percent,
        power_plugged,
        secs_left,
    })
}

#[cfg(not(target_os = "linux"))]
fn read_battery() -> Option<RawBattery> {
    None
}

#[cfg(target_os = "linux")]
const SECS_LEFT_UNKNOWN: i64 = -1;
#[cfg(target_os = "linux")]
const SECS_LEFT_UNLIMITED: i64 = -2;

/// Remaining seconds from energy (µWh / µW) or charge (µAh / µA) counters.
#[cfg(target_os = "linux")]
fn battery_secs_left(dir: &Path) -> Option<i64> {
    let read_u64 = |name: &str| read_trimmed(&dir.join(name))?.parse::<u64>().ok();
    let (level, rate) = match (read_u64("energy_now"), read_u64("power_now")) {
        (Some(level), Some(rate)) => (level, rate),
        _ => (read_u64("charge_now")?, read_u64("current_now")?),
    };
    if rate == 0 {
        return None;
    }
    Some((level as f64 / rate as f64 * 3600.0) as i64)
}

#[cfg(target_os = "linux")]
fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}
