use serde::Serialize;
use std::fmt;
use std::net::IpAddr;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemSnapshot {
    pub os_name: String,
    pub host_name: String,
    pub kernel_release: String,
    pub kernel_version: String,
    pub machine: String,
    pub processor: String,
    pub boot_time_unix: u64,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CpuSnapshot {
    pub physical_cores: Option<usize>,
    pub logical_cores: usize,
    pub per_core_percent: Vec<f32>,
    pub total_percent: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryStat {
    pub total_bytes: u64,
    /// Only primary memory reports an "available" figure.
    pub available_bytes: Option<u64>,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub usage_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemorySnapshot {
    pub virtual_memory: MemoryStat,
    pub swap: MemoryStat,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiskSnapshot {
    pub device: String,
    pub mount_point: String,
    pub fs_type: String,
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub usage_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkSnapshot {
    pub host_name: String,
    /// `None` when the host name could not be resolved.
    pub ip_address: Option<IpAddr>,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatterySnapshot {
    Absent,
    Present {
        percent: f64,
        plugged_in: bool,
        /// `None` while the OS estimate is unknown (calculating, on AC).
        minutes_left: Option<u64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f32,
}

/// Everything one pipeline run captured, in report order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotSet {
    pub system: SystemSnapshot,
    pub cpu: CpuSnapshot,
    pub memory: MemorySnapshot,
    pub disks: Vec<DiskSnapshot>,
    pub network: NetworkSnapshot,
    pub battery: BatterySnapshot,
    pub processes: Vec<ProcessEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Subsystem {
    Cpu,
    Memory,
    Disk,
    Battery,
    Temperature,
    Network,
}

impl Subsystem {
    pub const ALL: [Subsystem; 6] = [
        Subsystem::Cpu,
        Subsystem::Memory,
        Subsystem::Disk,
        Subsystem::Battery,
        Subsystem::Temperature,
        Subsystem::Network,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Subsystem::Cpu => "CPU",
            Subsystem::Memory => "Memory",
            Subsystem::Disk => "Disk",
            Subsystem::Battery => "Battery",
            Subsystem::Temperature => "Temperature",
            Subsystem::Network => "Network",
        }
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubsystemPresence {
    pub subsystem: Subsystem,
    pub present: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HardwarePresence {
    pub subsystems: Vec<SubsystemPresence>,
}

impl HardwarePresence {
    pub fn from_flags(flags: impl IntoIterator<Item = (Subsystem, bool)>) -> Self {
        Self {
            subsystems: flags
                .into_iter()
                .map(|(subsystem, present)| SubsystemPresence { subsystem, present })
                .collect(),
        }
    }

    #[cfg(test)]
    pub fn is_present(&self, subsystem: Subsystem) -> bool {
        self.subsystems
            .iter()
            .any(|s| s.subsystem == subsystem && s.present)
    }

    pub fn working_count(&self) -> usize {
        self.subsystems.iter().filter(|s| s.present).count()
    }

    pub fn not_detected_count(&self) -> usize {
        self.subsystems.len() - self.working_count()
    }
}
