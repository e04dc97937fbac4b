use crate::snapshot::{BatterySnapshot, MemoryStat, SnapshotSet};
use chrono::{DateTime, Local, TimeZone};
use std::fmt::Display;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

pub const UNAVAILABLE: &str = "Unavailable";
pub const NOT_APPLICABLE: &str = "N/A";
pub const NO_BATTERY: &str = "Battery not available";

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("не удалось записать отчёт {path}: {source}")]
    Write { path: String, source: io::Error },
}

pub fn format_gib(bytes: u64) -> String {
    format!("{:.2} GB", bytes as f64 / GIB)
}

pub fn format_mib(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / MIB)
}

/// `H:MM:SS`, prefixed with `N day(s), ` once a full day has passed.
pub fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let rem = seconds % 86_400;
    let clock = format!("{}:{:02}:{:02}", rem / 3600, (rem % 3600) / 60, rem % 60);
    match days {
        0 => clock,
        1 => format!("1 day, {clock}"),
        n => format!("{n} days, {clock}"),
    }
}

/// Local-time ctime layout, e.g. `Tue Nov 14 22:13:20 2023`.
pub fn format_boot_time(boot_time_unix: u64) -> String {
    i64::try_from(boot_time_unix)
        .ok()
        .and_then(|secs| Local.timestamp_opt(secs, 0).earliest())
        .map_or_else(|| crate::collectors::UNKNOWN.to_string(), format_ctime)
}

pub fn format_ctime<Tz: TimeZone>(ts: DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    ts.format("%a %b %e %H:%M:%S %Y").to_string()
}

pub fn format_physical_cores(cores: Option<usize>) -> String {
    cores.map_or_else(|| crate::collectors::UNKNOWN.to_string(), |n| n.to_string())
}

pub fn format_ip(ip: Option<std::net::IpAddr>) -> String {
    ip.map_or_else(|| UNAVAILABLE.to_string(), |ip| ip.to_string())
}

pub fn format_flag(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// Label/value pairs shared by the report and the dashboard, in report order.
pub fn system_fields(set: &SnapshotSet) -> Vec<(&'static str, String)> {
    let s = &set.system;
    vec![
        ("System", s.os_name.clone()),
        ("Node Name", s.host_name.clone()),
        ("Release", s.kernel_release.clone()),
        ("Version", s.kernel_version.clone()),
        ("Machine", s.machine.clone()),
        ("Processor", s.processor.clone()),
        ("Boot Time", format_boot_time(s.boot_time_unix)),
        ("Uptime", format_uptime(s.uptime_seconds)),
    ]
}

pub fn memory_fields(stat: &MemoryStat) -> Vec<(&'static str, String)> {
    let mut fields = vec![("Total", format_gib(stat.total_bytes))];
    if let Some(available) = stat.available_bytes {
        fields.push(("Available", format_gib(available)));
    }
    fields.push(("Used", format_gib(stat.used_bytes)));
    fields.push(("Free", format_gib(stat.free_bytes)));
    fields.push(("Usage %", format!("{:.1}", stat.usage_percent)));
    fields
}

pub fn network_fields(set: &SnapshotSet) -> Vec<(&'static str, String)> {
    let n = &set.network;
    vec![
        ("Hostname", n.host_name.clone()),
        ("IP Address", format_ip(n.ip_address)),
        ("Bytes Sent", format_mib(n.bytes_sent)),
        ("Bytes Received", format_mib(n.bytes_received)),
    ]
}

pub fn battery_fields(battery: &BatterySnapshot) -> Vec<(&'static str, String)> {
    match battery {
        BatterySnapshot::Absent => vec![("Status", NO_BATTERY.to_string())],
        BatterySnapshot::Present {
            percent,
            plugged_in,
            minutes_left,
        } => vec![
            ("Percent", format!("{percent:.0}%")),
            ("Plugged In", format_flag(*plugged_in).to_string()),
            (
                "Time Left (min)",
                minutes_left.map_or_else(|| NOT_APPLICABLE.to_string(), |m| m.to_string()),
            ),
        ],
    }
}

/// Renders the canonical text report. Identical input yields identical bytes.
pub fn format_report(set: &SnapshotSet) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_sections(&mut out, set);
    out
}

fn write_sections(out: &mut String, set: &SnapshotSet) -> std::fmt::Result {
    out.push_str("===== SYSTEM REPORT =====\n\n");
    for (k, v) in system_fields(set) {
        writeln!(out, "{k}: {v}")?;
    }

    out.push_str("\n===== CPU INFO =====\n");
    writeln!(
        out,
        "Physical Cores: {}",
        format_physical_cores(set.cpu.physical_cores)
    )?;
    writeln!(out, "Logical CPUs: {}", set.cpu.logical_cores)?;
    for (i, pct) in set.cpu.per_core_percent.iter().enumerate() {
        writeln!(out, "Core {i}: {pct:.1}%")?;
    }
    writeln!(out, "Total CPU Usage: {:.1}", set.cpu.total_percent)?;

    out.push_str("\n===== MEMORY INFO =====\n");
    for (section, stat) in [("Virtual", &set.memory.virtual_memory), ("Swap", &set.memory.swap)] {
        writeln!(out, "{section} Memory:")?;
        for (k, v) in memory_fields(stat) {
            writeln!(out, "  {k}: {v}")?;
        }
    }

    out.push_str("\n===== DISK INFO =====\n");
    for d in &set.disks {
        writeln!(out, "Device: {}", d.device)?;
        writeln!(out, "Mount: {}", d.mount_point)?;
        writeln!(out, "FS: {}", d.fs_type)?;
        writeln!(out, "Total: {}", format_gib(d.total_bytes))?;
        writeln!(out, "Used: {}", format_gib(d.used_bytes))?;
        writeln!(out, "Free: {}", format_gib(d.free_bytes))?;
        writeln!(out, "Usage: {:.1}%", d.usage_percent)?;
        out.push('\n');
    }

    out.push_str("===== NETWORK INFO =====\n");
    for (k, v) in network_fields(set) {
        writeln!(out, "{k}: {v}")?;
    }

    out.push_str("\n===== BATTERY INFO =====\n");
    for (k, v) in battery_fields(&set.battery) {
        writeln!(out, "{k}: {v}")?;
    }

    out.push_str("\n===== TOP PROCESSES =====\n");
    for p in &set.processes {
        writeln!(out, "{} (PID: {}) - {:.1}%", p.name, p.pid, p.cpu_percent)?;
    }
    Ok(())
}

/// Writes `document` to a sibling temp file and renames it over `path`, so a
/// concurrent reader sees either the old or the new report.
pub fn write_report(document: &str, path: &Path) -> Result<(), ReportError> {
    let to_err = |source| ReportError::Write {
        path: path.display().to_string(),
        source,
    };
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, document).map_err(to_err)?;
    fs::rename(&tmp, path).map_err(to_err)
}

/// Single-writer gate around the report file.
#[derive(Debug)]
pub struct ReportWriter {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ReportWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, document: &str) -> Result<(), ReportError> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        write_report(document, &self.path)
    }
}
