use crate::collectors::HostProbe;
use crate::snapshot::{HardwarePresence, Subsystem};
use tracing::debug;

/// Probes each subsystem on its own rather than reusing the main snapshots,
/// so the flags may reflect a slightly later instant than the report.
pub fn check_presence(probe: &mut dyn HostProbe) -> HardwarePresence {
    let presence = HardwarePresence::from_flags(
        Subsystem::ALL.map(|subsystem| (subsystem, probe_subsystem(probe, subsystem))),
    );
    debug!(
        working = presence.working_count(),
        not_detected = presence.not_detected_count(),
        "проверка оборудования завершена"
    );
    presence
}

fn probe_subsystem(probe: &mut dyn HostProbe, subsystem: Subsystem) -> bool {
    match subsystem {
        Subsystem::Cpu => probe.logical_cpu_count() > 0,
        Subsystem::Memory => probe.memory().virtual_memory.total_bytes > 0,
        Subsystem::Disk => !probe.partitions().is_empty(),
        Subsystem::Battery => probe.battery().is_some(),
        Subsystem::Temperature => probe.thermal_sensor_count() > 0,
        Subsystem::Network => probe.addressed_interface_count() > 0,
    }
}
