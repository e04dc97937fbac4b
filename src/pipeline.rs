use crate::collectors::checks::check_presence;
use crate::collectors::{HostProbe, Sampler, SamplerSettings, SkippedItems};
use crate::report::{format_report, ReportError, ReportWriter};
use crate::snapshot::{HardwarePresence, SnapshotSet};
use std::time::Instant;
use tracing::{error, info};

#[derive(Debug, Clone, serde::Serialize)]
pub struct PipelineOutput {
    pub snapshots: SnapshotSet,
    pub presence: HardwarePresence,
    #[serde(skip)]
    pub skipped: SkippedItems,
}

/// Sampler -> presence check -> report. Runs synchronously; the caller
/// decides which thread blocks on the CPU interval.
pub fn run_pipeline(
    probe: &mut dyn HostProbe,
    settings: SamplerSettings,
    writer: &ReportWriter,
) -> Result<PipelineOutput, ReportError> {
    let started = Instant::now();

    let mut sampler = Sampler::new(probe, settings);
    let snapshots = sampler.capture_all();
    let skipped = sampler.skipped();

    let presence = check_presence(probe);

    let document = format_report(&snapshots);
    if let Err(err) = writer.write(&document) {
        error!(error = %err, "не удалось сохранить отчёт");
        return Err(err);
    }

    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        disks = snapshots.disks.len(),
        processes = snapshots.processes.len(),
        skipped_partitions = skipped.partitions,
        skipped_processes = skipped.processes,
        working = presence.working_count(),
        not_detected = presence.not_detected_count(),
        report = %writer.path().display(),
        "отчёт сформирован"
    );

    Ok(PipelineOutput {
        snapshots,
        presence,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::fake::FakeProbe;
    use std::fs;

    #[test]
    fn pipeline_writes_report_and_counts_skips() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path().join("system_report.txt"));
        let mut probe = FakeProbe::default();
        probe.fail_usage_for("/mnt/secret");
        probe.vanished_pids = vec![77];

        let output = run_pipeline(&mut probe, SamplerSettings::default(), &writer).unwrap();

        assert_eq!(output.snapshots.disks.len(), 2);
        assert_eq!(output.skipped.partitions, 1);
        assert_eq!(output.skipped.processes, 1);
        assert_eq!(output.presence.working_count(), 6);

        let written = fs::read_to_string(writer.path()).unwrap();
        assert_eq!(written, format_report(&output.snapshots));
        assert_eq!(written.matches("Device: ").count(), 2);
    }

    #[test]
    fn pipeline_propagates_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path().join("nope").join("report.txt"));
        let mut probe = FakeProbe::default();

        let result = run_pipeline(&mut probe, SamplerSettings::default(), &writer);

        assert!(matches!(result, Err(ReportError::Write { .. })));
    }
}
