use crate::pipeline::PipelineOutput;
use crate::snapshot::BatterySnapshot;
use prometheus::core::Collector;
use prometheus::{opts, Counter, CounterVec, Encoder, Gauge, GaugeVec, Registry, TextEncoder};
use std::sync::Arc;

/// Point-in-time view of the most recent pipeline run.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub cpu_usage_percent: Gauge,
    pub memory_usage_percent: Gauge,
    pub swap_usage_percent: Gauge,
    pub disk_usage_percent: GaugeVec,
    pub disk_count: Gauge,
    pub battery_percent: Gauge,
    pub hardware_present: GaugeVec,
    pub pipeline_runs_total: Counter,
    pub skipped_items_total: CounterVec,
    pub report_write_errors_total: Counter,
    pub scrape_count_total: Counter,
}

impl Metrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let cpu_usage_percent = Gauge::with_opts(opts!(
            "sysreport_cpu_usage_percent",
            "Aggregate CPU usage in percent over the sampling interval"
        ))?;
        let memory_usage_percent = Gauge::with_opts(opts!(
            "sysreport_memory_usage_percent",
            "Primary memory usage in percent"
        ))?;
        let swap_usage_percent =
            Gauge::with_opts(opts!("sysreport_swap_usage_percent", "Swap usage in percent"))?;
        let disk_usage_percent = GaugeVec::new(
            opts!(
                "sysreport_disk_usage_percent",
                "Disk usage in percent by mount"
            ),
            &["mount"],
        )?;
        let disk_count = Gauge::with_opts(opts!(
            "sysreport_disk_count",
            "Number of partitions included in the last report"
        ))?;
        let battery_percent = Gauge::with_opts(opts!(
            "sysreport_battery_percent",
            "Battery charge in percent, 0 without a battery"
        ))?;
        let hardware_present = GaugeVec::new(
            opts!(
                "sysreport_hardware_present",
                "1 when the subsystem was detected, 0 otherwise"
            ),
            &["subsystem"],
        )?;
        let pipeline_runs_total = Counter::with_opts(opts!(
            "sysreport_pipeline_runs_total",
            "Number of completed collection runs"
        ))?;
        let skipped_items_total = CounterVec::new(
            opts!(
                "sysreport_skipped_items_total",
                "Items dropped because their probe failed"
            ),
            &["kind"],
        )?;
        let report_write_errors_total = Counter::with_opts(opts!(
            "sysreport_report_write_errors_total",
            "Number of failed report writes"
        ))?;
        let scrape_count_total = Counter::with_opts(opts!(
            "sysreport_scrape_count_total",
            "Number of /metrics scrapes"
        ))?;

        register(&registry, &cpu_usage_percent)?;
        register(&registry, &memory_usage_percent)?;
        register(&registry, &swap_usage_percent)?;
        register(&registry, &disk_usage_percent)?;
        register(&registry, &disk_count)?;
        register(&registry, &battery_percent)?;
        register(&registry, &hardware_present)?;
        register(&registry, &pipeline_runs_total)?;
        register(&registry, &skipped_items_total)?;
        register(&registry, &report_write_errors_total)?;
        register(&registry, &scrape_count_total)?;

        Ok(Arc::new(Self {
            registry,
            cpu_usage_percent,
            memory_usage_percent,
            swap_usage_percent,
            disk_usage_percent,
            disk_count,
            battery_percent,
            hardware_present,
            pipeline_runs_total,
            skipped_items_total,
            report_write_errors_total,
            scrape_count_total,
        }))
    }

    pub fn update_from_output(&self, output: &PipelineOutput) {
        let set = &output.snapshots;
        self.pipeline_runs_total.inc();
        self.cpu_usage_percent.set(set.cpu.total_percent as f64);
        self.memory_usage_percent
            .set(set.memory.virtual_memory.usage_percent);
        self.swap_usage_percent.set(set.memory.swap.usage_percent);

        self.disk_usage_percent.reset();
        for d in &set.disks {
            self.disk_usage_percent
                .with_label_values(&[&d.mount_point])
                .set(d.usage_percent);
        }
        self.disk_count.set(set.disks.len() as f64);

        match set.battery {
            BatterySnapshot::Present { percent, .. } => self.battery_percent.set(percent),
            BatterySnapshot::Absent => self.battery_percent.set(0.0),
        }

        for s in &output.presence.subsystems {
            self.hardware_present
                .with_label_values(&[s.subsystem.label()])
                .set(if s.present { 1.0 } else { 0.0 });
        }

        self.skipped_items_total
            .with_label_values(&["partition"])
            .inc_by(output.skipped.partitions as f64);
        self.skipped_items_total
            .with_label_values(&["process"])
            .inc_by(output.skipped.processes as f64);
    }

    pub fn inc_scrape_count(&self) {
        self.scrape_count_total.inc();
    }

    pub fn inc_report_write_error(&self) {
        self.report_write_errors_total.inc();
    }

    pub fn encode_metrics(&self) -> Result<Vec<u8>, prometheus::Error> {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        let mf = self.registry.gather();
        encoder.encode(&mf, &mut buf)?;
        Ok(buf)
    }
}

fn register<T: Collector + Clone + 'static>(
    registry: &Registry,
    collector: &T,
) -> Result<(), prometheus::Error> {
    registry.register(Box::new(collector.clone()))
}
