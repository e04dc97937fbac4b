use crate::pipeline::PipelineOutput;
use crate::report::{
    battery_fields, format_gib, format_physical_cores, memory_fields, network_fields,
    system_fields,
};
use std::fmt::Write as _;

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; background: #f9fafb; color: #111827; margin: 0; }
.hardware-bar { background: #edf2f7; padding: 0.75rem 1rem; display: flex; flex-wrap: wrap;
  justify-content: center; gap: 1rem; font-weight: 600; }
.hardware-status { padding: 0.4rem 0.8rem; border-radius: 6px; }
.ok { background-color: #d1fae5; color: #065f46; }
.fail { background-color: #fee2e2; color: #991b1b; }
main { max-width: 80rem; margin: 0 auto; padding: 1.5rem 1rem; }
h1 { text-align: center; color: #1e40af; }
.actions { display: flex; justify-content: center; gap: 1rem; margin-bottom: 1.5rem; }
.actions a { background: #2563eb; color: #fff; padding: 0.5rem 1rem; border-radius: 6px;
  text-decoration: none; font-weight: 600; }
.grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(20rem, 1fr)); gap: 1.5rem;
  margin-bottom: 1.5rem; }
.card { background: #fff; border: 1px solid #e5e7eb; border-radius: 0.75rem; padding: 1rem; }
.card h2 { font-size: 1.1rem; margin-top: 0; }
.card ul { list-style: none; padding: 0; margin: 0; font-size: 0.9rem; }
.disk { border: 1px solid #e5e7eb; border-radius: 6px; padding: 0.5rem; }
.na { color: #6b7280; font-style: italic; }
"#;

/// Full dashboard page for one pipeline run. Every section renders, with a
/// "not available" placeholder when it has nothing to show.
pub fn render_dashboard(output: &PipelineOutput, refresh_secs: u64) -> String {
    let set = &output.snapshots;
    let mut html = String::with_capacity(16 * 1024);

    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>System Report Dashboard</title>\n\
         <meta http-equiv=\"refresh\" content=\"{refresh_secs}\">\n\
         <style>{STYLE}</style>\n</head>\n<body>\n"
    );

    html.push_str("<div class=\"hardware-bar\">\n");
    for s in &output.presence.subsystems {
        let (class, label) = if s.present {
            ("ok", "Working")
        } else {
            ("fail", "Not Detected")
        };
        let _ = writeln!(
            html,
            "<div class=\"hardware-status {class}\">{}: {label}</div>",
            s.subsystem
        );
    }
    html.push_str("</div>\n<main>\n<h1>System Report Dashboard</h1>\n");
    html.push_str(
        "<div class=\"actions\">\
         <a href=\"/download_report\">Download Report</a>\
         <a href=\"/download_logs\">Download Logs</a></div>\n",
    );

    html.push_str("<div class=\"grid\">\n");
    card_list(&mut html, "System Info", &system_fields(set));
    card_list(&mut html, "Battery Info", &battery_fields(&set.battery));
    card_list(
        &mut html,
        "Hardware Summary",
        &[
            (
                "Working Components",
                output.presence.working_count().to_string(),
            ),
            (
                "Not Detected",
                output.presence.not_detected_count().to_string(),
            ),
        ],
    );
    html.push_str("</div>\n<div class=\"grid\">\n");

    html.push_str("<section class=\"card\"><h2>CPU Info</h2><ul>\n");
    item(
        &mut html,
        "Physical Cores",
        &format_physical_cores(set.cpu.physical_cores),
    );
    item(&mut html, "Logical CPUs", &set.cpu.logical_cores.to_string());
    for (i, pct) in set.cpu.per_core_percent.iter().enumerate() {
        item(&mut html, &format!("Core {i}"), &format!("{pct:.1}%"));
    }
    item(
        &mut html,
        "Total CPU Usage",
        &format!("{:.1}%", set.cpu.total_percent),
    );
    html.push_str("</ul><hr><h3>Top Processes</h3><ul>\n");
    if set.processes.is_empty() {
        not_available(&mut html, "Process list not available");
    }
    for p in &set.processes {
        let _ = writeln!(
            html,
            "<li>{} (PID: {}) - {:.1}%</li>",
            escape(&p.name),
            p.pid,
            p.cpu_percent
        );
    }
    html.push_str("</ul></section>\n");

    html.push_str("<section class=\"card\"><h2>Memory Info</h2>\n");
    for (title, stat) in [
        ("Virtual", &set.memory.virtual_memory),
        ("Swap", &set.memory.swap),
    ] {
        let _ = writeln!(html, "<h3>{title} Memory</h3><ul>");
        for (k, v) in memory_fields(stat) {
            item(&mut html, k, &v);
        }
        html.push_str("</ul>\n");
    }
    html.push_str("</section>\n</div>\n");

    html.push_str("<section class=\"card\"><h2>Disk Info</h2><div class=\"grid\">\n");
    if set.disks.is_empty() {
        html.push_str("<ul>");
        not_available(&mut html, "Disk information not available");
        html.push_str("</ul>");
    }
    for d in &set.disks {
        html.push_str("<div class=\"disk\"><ul>\n");
        item(&mut html, "Device", &d.device);
        item(&mut html, "Mount", &d.mount_point);
        item(&mut html, "FS", &d.fs_type);
        item(&mut html, "Total", &format_gib(d.total_bytes));
        item(&mut html, "Used", &format_gib(d.used_bytes));
        item(&mut html, "Free", &format_gib(d.free_bytes));
        item(&mut html, "Usage", &format!("{:.1}%", d.usage_percent));
        html.push_str("</ul></div>\n");
    }
    html.push_str("</div></section>\n<div class=\"grid\">\n");
    card_list(&mut html, "Network Info", &network_fields(set));
    html.push_str("</div>\n</main>\n</body>\n</html>\n");

    html
}

fn card_list(html: &mut String, title: &str, fields: &[(&str, String)]) {
    let _ = writeln!(html, "<section class=\"card\"><h2>{}</h2><ul>", escape(title));
    for (k, v) in fields {
        item(html, k, v);
    }
    html.push_str("</ul></section>\n");
}

fn item(html: &mut String, key: &str, value: &str) {
    let _ = writeln!(
        html,
        "<li><strong>{}:</strong> {}</li>",
        escape(key),
        escape(value)
    );
}

fn not_available(html: &mut String, text: &str) {
    let _ = writeln!(html, "<li class=\"na\">{}</li>", escape(text));
}

pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
