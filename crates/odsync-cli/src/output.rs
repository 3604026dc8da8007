//! Terminal output for commands
//!
//! Logs go to stderr through `tracing`; results go to stdout through an
//! [`OutputFormatter`], either as human-readable lines or as JSON.

use odsync_sync::{readable_file_size, SyncSummary};

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Trait for formatting CLI output
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn info(&self, message: &str);
    fn print_json(&self, value: &serde_json::Value);
}

/// Human-readable output formatter with checkmarks and indentation
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {message}");
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {message}");
    }
    fn info(&self, message: &str) {
        println!("  {message}");
    }
    fn print_json(&self, _value: &serde_json::Value) {}
}

/// JSON output formatter
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!("{}", serde_json::json!({"success": true, "message": message}));
    }
    fn error(&self, message: &str) {
        eprintln!("{}", serde_json::json!({"success": false, "error": message}));
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &serde_json::Value) {
        println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Human => Box::new(HumanFormatter),
    }
}

fn plural(n: u64) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

fn format_duration(ms: u64) -> String {
    if ms >= 1000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{ms}ms")
    }
}

/// Detail lines of a run summary, zero counters left out
pub fn summary_lines(summary: &SyncSummary) -> Vec<String> {
    let mut lines = Vec::new();
    if summary.files_uploaded > 0 {
        lines.push(format!(
            "Uploaded:   {} file{} ({})",
            summary.files_uploaded,
            plural(summary.files_uploaded),
            readable_file_size(summary.bytes_uploaded)
        ));
    }
    if summary.files_downloaded > 0 {
        lines.push(format!(
            "Downloaded: {} file{} ({})",
            summary.files_downloaded,
            plural(summary.files_downloaded),
            readable_file_size(summary.bytes_downloaded)
        ));
    }
    let counters = [
        ("Folders:   ", summary.folders_created),
        ("Dates:     ", summary.metadata_updated),
        ("Deleted:   ", summary.deleted),
        ("Skipped:   ", summary.skipped),
        ("Failed:    ", summary.failed),
    ];
    for (label, count) in counters {
        if count > 0 {
            lines.push(format!("{label} {count}"));
        }
    }
    lines
}

/// Prints the end-of-run summary
pub fn print_summary(formatter: &dyn OutputFormatter, format: OutputFormat, summary: &SyncSummary) {
    if format == OutputFormat::Json {
        formatter.print_json(&serde_json::to_value(summary).unwrap_or_default());
        return;
    }

    let duration = format_duration(summary.duration_ms);
    if summary.interrupted {
        formatter.error(&format!("Sync interrupted after {duration}"));
    } else if summary.failed > 0 {
        formatter.error(&format!(
            "Sync finished in {duration} with {} failure{}",
            summary.failed,
            plural(summary.failed)
        ));
    } else if summary.files_transferred() == 0 && summary.deleted == 0 && summary.metadata_updated == 0
    {
        formatter.success("Already up to date");
    } else {
        formatter.success(&format!("Sync completed in {duration}"));
    }

    for line in summary_lines(summary) {
        formatter.info(&line);
    }
}
