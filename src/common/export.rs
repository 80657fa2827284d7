//! Metrics export.
//!
//! CSV output is a two-row table: the metric names, then their values. JSON
//! output is the serialized snapshot. Both create missing parent directories.

use anyhow::Context;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::simulation::network::MetricsSnapshot;

/// Write the snapshot as a header row plus one value row.
pub fn write_csv<W: Write>(metrics: &MetricsSnapshot, writer: &mut W) -> std::io::Result<()> {
    let fields = metrics.fields();

    let header: Vec<String> = fields.iter().map(|(name, _)| escape_csv_field(name)).collect();
    writeln!(writer, "{}", header.join(","))?;

    let values: Vec<String> = fields.iter().map(|(_, value)| escape_csv_field(value)).collect();
    writeln!(writer, "{}", values.join(","))?;

    Ok(())
}

/// Export the snapshot as CSV to `path`, creating parent directories.
pub fn export_csv(metrics: &MetricsSnapshot, path: &Path) -> anyhow::Result<()> {
    let mut writer = BufWriter::new(create_file(path)?);
    write_csv(metrics, &mut writer).with_context(|| format!("Failed to write CSV: {}", path.display()))?;
    writer.flush().with_context(|| format!("Failed to flush CSV: {}", path.display()))?;
    log::info!("Metrics exported to {}", path.display());
    Ok(())
}

/// Export the snapshot as pretty-printed JSON to `path`, creating parent directories.
pub fn export_json(metrics: &MetricsSnapshot, path: &Path) -> anyhow::Result<()> {
    let writer = BufWriter::new(create_file(path)?);
    serde_json::to_writer_pretty(writer, metrics).with_context(|| format!("Failed to write JSON: {}", path.display()))?;
    log::info!("Metrics exported to {}", path.display());
    Ok(())
}

fn create_file(path: &Path) -> anyhow::Result<fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::File::create(path).with_context(|| format!("Failed to create file: {}", path.display()))
}

/// Escape a CSV field if it contains special characters.
fn escape_csv_field(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> MetricsSnapshot {
        MetricsSnapshot {
            packets_sent: 10,
            packets_received: 7,
            pdr_percent: 70.0,
            avg_delay_ms: 23.4,
            total_energy_used_j: 0.12,
            collisions: 0,
            active_nodes: 5,
            total_nodes: 5,
            avg_spreading_factor: 7.4,
            avg_bandwidth_khz: 175.0,
            indoor_detections: 1,
            parameter_adaptations: 10,
        }
    }

    #[test]
    fn csv_has_header_and_one_value_row() {
        let mut buffer = Vec::new();
        write_csv(&snapshot(), &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Packets Sent,Packets Received,PDR (%),Avg Delay (ms)"));
        assert_eq!(lines[1], "10,7,70.0,23.4,0.12,0,5,5,7.4,175.0,1,10");
    }

    #[test]
    fn escaping_quotes_special_fields() {
        assert_eq!(escape_csv_field("plain"), "plain");
        assert_eq!(escape_csv_field("a,b"), "\"a,b\"");
        assert_eq!(escape_csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn export_creates_missing_directories() {
        let dir = std::env::temp_dir().join(format!("lorampp-export-{}", std::process::id()));
        let csv_path = dir.join("nested").join("results.csv");
        let json_path = dir.join("nested").join("results.json");

        export_csv(&snapshot(), &csv_path).unwrap();
        export_json(&snapshot(), &json_path).unwrap();

        let csv = fs::read_to_string(&csv_path).unwrap();
        assert_eq!(csv.lines().count(), 2);
        let parsed: MetricsSnapshot = serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(parsed, snapshot());

        let _ = fs::remove_dir_all(&dir);
    }
}
