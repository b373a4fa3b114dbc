//! Result report formatting

use colored::Colorize;
use serde::Serialize;

use crate::calibrate::Trial;

/// Final measurements for both directions.
///
/// A report only exists once both directions completed; there is no
/// partial-result form.
#[derive(Debug, Clone, Copy)]
pub struct ThroughputReport {
    pub upload: Trial,
    pub download: Trial,
}

/// Serializable summary of one direction, for debug dumps
#[derive(Debug, Serialize)]
pub struct DirectionSummary {
    pub bytes: u64,
    pub seconds: f64,
    pub bytes_per_second: f64,
}

impl From<&Trial> for DirectionSummary {
    fn from(trial: &Trial) -> Self {
        Self {
            bytes: trial.size,
            seconds: trial.elapsed.as_secs_f64(),
            bytes_per_second: trial.throughput(),
        }
    }
}

impl ThroughputReport {
    /// Render the two-line human-readable report
    pub fn format(&self, use_color: bool) -> String {
        let up = format_line("Upload Speed", &self.upload, use_color);
        let down = format_line("Download Speed", &self.download, use_color);
        format!("{up}\n{down}")
    }
}

fn format_line(label: &str, trial: &Trial, use_color: bool) -> String {
    let speed = format_throughput(trial.throughput());
    let detail = format!(
        "({} in {:.2}s)",
        format_bytes(trial.size),
        trial.elapsed.as_secs_f64()
    );
    if use_color {
        format!("{}: {} {}", label.bold(), speed.green().bold(), detail.dimmed())
    } else {
        format!("{label}: {speed} {detail}")
    }
}

/// Render bytes/second as Mbit/s, the unit home speed tests use
pub fn format_throughput(bytes_per_second: f64) -> String {
    format!("{:.2} Mbit/s", bytes_per_second * 8.0 / 1_000_000.0)
}

/// Human byte-size rendering with binary units
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
