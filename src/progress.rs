//! Integration notifications.
//!
//! A pass that integrates something is reported as one discrete event: how
//! many files and which ones. Passes with nothing new stay silent. Output goes
//! to **stderr** so stdout remains parseable for scripts.

use std::io::Write;

use crate::models::ScanResult;

/// Reports completed passes. Implementations write to stderr (human or JSON).
pub trait IntegrationReporter: Send + Sync {
    /// Called once per pass, including passes with nothing new.
    fn report(&self, result: &ScanResult);
}

/// Human-friendly lines: "scan: integrated 3 new file(s)" then one line per file.
pub struct StderrReporter;

impl IntegrationReporter for StderrReporter {
    fn report(&self, result: &ScanResult) {
        if let Some(text) = render_human(result) {
            let mut err = std::io::stderr().lock();
            let _ = err.write_all(text.as_bytes());
            let _ = err.flush();
        }
    }
}

/// Machine-readable reporting: one JSON object per line on stderr.
pub struct JsonReporter;

impl IntegrationReporter for JsonReporter {
    fn report(&self, result: &ScanResult) {
        if let Some(obj) = render_json(result) {
            if let Ok(line) = serde_json::to_string(&obj) {
                let mut err = std::io::stderr().lock();
                let _ = writeln!(err, "{}", line);
                let _ = err.flush();
            }
        }
    }
}

/// No-op reporter when notifications are disabled.
pub struct NoReporter;

impl IntegrationReporter for NoReporter {
    fn report(&self, _result: &ScanResult) {}
}

fn render_human(result: &ScanResult) -> Option<String> {
    if result.new_count() == 0 {
        return None;
    }
    let mut out = format!(
        "scan: integrated {} new file(s)\n",
        format_number(result.new_count() as u64)
    );
    for name in &result.integrated {
        out.push_str(&format!("  + {}\n", name));
    }
    for name in &result.failed {
        out.push_str(&format!("  ! {} (extraction failed)\n", name));
    }
    out.push_str(&format!(
        "scan: {} file(s) integrated in total\n",
        format_number(result.total_integrated)
    ));
    Some(out)
}

fn render_json(result: &ScanResult) -> Option<serde_json::Value> {
    if result.new_count() == 0 {
        return None;
    }
    Some(serde_json::json!({
        "event": "integrated",
        "count": result.new_count(),
        "files": result.integrated,
        "failed": result.failed,
        "total_integrated": result.total_integrated,
    }))
}

pub(crate) fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Notification mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human output when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn IntegrationReporter> {
        match self {
            ProgressMode::Off => Box::new(NoReporter),
            ProgressMode::Human => Box::new(StderrReporter),
            ProgressMode::Json => Box::new(JsonReporter),
        }
    }
}
