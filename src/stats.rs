//! Human-readable integration overview.
//!
//! Provides a quick summary of what has been integrated: totals, a per-kind
//! breakdown, the state file's size and when the newest file arrived. Used by
//! `intake stats`.

use std::collections::BTreeMap;

use crate::integrator::Integrator;
use crate::progress::format_number;

/// Per-kind breakdown of integrated entries.
#[derive(Debug, Default, PartialEq)]
struct KindStats {
    files: usize,
    bytes: u64,
}

/// Print a summary of the integrator's state to stdout.
pub fn print_stats(integrator: &Integrator) {
    let stats = integrator.stats();
    let entries = integrator.entries();
    let config = integrator.config();

    let state_size = std::fs::metadata(&config.watch.state_path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Intake — Integration Stats");
    println!("==========================");
    println!();
    println!("  Watching:    {}", stats.watching_folder);
    println!("  State file:  {}", config.watch.state_path.display());
    println!("  State size:  {}", format_bytes(state_size));
    println!();
    println!("  Integrated:  {}", format_number(stats.total_integrated));
    println!("  Hashes:      {}", format_number(stats.processed_files as u64));
    println!("  Entries:     {}", format_number(stats.knowledge_size as u64));

    let newest = entries.iter().map(|(_, e)| e.integrated_at).max();
    println!(
        "  Last added:  {}",
        newest
            .map(|ts| format_ts_relative(ts.timestamp()))
            .unwrap_or_else(|| "never".to_string())
    );

    let by_kind = breakdown(entries.iter().map(|(_, e)| (e.summary.kind(), e.size_bytes)));
    if !by_kind.is_empty() {
        println!();
        println!("  By kind:");
        println!("  {:<10} {:>8} {:>12}", "KIND", "FILES", "SIZE");
        println!("  {}", "-".repeat(32));
        for (kind, s) in &by_kind {
            println!(
                "  {:<10} {:>8} {:>12}",
                kind,
                format_number(s.files as u64),
                format_bytes(s.bytes)
            );
        }
    }

    println!();
}

fn breakdown<'a>(items: impl Iterator<Item = (&'a str, u64)>) -> BTreeMap<&'a str, KindStats> {
    let mut map: BTreeMap<&str, KindStats> = BTreeMap::new();
    for (kind, bytes) in items {
        let s = map.entry(kind).or_default();
        s.files += 1;
        s.bytes += bytes;
    }
    map
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let delta = now - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_scaled() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn relative_times() {
        let now = chrono::Utc::now().timestamp();
        assert_eq!(format_ts_relative(now), "just now");
        assert_eq!(format_ts_relative(now - 120), "2 mins ago");
        assert_eq!(format_ts_relative(now - 3600), "1 hour ago");
    }

    #[test]
    fn breakdown_groups_by_kind() {
        let map = breakdown(
            [("text", 10u64), ("binary", 5), ("text", 3)].into_iter(),
        );
        assert_eq!(map["text"], KindStats { files: 2, bytes: 13 });
        assert_eq!(map["binary"], KindStats { files: 1, bytes: 5 });
    }
}
