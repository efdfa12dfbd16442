//! `symdex stats` and `symdex list` output.

use crate::error::IndexError;
use crate::index::set::{IndexSet, load_meta};
use crate::utils::text::digits;
use crate::utils::{IndexLocation, list_indexed_codebases};
use anyhow::Result;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Display index statistics
pub fn show_stats(index: &IndexSet) -> Result<()> {
    let meta = index.meta();
    let counts = index.counts()?;

    println!("Index Statistics");
    println!("================");
    println!();
    println!("Root path:        {}", meta.root_path.display());
    println!("Index location:   {}", index.dir().display());
    println!("Index version:    {}", meta.version);

    let rows = [
        ("Files", counts.files),
        ("Symbols", counts.symbols),
        ("Symbol names", counts.symbol_names),
        ("USRs", counts.usrs),
        ("References", counts.references),
        ("Targets", counts.targets),
        ("Dependencies", counts.dependencies),
        ("Units", counts.sources),
        ("Fix-its", counts.fixits),
    ];
    let width = rows
        .iter()
        .map(|(_, count)| digits(*count as u64))
        .max()
        .unwrap_or(1);

    println!();
    println!("Entries:");
    for (label, count) in rows {
        println!("  {:15} {:>width$}", label, count, width = width);
    }

    if let Ok(size) = index_size(index.dir()) {
        println!();
        println!("Index size:       {}", format_size(size));
    }

    let now = now_secs();
    println!();
    println!("Created:          {}", format_age(meta.created_at, now));
    println!("Updated:          {}", format_age(meta.updated_at, now));

    Ok(())
}

/// List all indexed projects with their size and freshness
pub fn list_indexes() -> Result<()> {
    let codebases = list_indexed_codebases()?;

    if codebases.is_empty() {
        println!("No indexed projects found.");
        return Ok(());
    }

    println!("Indexed Projects");
    println!("================");
    println!();

    let now = now_secs();
    for codebase in &codebases {
        println!("{}", describe_index(codebase, now));
        println!();
    }

    Ok(())
}

/// Two-line summary of one index directory
fn describe_index(codebase: &IndexLocation, now: u64) -> String {
    let status = if codebase.root_path.exists() { "" } else { " [missing]" };
    let detail = match load_meta(&codebase.index_dir) {
        Ok(Some(meta)) => format!(
            "{} files, {} symbols, updated {}",
            meta.file_count,
            meta.symbol_count,
            format_age(meta.updated_at, now)
        ),
        Ok(None) => "no metadata".to_string(),
        Err(IndexError::VersionMismatch { found, .. }) => {
            format!("version {}, rebuild required", found)
        }
        Err(e) => format!("unreadable: {}", e),
    };
    let size = index_size(&codebase.index_dir)
        .map(format_size)
        .unwrap_or_else(|_| "?".to_string());

    format!(
        "  {}{}\n    {} ({})",
        codebase.root_path.display(),
        status,
        detail,
        size
    )
}

/// Total size of the table files and metadata in an index directory
fn index_size(dir: &Path) -> std::io::Result<u64> {
    let mut size = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.ends_with(".db") || name == "meta.json" {
            size += entry.metadata()?.len();
        }
    }
    Ok(size)
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];

    if bytes < 1024 {
        return format!("{} bytes", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Age of a unix timestamp relative to `now`, coarsest unit first
fn format_age(ts: u64, now: u64) -> String {
    if ts == 0 {
        return "never".to_string();
    }
    let elapsed = now.saturating_sub(ts);
    let (count, unit) = match elapsed {
        0..60 => return "just now".to_string(),
        60..3_600 => (elapsed / 60, "minute"),
        3_600..86_400 => (elapsed / 3_600, "hour"),
        _ => (elapsed / 86_400, "day"),
    };
    let plural = if count == 1 { "" } else { "s" };
    format!("{} {}{} ago", count, unit, plural)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::types::IndexMeta;
    use tempfile::TempDir;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(12), "12 bytes");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024 * 1024), "5120.00 GB");
    }

    #[test]
    fn test_format_age() {
        let now = 1_700_000_000;
        assert_eq!(format_age(0, now), "never");
        assert_eq!(format_age(now - 5, now), "just now");
        assert_eq!(format_age(now + 30, now), "just now");
        assert_eq!(format_age(now - 60, now), "1 minute ago");
        assert_eq!(format_age(now - 7_200, now), "2 hours ago");
        assert_eq!(format_age(now - 3 * 86_400, now), "3 days ago");
    }

    #[test]
    fn test_index_size_counts_tables_only() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("symbols.db"), [0u8; 10]).unwrap();
        fs::write(dir.path().join("meta.json"), [0u8; 5]).unwrap();
        fs::write(dir.path().join("symbols.db.tmp"), [0u8; 100]).unwrap();
        assert_eq!(index_size(dir.path()).unwrap(), 15);
    }

    #[test]
    fn test_describe_index() {
        let dir = TempDir::new().unwrap();
        let index_dir = dir.path().join("idx");
        fs::create_dir_all(&index_dir).unwrap();
        let meta = IndexMeta {
            root_path: dir.path().to_path_buf(),
            file_count: 3,
            symbol_count: 42,
            updated_at: 1_000,
            ..Default::default()
        };
        fs::write(index_dir.join("meta.json"), serde_json::to_string(&meta).unwrap()).unwrap();

        let location = IndexLocation {
            root_path: dir.path().to_path_buf(),
            index_dir: index_dir.clone(),
        };
        let text = describe_index(&location, 1_000 + 2 * 3_600);
        assert!(text.contains("3 files, 42 symbols, updated 2 hours ago"), "{}", text);
        assert!(!text.contains("[missing]"));

        let gone = IndexLocation {
            root_path: dir.path().join("deleted"),
            index_dir,
        };
        assert!(describe_index(&gone, 0).contains("[missing]"));
    }

    #[test]
    fn test_describe_stale_index() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("meta.json"), r#"{"version": 7}"#).unwrap();
        let location = IndexLocation {
            root_path: dir.path().to_path_buf(),
            index_dir: dir.path().to_path_buf(),
        };
        assert!(describe_index(&location, 0).contains("version 7, rebuild required"));
    }
}
