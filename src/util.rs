use chrono::{DateTime, SecondsFormat, Utc};
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Fixed-width ISO-8601 timestamp, e.g. `2026-10-16T07:33:12.004512Z`.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Compact stamp used in artifact file names.
pub fn file_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d%H%M%S").to_string()
}

/// 1-based page number for a `skip`/`limit` window.
pub fn page_number(skip: usize, limit: usize) -> usize {
    if limit > 0 { skip / limit + 1 } else { 1 }
}

/// Microseconds per quarter note for a tempo in beats per minute.
pub fn bpm_to_mpqn(bpm: u32) -> u32 {
    const MICROSECONDS_PER_MINUTE: f64 = 60_000_000.0;
    (MICROSECONDS_PER_MINUTE / bpm.max(1) as f64).round() as u32
}

pub fn mpqn_to_bpm(mpqn: u32) -> f64 {
    60_000_000.0 / mpqn.max(1) as f64
}

/// Writes `bytes` next to `path` first and renames into place, so `path` never holds a partial file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    Ok(())
}
