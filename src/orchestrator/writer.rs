//! Persists a [`ResultDocument`] to `uploads/analysis_<session_id>.json`
//! (spec.md §6), mirroring the retrieved Python reference's `writer.py`
//! byte-size formatter.

use std::path::{Path, PathBuf};

use crate::ScanError;

use super::ResultDocument;

pub fn write_results(uploads_dir: impl AsRef<Path>, doc: &ResultDocument) -> Result<PathBuf, ScanError> {
    let uploads_dir = uploads_dir.as_ref();
    std::fs::create_dir_all(uploads_dir)?;

    let path = uploads_dir.join(format!("analysis_{}.json", doc.session_id));
    let json = serde_json::to_string_pretty(doc)
        .map_err(|e| ScanError::Internal(format!("result document failed to serialize: {e}")))?;
    std::fs::write(&path, json)?;
    Ok(path)
}

/// Human-readable byte size (`1536` -> `"1.50 KiB"`), matching the
/// reference writer's `_fmt` helper.
pub fn size_human(bytes: u64) -> String {
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
        format!("{value:.2} {}", UNITS[unit])
    }
}
