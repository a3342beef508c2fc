//! Common helpers shared across CLI commands.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Build the sealed output path from the input path.
///
/// Transforms `capture.jpg` into `capture_sealed.jpg`.
pub fn build_sealed_path(file: &Path) -> PathBuf {
    let stem = file.file_stem().and_then(|s| s.to_str()).unwrap_or("image");
    let ext = file.extension().and_then(|e| e.to_str()).unwrap_or("jpg");
    file.with_file_name(format!("{stem}_sealed.{ext}"))
}

/// Write bytes via a temporary file and rename, so a reader never
/// observes a partially written image.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("pixseal.tmp");
    fs::write(&tmp, bytes).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
