//! Quarantine Handler and archive routing
//!
//! Failed inputs are relocated, never deleted: either a file's effects are
//! fully committed and the file lands in the archive, or the file is
//! preserved byte-for-byte in the error directory for operator review.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{info, warn};

/// Move a failed source file into the error directory.
///
/// The filename gains a timestamp suffix (and a numeric tiebreak on
/// collision) so a repeated failure of the same file never overwrites an
/// earlier one. Returns the final quarantine path.
pub fn quarantine(path: &Path, error_dir: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(error_dir)?;

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("input");
    let extension = path.extension().and_then(|s| s.to_str());
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");

    let mut candidate = join_named(error_dir, &format!("{stem}_{stamp}"), extension);
    let mut tiebreak = 1u32;
    while candidate.exists() {
        candidate = join_named(error_dir, &format!("{stem}_{stamp}_{tiebreak}"), extension);
        tiebreak += 1;
    }

    move_file(path, &candidate)?;
    info!(from = %path.display(), to = %candidate.display(), "quarantined source file");
    Ok(candidate)
}

/// Move a successfully ingested source file into the archive directory.
///
/// A same-named file already in the archive is overwritten; its data is
/// already superseded in the database.
pub fn archive(path: &Path, archive_dir: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(archive_dir)?;
    let file_name = path.file_name().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "source path has no file name")
    })?;
    let target = archive_dir.join(file_name);
    if target.exists() {
        warn!(target = %target.display(), "file already archived, overwriting");
    }
    move_file(path, &target)?;
    info!(from = %path.display(), to = %target.display(), "archived source file");
    Ok(target)
}

fn join_named(dir: &Path, name: &str, extension: Option<&str>) -> PathBuf {
    match extension {
        Some(ext) => dir.join(format!("{name}.{ext}")),
        None => dir.join(name),
    }
}

/// Rename, falling back to copy+remove when crossing filesystems.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}
