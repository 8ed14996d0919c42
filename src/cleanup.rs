// src/cleanup.rs
use std::{fs, io, path::Path, path::PathBuf};
use tracing::{info, warn};

use crate::error::{PipelineError, Result};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: usize,
    /// Directories and the marker file.
    pub kept: usize,
    /// Files that should have gone but could not be deleted.
    pub failed: Vec<PathBuf>,
}

/// Delete every regular file directly inside `dir` except `marker`
/// (compared case-insensitively). Subdirectories are left alone.
///
/// A file that cannot be deleted is logged and listed in
/// [`CleanupReport::failed`]; the remaining files are still processed.
pub fn reconcile(dir: &Path, marker: &str) -> Result<CleanupReport> {
    reconcile_with(dir, marker, |path| fs::remove_file(path))
}

fn reconcile_with<F>(dir: &Path, marker: &str, mut remove: F) -> Result<CleanupReport>
where
    F: FnMut(&Path) -> io::Result<()>,
{
    let entries = fs::read_dir(dir)
        .map_err(|e| PipelineError::io(format!("listing {}", dir.display()), e))?;
    let marker = marker.to_lowercase();
    let mut report = CleanupReport::default();

    for entry in entries {
        let path = match entry {
            Ok(e) => e.path(),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "unreadable directory entry");
                continue;
            }
        };
        let is_marker = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase() == marker)
            .unwrap_or(false);

        if !path.is_file() || is_marker {
            report.kept += 1;
            continue;
        }
        match remove(&path) {
            Ok(()) => report.removed += 1,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "could not delete");
                report.failed.push(path);
            }
        }
    }

    info!(
        removed = report.removed,
        kept = report.kept,
        failed = report.failed.len(),
        "workspace cleaned"
    );
    Ok(report)
}
