use crate::error::{BibError, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Cooperative cancellation flag shared between a scan and whoever started it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A bibliography file found by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// `parent-directory/file-name`, the form shown in the file list.
    pub display: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Sorted by display name.
    pub files: Vec<ScannedFile>,
    pub cancelled: bool,
}

impl ScanReport {
    pub fn display_names(&self) -> Vec<String> {
        self.files.iter().map(|f| f.display.clone()).collect()
    }

    /// `Err(DirectoryScanCancelled)` when the scan stopped early.
    pub fn check(&self) -> Result<()> {
        if self.cancelled {
            Err(BibError::DirectoryScanCancelled)
        } else {
            Ok(())
        }
    }
}

/// Recursively collects files under `root` whose name ends with `file_ext`.
///
/// Unreadable directories are skipped. Files and directories reachable
/// through more than one path (symlinks) are visited once. When `token` is cancelled the files found
/// so far are returned with `cancelled` set.
pub fn scan_directory(root: &Path, file_ext: &str, token: &CancelToken) -> ScanReport {
    let mut found = Vec::new();
    let mut seen = HashSet::new();
    collect(root, file_ext, token, &mut seen, &mut found);

    let mut files: Vec<ScannedFile> = found
        .into_iter()
        .map(|path| ScannedFile {
            display: display_name(&path),
            path,
        })
        .collect();
    files.sort_by(|a, b| a.display.cmp(&b.display));

    let cancelled = token.is_cancelled();
    debug!(
        root = %root.display(),
        count = files.len(),
        cancelled,
        "directory scan finished"
    );
    ScanReport { files, cancelled }
}

fn collect(
    dir: &Path,
    file_ext: &str,
    token: &CancelToken,
    seen: &mut HashSet<PathBuf>,
    found: &mut Vec<PathBuf>,
) {
    if token.is_cancelled() {
        return;
    }
    // Directories and files share `seen`; symlinked loops end here.
    let resolved = fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
    if !seen.insert(resolved) {
        debug!(dir = %dir.display(), "directory already visited");
        return;
    }
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "skipping unreadable directory");
            return;
        }
    };

    for entry in entries.flatten() {
        if token.is_cancelled() {
            return;
        }
        let path = entry.path();
        if path.is_dir() {
            collect(&path, file_ext, token, seen, found);
        } else if path.is_file() && has_extension(&path, file_ext) {
            let resolved = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
            if seen.insert(resolved) {
                found.push(path);
            }
        }
    }
}

fn has_extension(path: &Path, file_ext: &str) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| name.ends_with(file_ext))
}

pub(crate) fn display_name(path: &Path) -> String {
    let file = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match path.parent().and_then(|p| p.file_name()) {
        Some(parent) => format!("{}/{}", parent.to_string_lossy(), file),
        None => file,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "").unwrap();
    }

    #[test]
    fn finds_nested_files_sorted_by_display_name() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("zeta/refs.bib"));
        touch(&dir.path().join("alpha/deeper/more.bib"));
        touch(&dir.path().join("alpha/notes.txt"));

        let report = scan_directory(dir.path(), ".bib", &CancelToken::new());
        assert!(!report.cancelled);
        assert_eq!(report.display_names(), vec!["deeper/more.bib", "zeta/refs.bib"]);
        assert!(report.check().is_ok());
    }

    #[test]
    fn cancelled_scan_reports_partial_result() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a/one.bib"));

        let token = CancelToken::new();
        token.cancel();
        let report = scan_directory(dir.path(), ".bib", &token);
        assert!(report.cancelled);
        assert!(report.files.is_empty());
        assert!(matches!(report.check(), Err(BibError::DirectoryScanCancelled)));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_cycles_are_walked_once() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("x/a.bib"));
        std::os::unix::fs::symlink(dir.path(), dir.path().join("x/l1")).unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("x/l2")).unwrap();

        let report = scan_directory(dir.path(), ".bib", &CancelToken::new());
        assert!(!report.cancelled);
        assert_eq!(report.display_names(), vec!["x/a.bib"]);
    }

    #[test]
    fn missing_root_yields_empty_list() {
        let dir = TempDir::new().unwrap();
        let report = scan_directory(&dir.path().join("nope"), ".bib", &CancelToken::new());
        assert!(report.files.is_empty());
        assert!(!report.cancelled);
    }
}
