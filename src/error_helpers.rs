//! Error helper functions for creating actionable error messages

use std::io;
use std::path::Path;

use crate::error::RewriteError;

/// Check if an IO error is a permission denied error
pub fn is_permission_denied(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::PermissionDenied
}

/// Check if an IO error is a "not found" error
pub fn is_not_found(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound
}

fn parent_of(path: &Path) -> String {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| ".".to_string())
}

/// Suggested fixes for a per-file failure, if any apply
pub fn hint_for(err: &RewriteError) -> Option<String> {
    match err {
        RewriteError::BackupExists { path, backup } => Some(format!(
            "Possible fixes:\n\
             1. Undo the earlier run first: pagemend --restore\n\
             2. Or keep the current state and delete the old backup: rm '{}'\n\
             Then run pagemend again to rewrite '{}'",
            backup.display(),
            path.display()
        )),
        RewriteError::Encoding { path } => Some(format!(
            "Possible fixes:\n\
             1. Check the file encoding: file '{}'\n\
             2. Convert it to UTF-8, e.g.: iconv -f latin1 -t utf-8",
            path.display()
        )),
        other => {
            let io_err = other.io_error()?;
            if is_permission_denied(io_err) {
                Some(format!(
                    "Possible fixes:\n\
                     1. Check file permissions: ls -l '{}'\n\
                     2. Ensure the directory is writable (backups are created next to the file): chmod u+w '{}'",
                    other.path().display(),
                    parent_of(other.path())
                ))
            } else if is_not_found(io_err) {
                Some(format!(
                    "Possible fixes:\n\
                     1. The file may have been moved or deleted during the run\n\
                     2. Re-run pagemend from the site root: cd '{}'",
                    parent_of(other.path())
                ))
            } else {
                None
            }
        }
    }
}
