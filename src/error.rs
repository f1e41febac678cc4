//! Error types for pagemend
//!
//! `RewriteError` covers everything that can go wrong with a single file; it
//! is recorded in the run report and never stops the run. `RuleError` is
//! raised while compiling a rule set and is always fatal.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A failure isolated to one file
#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("{} is not valid UTF-8", .path.display())]
    Encoding { path: PathBuf },

    #[error("backup already exists: {}", .backup.display())]
    BackupExists { path: PathBuf, backup: PathBuf },

    #[error("failed to back up to {}: {source}", .backup.display())]
    Backup {
        path: PathBuf,
        backup: PathBuf,
        source: io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to restore {} from {}: {source}", .path.display(), .backup.display())]
    Restore {
        path: PathBuf,
        backup: PathBuf,
        source: io::Error,
    },

    #[error("restored {} but could not remove {}: {source}", .path.display(), .backup.display())]
    RemoveBackup {
        path: PathBuf,
        backup: PathBuf,
        source: io::Error,
    },
}

impl RewriteError {
    /// The page the error belongs to
    pub fn path(&self) -> &Path {
        match self {
            RewriteError::Read { path, .. }
            | RewriteError::Encoding { path }
            | RewriteError::BackupExists { path, .. }
            | RewriteError::Backup { path, .. }
            | RewriteError::Write { path, .. }
            | RewriteError::Restore { path, .. }
            | RewriteError::RemoveBackup { path, .. } => path,
        }
    }

    /// The underlying I/O error, if there is one
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            RewriteError::Read { source, .. }
            | RewriteError::Backup { source, .. }
            | RewriteError::Write { source, .. }
            | RewriteError::Restore { source, .. }
            | RewriteError::RemoveBackup { source, .. } => Some(source),
            RewriteError::Encoding { .. } | RewriteError::BackupExists { .. } => None,
        }
    }
}

/// A rule that cannot be compiled
#[derive(Error, Debug)]
pub enum RuleError {
    #[error("rule '{name}': {reason}")]
    Invalid { name: String, reason: String },

    #[error("rule '{name}': invalid regex: {source}")]
    InvalidRegex { name: String, source: regex::Error },
}
