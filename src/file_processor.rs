use anyhow::Result;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::backup_manager::BackupManager;
use crate::config::{RuleSet, RunConfig};
use crate::discovery;
use crate::error::RewriteError;
use crate::report::{FileOutcome, RestoreReport, RunReport};
use crate::rules::Pipeline;

/// Runs the pipeline over single files and persists the result
///
/// Per file: read, transform, compare, back up, write. The backup always
/// lands before the write; if it fails the file is left as it was.
pub struct FileProcessor<'a> {
    pipeline: &'a Pipeline,
    backups: &'a BackupManager,
    dry_run: bool,
}

impl<'a> FileProcessor<'a> {
    pub fn new(pipeline: &'a Pipeline, backups: &'a BackupManager, dry_run: bool) -> Self {
        Self {
            pipeline,
            backups,
            dry_run,
        }
    }

    /// Process one file; failures become an `Errored` outcome, never a panic or early return
    pub fn process_file(&self, file_path: &Path) -> FileOutcome {
        match self.try_process_file(file_path) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(path = %file_path.display(), error = %e, "file failed");
                FileOutcome::Errored(e)
            }
        }
    }

    fn try_process_file(&self, file_path: &Path) -> Result<FileOutcome, RewriteError> {
        let original = read_document(file_path)?;
        let transformed = self.pipeline.apply(&original);

        if transformed.text == original {
            return Ok(FileOutcome::Unchanged);
        }

        if self.dry_run {
            return Ok(FileOutcome::WouldChange {
                fired: transformed.fired,
                original,
                rewritten: transformed.text,
            });
        }

        self.commit(file_path, &transformed.text, write_atomic)?;

        tracing::info!(
            path = %file_path.display(),
            rules = %transformed.fired.join(","),
            "file rewritten"
        );
        Ok(FileOutcome::Changed {
            fired: transformed.fired,
        })
    }

    /// Back up `file_path`, then hand the new text to `write`
    ///
    /// A failed write leaves the original untouched, so its fresh backup is
    /// removed again: a backup only exists next to a file that was rewritten.
    fn commit<W>(&self, file_path: &Path, text: &str, write: W) -> Result<(), RewriteError>
    where
        W: FnOnce(&Path, &str) -> Result<(), RewriteError>,
    {
        let backup = self.backups.create_backup(file_path)?;

        if let Err(e) = write(file_path, text) {
            if let Err(rm) = fs::remove_file(&backup) {
                tracing::warn!(
                    backup = %backup.display(),
                    error = %rm,
                    "write failed and the backup could not be removed"
                );
            }
            return Err(e);
        }

        Ok(())
    }
}

/// Read a whole file as UTF-8 text
pub fn read_document(file_path: &Path) -> Result<String, RewriteError> {
    fs::read_to_string(file_path).map_err(|source| {
        if source.kind() == io::ErrorKind::InvalidData {
            RewriteError::Encoding {
                path: file_path.to_path_buf(),
            }
        } else {
            RewriteError::Read {
                path: file_path.to_path_buf(),
                source,
            }
        }
    })
}

/// Replace `file_path` with `content` via a temp file in the same directory
///
/// The original's permissions are carried over, so a rewritten page stays as
/// readable as it was.
pub fn write_atomic(file_path: &Path, content: &str) -> Result<(), RewriteError> {
    let write_err = |source: io::Error| RewriteError::Write {
        path: file_path.to_path_buf(),
        source,
    };

    let parent_dir = file_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    // Create temp file in same directory as target (for atomic rename)
    let mut temp_file = NamedTempFile::new_in(parent_dir).map_err(write_err)?;

    temp_file.write_all(content.as_bytes()).map_err(write_err)?;
    temp_file.flush().map_err(write_err)?;

    if let Ok(metadata) = fs::metadata(file_path) {
        fs::set_permissions(temp_file.path(), metadata.permissions()).map_err(write_err)?;
    }

    temp_file
        .persist(file_path)
        .map_err(|e| write_err(e.error))?;

    Ok(())
}

/// Forward run: discover, rewrite every page, record the run
///
/// Only an unusable root or rule set aborts; every per-file failure is kept
/// in the report.
pub fn rewrite_tree(config: &RunConfig, rule_set: &RuleSet) -> Result<RunReport> {
    let pipeline = rule_set.compile()?;
    let files = discovery::discover(&config.root, &rule_set.discovery)?;
    let backups = BackupManager::new(&config.root, &rule_set.discovery.backup_suffix);
    let processor = FileProcessor::new(&pipeline, &backups, config.dry_run);

    tracing::debug!(
        root = %config.root.display(),
        files = files.len(),
        rules = pipeline.len(),
        dry_run = config.dry_run,
        "starting rewrite"
    );

    let mut report = RunReport::new(&rule_set.name, config.dry_run);
    for file_path in files {
        let outcome = processor.process_file(&file_path);
        report.push(file_path, outcome);
    }

    let changed: Vec<PathBuf> = report.changed_files();
    if !config.dry_run && !changed.is_empty() {
        // The journal is advisory; the .bak files alone are enough to restore.
        match backups.record_run(&rule_set.name, &changed) {
            Ok(id) => report.run_id = Some(id),
            Err(e) => tracing::warn!(error = %format!("{:#}", e), "could not record run in journal"),
        }
    }

    Ok(report)
}

/// Restore run: put every backup back over its original and delete it
pub fn restore_tree(config: &RunConfig, rule_set: &RuleSet) -> Result<RestoreReport> {
    let backups = BackupManager::new(&config.root, &rule_set.discovery.backup_suffix);
    let found = backups.find_backups(&rule_set.discovery.extension)?;

    match backups.load_journal() {
        Ok(journal) if !journal.runs.is_empty() => tracing::info!(
            runs = journal.runs.len(),
            files = journal.file_count(),
            "journal lists earlier runs"
        ),
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %format!("{:#}", e), "journal unreadable, restoring from backups only"),
    }

    let mut report = RestoreReport::default();
    for backup in found {
        let result = backups.restore_backup(&backup);
        if let Err(e) = &result {
            tracing::warn!(backup = %backup.display(), error = %e, "restore failed");
        }
        report.entries.push((backup, result));
    }

    if report.errored() == 0 {
        match backups.clear_journal() {
            Ok(cleared) => report.journal_cleared = cleared,
            Err(e) => tracing::warn!(error = %format!("{:#}", e), "could not remove journal"),
        }
    }

    Ok(report)
}
