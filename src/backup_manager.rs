use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::error::RewriteError;

/// Journal file kept at the root of the rewritten tree
pub const JOURNAL_FILE: &str = ".pagemend-journal.json";

/// One forward run that changed at least one file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub rule_set: String,
    pub files: Vec<PathBuf>,
}

/// Every recorded forward run since the last complete restore
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunJournal {
    pub runs: Vec<RunRecord>,
}

impl RunJournal {
    pub fn file_count(&self) -> usize {
        self.runs.iter().map(|r| r.files.len()).sum()
    }
}

/// Manages `<file><suffix>` sibling backups under one root
pub struct BackupManager {
    root: PathBuf,
    suffix: String,
}

impl BackupManager {
    pub fn new(root: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            suffix: suffix.into(),
        }
    }

    /// `<original><suffix>`
    pub fn backup_path(&self, original: &Path) -> PathBuf {
        let mut name = OsString::from(original.as_os_str());
        name.push(&self.suffix);
        PathBuf::from(name)
    }

    /// Inverse of [`backup_path`](Self::backup_path); only the trailing suffix is stripped
    pub fn original_path(&self, backup: &Path) -> Option<PathBuf> {
        let text = backup.to_str()?;
        let stripped = text.strip_suffix(self.suffix.as_str())?;
        if stripped.is_empty() || stripped.ends_with(['/', '\\']) {
            return None;
        }
        Some(PathBuf::from(stripped))
    }

    /// Copy `original` to its backup path
    ///
    /// Refuses to overwrite an existing backup: that file holds the content
    /// from before an earlier run, and restore must be able to get back to it.
    pub fn create_backup(&self, original: &Path) -> Result<PathBuf, RewriteError> {
        let backup = self.backup_path(original);

        if backup.exists() {
            return Err(RewriteError::BackupExists {
                path: original.to_path_buf(),
                backup,
            });
        }

        fs::copy(original, &backup).map_err(|source| RewriteError::Backup {
            path: original.to_path_buf(),
            backup: backup.clone(),
            source,
        })?;

        tracing::debug!(backup = %backup.display(), "backup created");
        Ok(backup)
    }

    /// Every backup of a `.<extension>` file under the root, sorted
    pub fn find_backups(&self, extension: &str) -> Result<Vec<PathBuf>> {
        crate::discovery::ensure_root(&self.root)?;

        let tail = format!(".{}{}", extension, self.suffix);
        let mut backups = Vec::new();

        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let is_backup = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(&tail) && name.len() > tail.len());
            if is_backup {
                backups.push(entry.into_path());
            }
        }

        backups.sort();
        Ok(backups)
    }

    /// Copy one backup over its original, then delete the backup
    pub fn restore_backup(&self, backup: &Path) -> Result<PathBuf, RewriteError> {
        let original = self.original_path(backup).ok_or_else(|| RewriteError::Restore {
            path: backup.to_path_buf(),
            backup: backup.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("name does not end with '{}'", self.suffix),
            ),
        })?;

        fs::copy(backup, &original).map_err(|source| RewriteError::Restore {
            path: original.clone(),
            backup: backup.to_path_buf(),
            source,
        })?;

        fs::remove_file(backup).map_err(|source| RewriteError::RemoveBackup {
            path: original.clone(),
            backup: backup.to_path_buf(),
            source,
        })?;

        tracing::debug!(path = %original.display(), "restored from backup");
        Ok(original)
    }

    pub fn journal_path(&self) -> PathBuf {
        self.root.join(JOURNAL_FILE)
    }

    /// Load the run journal; a missing journal is an empty one
    pub fn load_journal(&self) -> Result<RunJournal> {
        let path = self.journal_path();
        if !path.exists() {
            return Ok(RunJournal::default());
        }

        let json = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read journal: {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("Failed to parse journal: {}", path.display()))
    }

    /// Append a run to the journal and return its id
    pub fn record_run(&self, rule_set: &str, files: &[PathBuf]) -> Result<String> {
        let mut journal = self.load_journal()?;

        // Millisecond timestamp first so ids sort chronologically
        let id = format!(
            "{}-{}",
            Utc::now().format("%Y%m%d-%H%M%S%3f"),
            Uuid::new_v4().to_string().split_at(8).0
        );

        journal.runs.push(RunRecord {
            id: id.clone(),
            timestamp: Utc::now(),
            rule_set: rule_set.to_string(),
            files: files.to_vec(),
        });

        let path = self.journal_path();
        let json = serde_json::to_string_pretty(&journal).context("Failed to serialize journal")?;
        fs::write(&path, json).with_context(|| format!("Failed to write journal: {}", path.display()))?;

        Ok(id)
    }

    /// Delete the journal; returns whether one existed
    pub fn clear_journal(&self) -> Result<bool> {
        let path = self.journal_path();
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).with_context(|| format!("Failed to remove journal: {}", path.display()))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    /// Helper function to create a test file with content
    fn create_test_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let file_path = dir.join(name);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut file = File::create(&file_path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file_path
    }

    fn create_test_manager() -> (BackupManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let manager = BackupManager::new(temp_dir.path(), ".bak");
        (manager, temp_dir)
    }

    // ============================================================================
    // path mapping
    // ============================================================================

    #[test]
    fn test_backup_path_appends_suffix() {
        let (manager, _temp_dir) = create_test_manager();
        assert_eq!(
            manager.backup_path(Path::new("site/a.html")),
            PathBuf::from("site/a.html.bak")
        );
    }

    #[test]
    fn test_original_path_strips_only_trailing_suffix() {
        let (manager, _temp_dir) = create_test_manager();
        assert_eq!(
            manager.original_path(Path::new("site/a.bak.html.bak")),
            Some(PathBuf::from("site/a.bak.html"))
        );
        assert_eq!(manager.original_path(Path::new("site/a.html")), None);
        assert_eq!(manager.original_path(Path::new("site/.bak")), None);
    }

    // ============================================================================
    // create_backup() tests
    // ============================================================================

    #[test]
    fn test_create_backup_copies_content() {
        let (manager, temp_dir) = create_test_manager();
        let test_file = create_test_file(temp_dir.path(), "index.html", "<p>original</p>");

        let backup = manager.create_backup(&test_file).unwrap();

        assert_eq!(backup, temp_dir.path().join("index.html.bak"));
        assert_eq!(fs::read(&backup).unwrap(), fs::read(&test_file).unwrap());
    }

    #[test]
    fn test_create_backup_refuses_to_overwrite() {
        let (manager, temp_dir) = create_test_manager();
        let test_file = create_test_file(temp_dir.path(), "index.html", "second");
        create_test_file(temp_dir.path(), "index.html.bak", "first");

        let err = manager.create_backup(&test_file).unwrap_err();
        assert!(matches!(err, RewriteError::BackupExists { .. }));

        // The older backup is untouched
        assert_eq!(fs::read_to_string(temp_dir.path().join("index.html.bak")).unwrap(), "first");
    }

    #[test]
    fn test_create_backup_missing_original() {
        let (manager, temp_dir) = create_test_manager();
        let err = manager.create_backup(&temp_dir.path().join("gone.html")).unwrap_err();
        assert!(matches!(err, RewriteError::Backup { .. }));
        assert!(!temp_dir.path().join("gone.html.bak").exists());
    }

    // ============================================================================
    // find_backups() / restore_backup() tests
    // ============================================================================

    #[test]
    fn test_find_backups_sorted_and_filtered() {
        let (manager, temp_dir) = create_test_manager();
        create_test_file(temp_dir.path(), "b.html.bak", "b");
        create_test_file(temp_dir.path(), "a.html.bak", "a");
        create_test_file(temp_dir.path(), "deep/c.html.bak", "c");
        create_test_file(temp_dir.path(), "style.css.bak", "css");
        create_test_file(temp_dir.path(), "a.html", "a2");

        let backups = manager.find_backups("html").unwrap();
        let names: Vec<PathBuf> = backups
            .iter()
            .map(|p| p.strip_prefix(temp_dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.html.bak"),
                PathBuf::from("b.html.bak"),
                PathBuf::from("deep").join("c.html.bak"),
            ]
        );
    }

    #[test]
    fn test_find_backups_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let manager = BackupManager::new(temp_dir.path().join("missing"), ".bak");
        assert!(manager.find_backups("html").is_err());
    }

    #[test]
    fn test_restore_backup_success() {
        let (manager, temp_dir) = create_test_manager();
        let test_file = create_test_file(temp_dir.path(), "index.html", "original content");
        let backup = manager.create_backup(&test_file).unwrap();

        fs::write(&test_file, "modified content").unwrap();

        let restored = manager.restore_backup(&backup).unwrap();
        assert_eq!(restored, test_file);
        assert_eq!(fs::read_to_string(&test_file).unwrap(), "original content");
        assert!(!backup.exists(), "Backup should be removed after restore");
    }

    #[test]
    fn test_restore_backup_recreates_deleted_original() {
        let (manager, temp_dir) = create_test_manager();
        let test_file = create_test_file(temp_dir.path(), "index.html", "keep me");
        let backup = manager.create_backup(&test_file).unwrap();
        fs::remove_file(&test_file).unwrap();

        manager.restore_backup(&backup).unwrap();
        assert_eq!(fs::read_to_string(&test_file).unwrap(), "keep me");
    }

    #[test]
    fn test_restore_backup_missing_backup_fails() {
        let (manager, temp_dir) = create_test_manager();
        let err = manager
            .restore_backup(&temp_dir.path().join("ghost.html.bak"))
            .unwrap_err();
        assert!(matches!(err, RewriteError::Restore { .. }));
    }

    // ============================================================================
    // journal tests
    // ============================================================================

    #[test]
    fn test_load_journal_missing_is_empty() {
        let (manager, _temp_dir) = create_test_manager();
        let journal = manager.load_journal().unwrap();
        assert!(journal.runs.is_empty());
    }

    #[test]
    fn test_record_run_appends() {
        let (manager, temp_dir) = create_test_manager();
        let files = vec![temp_dir.path().join("a.html")];

        let id1 = manager.record_run("site", &files).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let id2 = manager.record_run("site", &files).unwrap();

        assert_ne!(id1, id2, "Run IDs should be unique");

        let journal = manager.load_journal().unwrap();
        assert_eq!(journal.runs.len(), 2);
        assert_eq!(journal.runs[0].id, id1);
        assert_eq!(journal.runs[1].id, id2);
        assert_eq!(journal.file_count(), 2);
        assert!(journal.runs[0].timestamp <= journal.runs[1].timestamp);
    }

    #[test]
    fn test_run_id_format() {
        let (manager, _temp_dir) = create_test_manager();
        let id = manager.record_run("site", &[]).unwrap();

        // YYYYMMDD-HHMMSSmmm-xxxxxxxx
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 8);
        assert_eq!(parts[1].len(), 9);
        assert_eq!(parts[2].len(), 8);
    }

    #[test]
    fn test_corrupt_journal_is_an_error() {
        let (manager, _temp_dir) = create_test_manager();
        fs::write(manager.journal_path(), "{ not json").unwrap();
        assert!(manager.load_journal().is_err());
    }

    #[test]
    fn test_clear_journal() {
        let (manager, _temp_dir) = create_test_manager();
        assert!(!manager.clear_journal().unwrap());

        manager.record_run("site", &[]).unwrap();
        assert!(manager.journal_path().exists());
        assert!(manager.clear_journal().unwrap());
        assert!(!manager.journal_path().exists());
    }
}
