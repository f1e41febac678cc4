//! File-set discovery
//!
//! Walks the root directory and collects the pages a run should look at.

use anyhow::Result;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::config::DiscoveryConfig;

/// Fail early when the root cannot be enumerated at all
pub fn ensure_root(root: &Path) -> Result<()> {
    if !root.exists() {
        anyhow::bail!("Root directory not found: {}", root.display());
    }
    if !root.is_dir() {
        anyhow::bail!("Root is not a directory: {}", root.display());
    }
    Ok(())
}

fn is_excluded_dir(entry: &DirEntry, config: &DiscoveryConfig) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| config.exclude_dirs.iter().any(|d| d == name))
}

/// Whether a file name is a page to rewrite (right extension, not a backup)
pub fn is_candidate_name(file_name: &OsStr, config: &DiscoveryConfig) -> bool {
    let Some(name) = file_name.to_str() else {
        return false;
    };

    if name.contains(config.backup_suffix.as_str()) {
        return false;
    }

    Path::new(name)
        .extension()
        .is_some_and(|ext| ext == OsStr::new(&config.extension))
}

/// Every candidate page under `root`, sorted lexicographically
///
/// Excluded directories are pruned without being descended into. Entries
/// that cannot be read are skipped with a warning.
pub fn discover(root: &Path, config: &DiscoveryConfig) -> Result<Vec<PathBuf>> {
    ensure_root(root)?;

    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_excluded_dir(e, config));

    for entry in walker {
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

        if is_candidate_name(entry.file_name(), config) {
            files.push(entry.into_path());
        } else {
            tracing::trace!(path = %entry.path().display(), "not a candidate");
        }
    }

    files.sort();
    tracing::debug!(root = %root.display(), count = files.len(), "discovery finished");

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) -> PathBuf {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, "<html></html>").unwrap();
        path
    }

    fn relative(root: &Path, files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_discover_sorted_html_only() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "b.html");
        touch(temp_dir.path(), "a.html");
        touch(temp_dir.path(), "books/one/index.html");
        touch(temp_dir.path(), "style.css");
        touch(temp_dir.path(), "notes.htm");

        let files = discover(temp_dir.path(), &DiscoveryConfig::default()).unwrap();
        assert_eq!(
            relative(temp_dir.path(), &files),
            vec!["a.html", "b.html", "books/one/index.html"]
        );
    }

    #[test]
    fn test_discover_skips_backups() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "a.html");
        touch(temp_dir.path(), "a.html.bak");
        touch(temp_dir.path(), "old.bak.html");

        let files = discover(temp_dir.path(), &DiscoveryConfig::default()).unwrap();
        assert_eq!(relative(temp_dir.path(), &files), vec!["a.html"]);
    }

    #[test]
    fn test_discover_skips_excluded_dir_at_any_depth() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "index.html");
        touch(temp_dir.path(), "components/nav.html");
        touch(temp_dir.path(), "books/components/footer.html");
        touch(temp_dir.path(), "components-old/page.html");

        let files = discover(temp_dir.path(), &DiscoveryConfig::default()).unwrap();
        assert_eq!(
            relative(temp_dir.path(), &files),
            vec!["components-old/page.html", "index.html"]
        );
    }

    #[test]
    fn test_root_named_like_excluded_dir_is_still_walked() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("components");
        touch(&root, "page.html");

        let files = discover(&root, &DiscoveryConfig::default()).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_discover_missing_root_fails() {
        let temp_dir = TempDir::new().unwrap();
        let err = discover(&temp_dir.path().join("nope"), &DiscoveryConfig::default()).unwrap_err();
        assert!(err.to_string().contains("Root directory not found"));
    }

    #[test]
    fn test_discover_file_root_fails() {
        let temp_dir = TempDir::new().unwrap();
        let file = touch(temp_dir.path(), "a.html");
        assert!(discover(&file, &DiscoveryConfig::default()).is_err());
    }

    #[test]
    fn test_custom_extension() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "a.html");
        touch(temp_dir.path(), "b.htm");

        let config = DiscoveryConfig {
            extension: "htm".to_string(),
            ..DiscoveryConfig::default()
        };
        let files = discover(temp_dir.path(), &config).unwrap();
        assert_eq!(relative(temp_dir.path(), &files), vec!["b.htm"]);
    }
}
