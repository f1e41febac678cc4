//! Run reports and their console rendering

use colored::*;
use std::path::{Path, PathBuf};

use crate::error::RewriteError;
use crate::error_helpers::hint_for;

/// Where one file ended up in the forward state machine
#[derive(Debug)]
pub enum FileOutcome {
    /// Backed up and rewritten
    Changed { fired: Vec<String> },
    /// Dry run: the pipeline would change the file
    WouldChange {
        fired: Vec<String>,
        original: String,
        rewritten: String,
    },
    /// No rule changed anything
    Unchanged,
    Errored(RewriteError),
}

/// Outcome of every discovered file in a forward run
#[derive(Debug, Default)]
pub struct RunReport {
    pub dry_run: bool,
    pub rule_set: String,
    pub entries: Vec<(PathBuf, FileOutcome)>,
    /// Journal id, when the run was recorded
    pub run_id: Option<String>,
}

/// Outcome counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub changed: usize,
    pub would_change: usize,
    pub unchanged: usize,
    pub errored: usize,
}

impl RunReport {
    pub fn new(rule_set: impl Into<String>, dry_run: bool) -> Self {
        Self {
            dry_run,
            rule_set: rule_set.into(),
            entries: Vec::new(),
            run_id: None,
        }
    }

    pub fn push(&mut self, path: PathBuf, outcome: FileOutcome) {
        self.entries.push((path, outcome));
    }

    pub fn found(&self) -> usize {
        self.entries.len()
    }

    pub fn tally(&self) -> Tally {
        let mut tally = Tally::default();
        for (_, outcome) in &self.entries {
            match outcome {
                FileOutcome::Changed { .. } => tally.changed += 1,
                FileOutcome::WouldChange { .. } => tally.would_change += 1,
                FileOutcome::Unchanged => tally.unchanged += 1,
                FileOutcome::Errored(_) => tally.errored += 1,
            }
        }
        tally
    }

    /// Paths that were backed up and rewritten
    pub fn changed_files(&self) -> Vec<PathBuf> {
        self.entries
            .iter()
            .filter(|(_, o)| matches!(o, FileOutcome::Changed { .. }))
            .map(|(p, _)| p.clone())
            .collect()
    }
}

/// Outcome of every backup found by a restore run
#[derive(Debug, Default)]
pub struct RestoreReport {
    /// Backup path and either the restored original or the failure
    pub entries: Vec<(PathBuf, Result<PathBuf, RewriteError>)>,
    pub journal_cleared: bool,
}

impl RestoreReport {
    pub fn restored(&self) -> usize {
        self.entries.iter().filter(|(_, r)| r.is_ok()).count()
    }

    pub fn errored(&self) -> usize {
        self.entries.iter().filter(|(_, r)| r.is_err()).count()
    }
}

/// Renders reports as the human-readable console summary
pub struct ReportFormatter {
    use_color: bool,
}

impl ReportFormatter {
    pub fn new(use_color: bool) -> Self {
        Self { use_color }
    }

    /// Auto-detect if we should use colors
    pub fn should_use_color() -> bool {
        use std::io::IsTerminal;

        // Check NO_COLOR env var (https://no-color.org/)
        if std::env::var_os("NO_COLOR").is_some() {
            return false;
        }

        std::io::stdout().is_terminal()
    }

    fn paint(&self, text: &str, style: fn(ColoredString) -> ColoredString) -> String {
        if self.use_color {
            style(text.normal()).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn format_found(&self, report: &RunReport, extension: &str) -> String {
        format!("Found {} .{} files\n", report.found(), extension)
    }

    /// One status line per file (plus an indented hint for some errors)
    pub fn format_status_line(&self, path: &Path, outcome: &FileOutcome) -> String {
        let shown = path.display().to_string();
        match outcome {
            FileOutcome::Changed { .. } => {
                format!("  ✅ {} {}\n", self.paint("Updated:", |s| s.green().bold()), shown)
            }
            FileOutcome::WouldChange { fired, .. } => format!(
                "  ~ {} {} ({})\n",
                self.paint("Would update:", |s| s.yellow().bold()),
                shown,
                fired.join(", ")
            ),
            FileOutcome::Unchanged => {
                format!("  ── {} {}\n", self.paint("No changes:", |s| s.dimmed()), shown)
            }
            FileOutcome::Errored(err) => {
                let mut line = format!(
                    "  ❌ {} {}: {}\n",
                    self.paint("Error on", |s| s.red().bold()),
                    shown,
                    err
                );
                if let Some(hint) = hint_for(err) {
                    for hint_line in hint.lines() {
                        line.push_str(&format!("       {}\n", hint_line));
                    }
                }
                line
            }
        }
    }

    pub fn format_summary(&self, report: &RunReport) -> String {
        let tally = report.tally();
        let mut out = String::new();

        out.push_str(&format!("\n{}\n", "=".repeat(50)));
        out.push_str(&format!("Rule set:  {}\n", report.rule_set));
        if report.dry_run {
            out.push_str(&format!("Would update: {} files\n", tally.would_change));
        } else {
            out.push_str(&format!("Updated:   {} files\n", tally.changed));
        }
        out.push_str(&format!("Unchanged: {} files\n", tally.unchanged));
        let errors = format!("Errors:    {} files", tally.errored);
        if tally.errored > 0 {
            out.push_str(&self.paint(&errors, |s| s.red().bold()));
        } else {
            out.push_str(&errors);
        }
        out.push('\n');

        if report.dry_run {
            out.push_str("\nDry run: nothing was written. Run without --dry-run to apply.\n");
            return out;
        }

        if tally.changed > 0 {
            out.push_str("\nBackups created as *.bak next to each updated file.\n");
            out.push_str("Review, then delete .bak files when happy.\n");
            if let Some(id) = &report.run_id {
                out.push_str(&format!("Run ID: {}\n", id));
            }
        }
        out.push_str(&format!("\nTo undo: {}\n", self.paint("pagemend --restore", |s| s.cyan())));
        out
    }

    /// Full forward-run output: header, per-file lines, summary
    pub fn format_run(&self, report: &RunReport, extension: &str) -> String {
        let mut out = self.format_found(report, extension);
        out.push('\n');
        for (path, outcome) in &report.entries {
            out.push_str(&self.format_status_line(path, outcome));
        }
        out.push_str(&self.format_summary(report));
        out
    }

    pub fn format_restore(&self, report: &RestoreReport) -> String {
        let mut out = String::new();
        for (backup, result) in &report.entries {
            match result {
                Ok(original) => out.push_str(&format!("  Restored: {}\n", original.display())),
                Err(err) => out.push_str(&format!(
                    "  ❌ {} {}: {}\n",
                    self.paint("Error on", |s| s.red().bold()),
                    backup.display(),
                    err
                )),
            }
        }
        out.push_str(&format!("\nRestored {} files\n", report.restored()));
        if report.errored() > 0 {
            out.push_str(&self.paint(
                &format!("Failed to restore {} files (their backups were kept)", report.errored()),
                |s| s.red().bold(),
            ));
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn sample_report() -> RunReport {
        let mut report = RunReport::new("site", false);
        report.push(PathBuf::from("a.html"), FileOutcome::Changed { fired: vec!["nav".into()] });
        report.push(PathBuf::from("b.html"), FileOutcome::Unchanged);
        report.push(PathBuf::from("c.html"), FileOutcome::Unchanged);
        report.push(
            PathBuf::from("d.html"),
            FileOutcome::Errored(RewriteError::Write {
                path: PathBuf::from("d.html"),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
            }),
        );
        report
    }

    #[test]
    fn test_tally() {
        let tally = sample_report().tally();
        assert_eq!(
            tally,
            Tally {
                changed: 1,
                would_change: 0,
                unchanged: 2,
                errored: 1
            }
        );
    }

    #[test]
    fn test_changed_files() {
        assert_eq!(sample_report().changed_files(), vec![PathBuf::from("a.html")]);
    }

    #[test]
    fn test_format_run_plain() {
        let formatter = ReportFormatter::new(false);
        let out = formatter.format_run(&sample_report(), "html");

        assert!(out.starts_with("Found 4 .html files\n"));
        assert!(out.contains("  ✅ Updated: a.html\n"));
        assert!(out.contains("  ── No changes: b.html\n"));
        assert!(out.contains("  ❌ Error on d.html: failed to write d.html: denied\n"));
        assert!(out.contains("Possible fixes"));
        assert!(out.contains("Rule set:  site\n"));
        assert!(out.contains("Updated:   1 files\n"));
        assert!(out.contains("Unchanged: 2 files\n"));
        assert!(out.contains("Errors:    1 files\n"));
        assert!(out.contains("To undo: pagemend --restore"));
    }

    #[test]
    fn test_format_dry_run_summary() {
        let mut report = RunReport::new("site", true);
        report.push(
            PathBuf::from("a.html"),
            FileOutcome::WouldChange {
                fired: vec!["whispers-nav".into(), "nav-loader-script".into()],
                original: "a".into(),
                rewritten: "b".into(),
            },
        );
        let out = ReportFormatter::new(false).format_run(&report, "html");
        assert!(out.contains("~ Would update: a.html (whispers-nav, nav-loader-script)"));
        assert!(out.contains("Would update: 1 files"));
        assert!(out.contains("nothing was written"));
        assert!(!out.contains("To undo"));
    }

    #[test]
    fn test_format_restore() {
        let report = RestoreReport {
            entries: vec![
                (PathBuf::from("a.html.bak"), Ok(PathBuf::from("a.html"))),
                (
                    PathBuf::from("b.html.bak"),
                    Err(RewriteError::Restore {
                        path: PathBuf::from("b.html"),
                        backup: PathBuf::from("b.html.bak"),
                        source: io::Error::other("boom"),
                    }),
                ),
            ],
            journal_cleared: false,
        };
        assert_eq!(report.restored(), 1);
        assert_eq!(report.errored(), 1);

        let out = ReportFormatter::new(false).format_restore(&report);
        assert!(out.contains("  Restored: a.html\n"));
        assert!(out.contains("Restored 1 files"));
        assert!(out.contains("Failed to restore 1 files"));
    }
}
