//! pagemend: batch rewriter for static HTML pages
//!
//! The library holds every stage of a run (discovery, the rule pipeline,
//! per-file processing with backups, restore, reporting). The binary in
//! src/main.rs only parses arguments and prints.

pub mod backup_manager;
pub mod cli;
pub mod config;
pub mod diff_formatter;
pub mod discovery;
pub mod error;
pub mod error_helpers;
pub mod file_processor;
pub mod logger;
pub mod report;
pub mod rules;

// Re-export commonly used types for convenience
pub use backup_manager::{BackupManager, RunJournal, RunRecord};
pub use config::{DiscoveryConfig, RuleSet, RunConfig};
pub use error::{RewriteError, RuleError};
pub use file_processor::{FileProcessor, restore_tree, rewrite_tree};
pub use report::{FileOutcome, RestoreReport, RunReport, Tally};
pub use rules::{Pipeline, RuleSpec, Transformed};
