//! Rule-set configuration for pagemend
//!
//! A rule set is a TOML document naming the files to discover and the ordered
//! rules to run over them. The built-in set ships inside the binary; `--rules`
//! swaps in another document with the same shape.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::rules::{Pipeline, RuleSpec};

/// The rule set used when no `--rules` file is given
pub const BUILTIN_RULES: &str = include_str!("../rules/site.toml");

/// A named, ordered list of rules plus the discovery settings they apply to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    pub name: String,

    /// Which files a run looks at
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Rules, applied in document order
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveryConfig {
    /// File extension to rewrite, without the leading dot
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Directory names whose contents are never discovered
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,

    /// Suffix appended to a file path to form its backup path
    #[serde(default = "default_backup_suffix")]
    pub backup_suffix: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            exclude_dirs: default_exclude_dirs(),
            backup_suffix: default_backup_suffix(),
        }
    }
}

// Default functions for serde
fn default_extension() -> String { "html".to_string() }
fn default_exclude_dirs() -> Vec<String> { vec!["components".to_string()] }
fn default_backup_suffix() -> String { ".bak".to_string() }

/// Per-run settings handed to discovery, processing and restore
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Directory every discovery and restore scan starts from
    pub root: PathBuf,
    /// Report what would change without backing up or writing anything
    pub dry_run: bool,
}

impl RunConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

impl RuleSet {
    /// Compile the rules into a pipeline, validating each one
    pub fn compile(&self) -> Result<Pipeline> {
        Pipeline::compile(&self.rules)
            .with_context(|| format!("Invalid rule set '{}'", self.name))
    }
}

/// Parse and validate a rule-set document
pub fn parse_rule_set(text: &str) -> Result<RuleSet> {
    let rule_set: RuleSet = toml::from_str(text).context("Failed to parse rule set")?;
    validate_rule_set(&rule_set)?;
    Ok(rule_set)
}

/// The rule set compiled into the binary
pub fn builtin_rule_set() -> Result<RuleSet> {
    parse_rule_set(BUILTIN_RULES).context("Built-in rule set is invalid")
}

/// Load a rule set from a TOML file
pub fn load_rule_set(path: &Path) -> Result<RuleSet> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read rule set: {}", path.display()))?;

    parse_rule_set(&text).with_context(|| format!("In rule set file {}", path.display()))
}

/// Use the rule set at `path` if one was given, the built-in one otherwise
pub fn resolve_rule_set(path: Option<&Path>) -> Result<RuleSet> {
    match path {
        Some(path) => load_rule_set(path),
        None => builtin_rule_set(),
    }
}

/// Validate configuration values
///
/// Rules are compiled here too, so a bad regex or a non-idempotent
/// replacement is caught before any file is touched.
pub fn validate_rule_set(rule_set: &RuleSet) -> Result<()> {
    if rule_set.name.trim().is_empty() {
        anyhow::bail!("Rule set name must not be empty");
    }

    let discovery = &rule_set.discovery;

    if discovery.extension.is_empty() || discovery.extension.starts_with('.') {
        anyhow::bail!(
            "Invalid extension: '{}' (give it without the leading dot, e.g. 'html')",
            discovery.extension
        );
    }

    if !discovery.backup_suffix.starts_with('.') || discovery.backup_suffix.len() < 2 {
        anyhow::bail!(
            "Invalid backup_suffix: '{}' (must start with '.', e.g. '.bak')",
            discovery.backup_suffix
        );
    }

    if discovery.backup_suffix == format!(".{}", discovery.extension) {
        anyhow::bail!("backup_suffix must differ from the rewritten extension");
    }

    for dir in &discovery.exclude_dirs {
        if dir.is_empty() || dir.contains('/') || dir.contains('\\') {
            anyhow::bail!("Invalid exclude_dirs entry: '{}' (must be a single directory name)", dir);
        }
    }

    rule_set.compile()?;

    Ok(())
}
