//! Rewrite rules and the pipeline that runs them
//!
//! Rules are declared as [`RuleSpec`] values (usually deserialized from the
//! rule-set TOML), validated, and compiled into a [`Pipeline`]. Validation
//! rejects every rule shape that could make the pipeline non-idempotent.

use regex::{Captures, Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::{DefaultHasher, Hash, Hasher};

use crate::error::RuleError;

/// Passes allowed on top of one per byte of input
const MIN_PASSES: usize = 8;

/// A rule as written in the rule-set document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleSpec {
    /// Delete every `start ... end` region, across lines
    RemoveRegion {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        start: String,
        end: String,
        /// Swallow at most one line break on each side of the region
        #[serde(default = "default_true")]
        absorb_newlines: bool,
    },

    /// Insert `fragment` before the first `anchor` unless `unless_present` is found
    InsertBefore {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        anchor: String,
        fragment: String,
        unless_present: String,
    },

    /// Rewrite every variant to the canonical form
    Normalize {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        variants: Vec<String>,
        canonical: String,
        /// Keep only the first occurrence of the canonical form
        #[serde(default = "default_true")]
        collapse_duplicates: bool,
    },

    /// Exact substring replacement
    Replace {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        from: String,
        to: String,
    },

    /// Regex substitution with `${n}` capture expansion
    Pattern {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        regex: String,
        replacement: String,
        #[serde(default)]
        multi_line: bool,
        #[serde(default)]
        dot_matches_newline: bool,
    },

    /// Remove headings inside `container` that repeat the page title's text
    DropDuplicateHeading {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        container: String,
        title_class: String,
        #[serde(default = "default_heading_tag")]
        tag: String,
    },

    /// Collapse three or more consecutive line breaks to two
    CollapseBlankLines {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

fn default_true() -> bool { true }
fn default_heading_tag() -> String { "h1".to_string() }

impl RuleSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            RuleSpec::RemoveRegion { .. } => "remove_region",
            RuleSpec::InsertBefore { .. } => "insert_before",
            RuleSpec::Normalize { .. } => "normalize",
            RuleSpec::Replace { .. } => "replace",
            RuleSpec::Pattern { .. } => "pattern",
            RuleSpec::DropDuplicateHeading { .. } => "drop_duplicate_heading",
            RuleSpec::CollapseBlankLines { .. } => "collapse_blank_lines",
        }
    }

    fn explicit_name(&self) -> Option<&str> {
        match self {
            RuleSpec::RemoveRegion { name, .. }
            | RuleSpec::InsertBefore { name, .. }
            | RuleSpec::Normalize { name, .. }
            | RuleSpec::Replace { name, .. }
            | RuleSpec::Pattern { name, .. }
            | RuleSpec::DropDuplicateHeading { name, .. }
            | RuleSpec::CollapseBlankLines { name } => name.as_deref(),
        }
    }

    /// Display name: the explicit one, or `<kind>#<position>`
    pub fn display_name(&self, index: usize) -> String {
        match self.explicit_name() {
            Some(name) => name.to_string(),
            None => format!("{}#{}", self.kind(), index + 1),
        }
    }
}

/// A validated rule, ready to run
#[derive(Debug, Clone)]
enum Rule {
    RemoveRegion { re: Regex, absorb_newlines: bool },
    InsertBefore { anchor: String, fragment: String, unless_present: String },
    Normalize { re: Regex, canonical: String, collapse_duplicates: bool },
    Replace { from: String, to: String },
    Pattern { re: Regex, replacement: String },
    DropDuplicateHeading { container: String, title_re: Regex, heading_re: Regex },
    CollapseBlankLines { re: Regex },
}

#[derive(Debug, Clone)]
struct CompiledRule {
    name: String,
    rule: Rule,
}

/// Result of running the pipeline over one document
#[derive(Debug, Clone, PartialEq)]
pub struct Transformed {
    pub text: String,
    /// Names of the rules that changed the text, in order of first change
    pub fired: Vec<String>,
}

impl Transformed {
    pub fn changed(&self) -> bool {
        !self.fired.is_empty()
    }
}

/// The ordered list of compiled rules
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    rules: Vec<CompiledRule>,
}

impl Pipeline {
    /// Validate and compile rules, keeping their order
    pub fn compile(specs: &[RuleSpec]) -> Result<Self, RuleError> {
        let rules = specs
            .iter()
            .enumerate()
            .map(|(index, spec)| {
                let name = spec.display_name(index);
                let rule = compile_rule(&name, spec)?;
                Ok(CompiledRule { name, rule })
            })
            .collect::<Result<Vec<_>, RuleError>>()?;

        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.name.as_str())
    }

    /// Run every rule over `text`, in order, until a pass changes nothing
    ///
    /// A removal late in the list can expose text an earlier rule matches, and
    /// nested markers need one pass per level, so passes repeat until a fixed
    /// point: `apply(apply(x)) == apply(x)`. Every changing pass rewrites at
    /// least one byte, so shrinking rule sets settle within the
    /// `MIN_PASSES + text.len()` bound. A custom rule set that cycles is
    /// stopped when a pass ends on text seen before.
    pub fn apply(&self, text: &str) -> Transformed {
        let mut current = text.to_string();
        let mut fired: Vec<String> = Vec::new();
        let mut seen = HashSet::from([fingerprint(&current)]);
        let max_passes = MIN_PASSES + text.len();

        for pass in 1..=max_passes {
            let mut pass_changed = false;

            for compiled in &self.rules {
                let next = compiled.rule.apply(&current);
                if next != current {
                    tracing::debug!(rule = %compiled.name, pass, "rule changed document");
                    if !fired.contains(&compiled.name) {
                        fired.push(compiled.name.clone());
                    }
                    current = next;
                    pass_changed = true;
                }
            }

            if !pass_changed {
                return Transformed { text: current, fired };
            }

            if !seen.insert(fingerprint(&current)) {
                tracing::warn!(pass, "rules cycle; output may change on the next run");
                return Transformed { text: current, fired };
            }
        }

        tracing::warn!(passes = max_passes, "rules did not settle; output may change on the next run");
        Transformed { text: current, fired }
    }
}

fn fingerprint(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

fn invalid(name: &str, reason: impl Into<String>) -> RuleError {
    RuleError::Invalid {
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn build_regex(name: &str, pattern: &str, multi_line: bool, dot_all: bool) -> Result<Regex, RuleError> {
    RegexBuilder::new(pattern)
        .multi_line(multi_line)
        .dot_matches_new_line(dot_all)
        .build()
        .map_err(|source| RuleError::InvalidRegex {
            name: name.to_string(),
            source,
        })
}

fn compile_rule(name: &str, spec: &RuleSpec) -> Result<Rule, RuleError> {
    match spec {
        RuleSpec::RemoveRegion { start, end, absorb_newlines, .. } => {
            if start.is_empty() || end.is_empty() {
                return Err(invalid(name, "start and end markers must not be empty"));
            }
            let body = format!("{}.*?{}", regex::escape(start), regex::escape(end));
            let pattern = if *absorb_newlines {
                format!("(\n?){}(\n?)", body)
            } else {
                body
            };
            let re = build_regex(name, &pattern, false, true)?;
            Ok(Rule::RemoveRegion { re, absorb_newlines: *absorb_newlines })
        }

        RuleSpec::InsertBefore { anchor, fragment, unless_present, .. } => {
            if anchor.is_empty() || unless_present.is_empty() {
                return Err(invalid(name, "anchor and unless_present must not be empty"));
            }
            // The presence check only makes the rule a no-op on the second run
            // if the inserted text itself satisfies it.
            if !fragment.contains(unless_present.as_str()) {
                return Err(invalid(
                    name,
                    format!("fragment must contain the unless_present marker '{}'", unless_present),
                ));
            }
            Ok(Rule::InsertBefore {
                anchor: anchor.clone(),
                fragment: fragment.clone(),
                unless_present: unless_present.clone(),
            })
        }

        RuleSpec::Normalize { variants, canonical, collapse_duplicates, .. } => {
            if canonical.is_empty() {
                return Err(invalid(name, "canonical form must not be empty"));
            }
            if variants.is_empty() {
                return Err(invalid(name, "at least one variant is required"));
            }
            for variant in variants {
                if variant.is_empty() {
                    return Err(invalid(name, "variants must not be empty"));
                }
                if canonical.contains(variant.as_str()) {
                    return Err(invalid(
                        name,
                        format!("variant '{}' occurs inside the canonical form", variant),
                    ));
                }
            }

            // Longest first so a variant never loses to one of its own prefixes.
            let mut sorted: Vec<&String> = variants.iter().collect();
            sorted.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
            let alternation = sorted
                .iter()
                .map(|v| regex::escape(v))
                .collect::<Vec<_>>()
                .join("|");
            let re = build_regex(name, &alternation, false, false)?;

            Ok(Rule::Normalize {
                re,
                canonical: canonical.clone(),
                collapse_duplicates: *collapse_duplicates,
            })
        }

        RuleSpec::Replace { from, to, .. } => {
            if from.is_empty() {
                return Err(invalid(name, "'from' must not be empty"));
            }
            if to.contains(from.as_str()) {
                return Err(invalid(name, "'to' contains 'from', so the replacement would repeat on every run"));
            }
            Ok(Rule::Replace { from: from.clone(), to: to.clone() })
        }

        RuleSpec::Pattern { regex, replacement, multi_line, dot_matches_newline, .. } => {
            if regex.is_empty() {
                return Err(invalid(name, "regex must not be empty"));
            }
            let re = build_regex(name, regex, *multi_line, *dot_matches_newline)?;
            Ok(Rule::Pattern { re, replacement: replacement.clone() })
        }

        RuleSpec::DropDuplicateHeading { container, title_class, tag, .. } => {
            if container.is_empty() || title_class.is_empty() {
                return Err(invalid(name, "container and title_class must not be empty"));
            }
            if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(invalid(name, format!("invalid heading tag '{}'", tag)));
            }
            let tag = regex::escape(tag);
            let title_pattern = format!(
                r#"<{tag}\s[^>]*\bclass="(?:[^"]*\s)?{class}(?:\s[^"]*)?"[^>]*>(.*?)</{tag}>"#,
                tag = tag,
                class = regex::escape(title_class),
            );
            let title_re = build_regex(name, &title_pattern, false, true)?;
            let heading_re = build_regex(name, &format!("<{tag}>(.*?)</{tag}>", tag = tag), false, true)?;
            Ok(Rule::DropDuplicateHeading {
                container: container.clone(),
                title_re,
                heading_re,
            })
        }

        RuleSpec::CollapseBlankLines { .. } => {
            let re = build_regex(name, r"\n{3,}", false, false)?;
            Ok(Rule::CollapseBlankLines { re })
        }
    }
}

impl Rule {
    fn apply(&self, text: &str) -> String {
        match self {
            Rule::RemoveRegion { re, absorb_newlines } => {
                if *absorb_newlines {
                    re.replace_all(text, |caps: &Captures| {
                        let before = caps.get(1).is_some_and(|m| !m.is_empty());
                        let after = caps.get(2).is_some_and(|m| !m.is_empty());
                        if before || after { "\n" } else { "" }
                    })
                    .into_owned()
                } else {
                    re.replace_all(text, "").into_owned()
                }
            }

            Rule::InsertBefore { anchor, fragment, unless_present } => {
                if text.contains(unless_present.as_str()) {
                    return text.to_string();
                }
                match text.find(anchor.as_str()) {
                    Some(at) => {
                        let mut out = String::with_capacity(text.len() + fragment.len());
                        out.push_str(&text[..at]);
                        out.push_str(fragment);
                        out.push_str(&text[at..]);
                        out
                    }
                    None => text.to_string(),
                }
            }

            Rule::Normalize { re, canonical, collapse_duplicates } => {
                let normalized = re.replace_all(text, regex::NoExpand(canonical.as_str())).into_owned();
                if *collapse_duplicates {
                    keep_first_occurrence(&normalized, canonical)
                } else {
                    normalized
                }
            }

            Rule::Replace { from, to } => text.replace(from.as_str(), to),

            Rule::Pattern { re, replacement } => re.replace_all(text, replacement.as_str()).into_owned(),

            Rule::DropDuplicateHeading { container, title_re, heading_re } => {
                drop_duplicate_headings(text, container, title_re, heading_re)
            }

            Rule::CollapseBlankLines { re } => re.replace_all(text, "\n\n").into_owned(),
        }
    }
}

/// Byte range to delete for `start..end`, widened to the whole line
/// (including its line break) when nothing but whitespace shares the line.
fn removal_span(text: &str, start: usize, end: usize) -> (usize, usize) {
    let line_start = text[..start].rfind('\n').map_or(0, |i| i + 1);
    let line_end = text[end..].find('\n').map_or(text.len(), |i| end + i);

    let alone = text[line_start..start].trim().is_empty() && text[end..line_end].trim().is_empty();
    if !alone {
        return (start, end);
    }

    if line_end < text.len() {
        (line_start, line_end + 1)
    } else if line_start > 0 {
        // Last line without a trailing break: take the preceding break instead.
        (line_start - 1, line_end)
    } else {
        (line_start, line_end)
    }
}

/// Delete the given non-overlapping, ascending spans from `text`
fn remove_spans(text: &str, spans: &[(usize, usize)]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for &(start, end) in spans {
        let start = start.max(cursor);
        if start >= end {
            continue;
        }
        out.push_str(&text[cursor..start]);
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}

fn keep_first_occurrence(text: &str, needle: &str) -> String {
    let spans: Vec<(usize, usize)> = text
        .match_indices(needle)
        .skip(1)
        .map(|(at, m)| removal_span(text, at, at + m.len()))
        .collect();

    if spans.is_empty() {
        return text.to_string();
    }
    remove_spans(text, &spans)
}

fn drop_duplicate_headings(text: &str, container: &str, title_re: &Regex, heading_re: &Regex) -> String {
    let Some(title) = title_re.captures(text).and_then(|c| c.get(1)) else {
        return text.to_string();
    };
    let title_text = title.as_str().trim();
    if title_text.is_empty() {
        return text.to_string();
    }

    let Some(container_at) = text.find(container) else {
        return text.to_string();
    };
    let body_start = container_at + container.len();

    let spans: Vec<(usize, usize)> = heading_re
        .captures_iter(&text[body_start..])
        .filter(|caps| caps.get(1).is_some_and(|m| m.as_str().trim() == title_text))
        .filter_map(|caps| caps.get(0))
        .map(|m| removal_span(text, body_start + m.start(), body_start + m.end()))
        .collect();

    if spans.is_empty() {
        return text.to_string();
    }
    remove_spans(text, &spans)
}
