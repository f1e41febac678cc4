use colored::*;
use similar::{ChangeTag, TextDiff};
use std::path::Path;

pub struct DiffFormatter;

impl DiffFormatter {
    /// Unified diff of one dry-run rewrite, with a change summary
    pub fn format_preview(
        path: &Path,
        original: &str,
        rewritten: &str,
        context_size: usize,
        use_color: bool,
    ) -> String {
        let diff = TextDiff::from_lines(original, rewritten);
        let mut output = String::new();

        let shown = path.display().to_string();
        if use_color {
            output.push_str(&format!("{}\n", shown.bold().cyan()));
        } else {
            output.push_str(&format!("{}\n", shown));
        }

        for hunk in diff.unified_diff().context_radius(context_size).iter_hunks() {
            let header = hunk.header().to_string();
            if use_color {
                output.push_str(&format!("{}\n", header.dimmed()));
            } else {
                output.push_str(&format!("{}\n", header));
            }

            for change in hunk.iter_changes() {
                let tag = change.tag();
                let sign = match tag {
                    ChangeTag::Delete => "-",
                    ChangeTag::Insert => "+",
                    ChangeTag::Equal => " ",
                };
                let content = change.value().trim_end_matches(['\n', '\r']);
                let line = format!("{}{}", sign, content);

                if use_color {
                    let colored_line = match tag {
                        ChangeTag::Delete => line.red().to_string(),
                        ChangeTag::Insert => line.green().bold().to_string(),
                        ChangeTag::Equal => line.dimmed().to_string(),
                    };
                    output.push_str(&colored_line);
                } else {
                    output.push_str(&line);
                }
                output.push('\n');

                if change.missing_newline() {
                    output.push_str("\\ No newline at end of file\n");
                }
            }
        }

        // Summary
        let added = diff.iter_all_changes().filter(|c| c.tag() == ChangeTag::Insert).count();
        let deleted = diff.iter_all_changes().filter(|c| c.tag() == ChangeTag::Delete).count();
        let summary = format!("{} line(s) added, {} line(s) removed", added, deleted);
        if use_color {
            output.push_str(&format!("{}\n\n", summary.bold()));
        } else {
            output.push_str(&format!("{}\n\n", summary));
        }

        output
    }
}
