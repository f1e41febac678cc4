use anyhow::Result;
use pagemend::cli::{self, Args, Mode};
use pagemend::config::{self, RunConfig};
use pagemend::diff_formatter::DiffFormatter;
use pagemend::report::{FileOutcome, ReportFormatter};
use pagemend::{logger, restore_tree, rewrite_tree};

fn main() -> Result<()> {
    let args = cli::parse_args();
    logger::init_logging(args.verbose)?;

    let use_color = ReportFormatter::should_use_color();
    colored::control::set_override(use_color);

    match args.mode {
        Mode::PrintRules => {
            print!("{}", config::BUILTIN_RULES);
        }
        Mode::Rewrite { dry_run, context } => {
            rewrite(&args, dry_run, context, use_color)?;
        }
        Mode::Restore => {
            restore(&args, use_color)?;
        }
    }

    Ok(())
}

fn rewrite(args: &Args, dry_run: bool, context: usize, use_color: bool) -> Result<()> {
    let rule_set = config::resolve_rule_set(args.rules.as_deref())?;
    let run_config = RunConfig::new(&args.root).with_dry_run(dry_run);

    let report = rewrite_tree(&run_config, &rule_set)?;
    let formatter = ReportFormatter::new(use_color);

    if dry_run {
        for (path, outcome) in &report.entries {
            if let FileOutcome::WouldChange { original, rewritten, .. } = outcome {
                print!(
                    "{}",
                    DiffFormatter::format_preview(path, original, rewritten, context, use_color)
                );
            }
        }
    }

    print!("{}", formatter.format_run(&report, &rule_set.discovery.extension));
    Ok(())
}

fn restore(args: &Args, use_color: bool) -> Result<()> {
    let rule_set = config::resolve_rule_set(args.rules.as_deref())?;
    let run_config = RunConfig::new(&args.root);

    let report = restore_tree(&run_config, &rule_set)?;
    print!("{}", ReportFormatter::new(use_color).format_restore(&report));
    Ok(())
}
