use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "

License: MIT
Rust Edition: 2024"
);

#[derive(Parser)]
#[command(name = "pagemend")]
#[command(about = "Rewrite static HTML pages in place, with .bak backups and one-command restore")]
#[command(long_about = "pagemend fixes a known set of defects across a tree of static HTML pages.

It walks ROOT (the current directory by default), runs an ordered list of
idempotent text rules over every .html file, and rewrites only the files that
change. Each rewritten file is first copied to <file>.bak.

BUILT-IN RULES:
  • Remove the hardcoded <nav class=\"whispers\"> block
  • Normalize and inject the /components/nav-loader.js script tag
  • Fix known prose typos
  • Unwrap duplicated room-body / content-body wrappers
  • Collapse runs of blank lines

Files under a components/ directory and existing backups are never touched.

EXAMPLES:
  pagemend                       Rewrite pages under the current directory
  pagemend --dry-run             Show what would change, write nothing
  pagemend site/                 Rewrite pages under site/
  pagemend --restore             Undo: restore every .bak and delete it
  pagemend --rules fixes.toml    Use a custom rule set
  pagemend --print-rules         Show the built-in rule set")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_version = LONG_VERSION)]
struct Cli {
    /// Root directory to process (default: current directory)
    #[arg(value_name = "ROOT")]
    root: Option<PathBuf>,

    /// Restore every backup over its original and delete the backups
    #[arg(long)]
    restore: bool,

    /// Preview changes without backing up or writing anything
    #[arg(short = 'n', long, conflicts_with = "restore")]
    dry_run: bool,

    /// Number of context lines in dry-run diffs
    #[arg(long, value_name = "NUM", default_value_t = 2, requires = "dry_run")]
    context: usize,

    /// Use a TOML rule set instead of the built-in one
    #[arg(long, value_name = "FILE")]
    rules: Option<PathBuf>,

    /// Print the built-in rule set and exit
    #[arg(long, conflicts_with_all = ["restore", "dry_run", "rules"])]
    print_rules: bool,

    /// Log rule activity to stderr
    #[arg(short, long)]
    verbose: bool,
}

/// What the invocation asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Rewrite { dry_run: bool, context: usize },
    Restore,
    PrintRules,
}

#[derive(Debug, Clone)]
pub struct Args {
    pub root: PathBuf,
    pub rules: Option<PathBuf>,
    pub verbose: bool,
    pub mode: Mode,
}

impl From<Cli> for Args {
    fn from(cli: Cli) -> Self {
        let mode = if cli.print_rules {
            Mode::PrintRules
        } else if cli.restore {
            Mode::Restore
        } else {
            Mode::Rewrite {
                dry_run: cli.dry_run,
                context: cli.context,
            }
        };

        Args {
            root: cli.root.unwrap_or_else(|| PathBuf::from(".")),
            rules: cli.rules,
            verbose: cli.verbose,
            mode,
        }
    }
}

/// Parse the process arguments, exiting with usage on error
pub fn parse_args() -> Args {
    Cli::parse().into()
}

/// Parse an explicit argument list
pub fn try_parse_from<I, T>(args: I) -> Result<Args, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Cli::try_parse_from(args).map(Args::from)
}
