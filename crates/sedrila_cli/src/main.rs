//! Command-line interface for building self-study course websites.
//!
//! Provides `sedrila author` to build the student and instructor variants of
//! a course and `sedrila cache-info` to inspect a build cache file.

#![warn(missing_docs)]

mod author;
mod cache_info;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the log filter.
const LOG_ENV: &str = "SEDRILA_LOG";

/// Sedrila course website builder.
#[derive(Parser, Debug)]
#[command(name = "sedrila", version, about = "Self-study course builder")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to a custom `sedrila.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the course website into a target directory.
    Author(AuthorArgs),
    /// Show what a build cache file contains.
    CacheInfo(CacheInfoArgs),
}

/// Arguments for the `sedrila author` subcommand.
#[derive(Parser, Debug)]
pub struct AuthorArgs {
    /// Target directory of the student website.
    pub targetdir: PathBuf,

    /// Ignore the build cache and rebuild everything.
    #[arg(long)]
    pub clean: bool,

    /// Also publish parts of this stage and all later ones.
    #[arg(long)]
    pub include_stage: Option<String>,

    /// Output format for diagnostics and the build summary.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Arguments for the `sedrila cache-info` subcommand.
#[derive(Parser, Debug)]
pub struct CacheInfoArgs {
    /// The cache file, usually `<targetdir>/instructor/.sedrila_cache`.
    pub cachefile: PathBuf,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Controls whether colored output is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect from terminal capabilities.
    Auto,
    /// Always produce colored output.
    Always,
    /// Never produce colored output.
    Never,
}

/// Diagnostic output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Whether to use colored output.
    pub color: bool,
    /// Optional path to a custom config file.
    pub config: Option<PathBuf>,
    /// Whether log events are emitted as JSON lines.
    pub json_logs: bool,
}

impl GlobalArgs {
    /// The log filter used when `SEDRILA_LOG` is not set.
    fn default_log_filter(&self) -> &'static str {
        if self.quiet {
            "error"
        } else if self.verbose {
            "debug"
        } else {
            "warn"
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let color = match cli.color {
        ColorChoice::Auto => atty_is_terminal(),
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let json_logs = matches!(&cli.command, Command::Author(args) if args.format == ReportFormat::Json);
    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        color,
        config: cli.config,
        json_logs,
    };
    init_logging(&global);

    let result = match cli.command {
        Command::Author(ref args) => author::run(args, &global),
        Command::CacheInfo(ref args) => cache_info::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

fn init_logging(global: &GlobalArgs) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(global.default_log_filter()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if global.json_logs {
        builder.json().init();
    } else {
        builder.with_ansi(global.color).init();
    }
}

/// Rough terminal detection via the `TERM` variable.
fn atty_is_terminal() -> bool {
    std::env::var("TERM").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_author_default() {
        let cli = Cli::parse_from(["sedrila", "author", "out"]);
        match cli.command {
            Command::Author(ref args) => {
                assert_eq!(args.targetdir, PathBuf::from("out"));
                assert!(!args.clean);
                assert!(args.include_stage.is_none());
                assert_eq!(args.format, ReportFormat::Text);
            }
            _ => panic!("expected Author command"),
        }
    }

    #[test]
    fn parse_author_with_args() {
        let cli = Cli::parse_from([
            "sedrila",
            "author",
            "--clean",
            "--include-stage",
            "beta",
            "--format",
            "json",
            "/tmp/site",
        ]);
        match cli.command {
            Command::Author(ref args) => {
                assert!(args.clean);
                assert_eq!(args.include_stage.as_deref(), Some("beta"));
                assert_eq!(args.format, ReportFormat::Json);
                assert_eq!(args.targetdir, PathBuf::from("/tmp/site"));
            }
            _ => panic!("expected Author command"),
        }
    }

    #[test]
    fn parse_cache_info() {
        let cli = Cli::parse_from(["sedrila", "cache-info", "out/instructor/.sedrila_cache"]);
        match cli.command {
            Command::CacheInfo(ref args) => {
                assert_eq!(args.cachefile, PathBuf::from("out/instructor/.sedrila_cache"));
            }
            _ => panic!("expected CacheInfo command"),
        }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::parse_from(["sedrila", "--quiet", "--color", "never", "author", "out"]);
        assert!(cli.quiet);
        assert!(!cli.verbose);
        assert_eq!(cli.color, ColorChoice::Never);
    }

    #[test]
    fn parse_config_after_subcommand() {
        let cli = Cli::parse_from(["sedrila", "author", "out", "--config", "course/sedrila.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("course/sedrila.toml")));
    }

    #[test]
    fn targetdir_is_required() {
        assert!(Cli::try_parse_from(["sedrila", "author"]).is_err());
    }

    #[test]
    fn log_filter_levels() {
        let mut global = GlobalArgs {
            quiet: false,
            verbose: false,
            color: false,
            config: None,
            json_logs: false,
        };
        assert_eq!(global.default_log_filter(), "warn");
        global.verbose = true;
        assert_eq!(global.default_log_filter(), "debug");
        global.quiet = true;
        assert_eq!(global.default_log_filter(), "error");
    }
}
