//! `sedrila author`: builds the student and instructor websites.
//!
//! 1. Locate the course directory (the config file's directory, or `.`)
//! 2. Run the incremental build via `sedrila_build::run_author`
//! 3. Render the diagnostics collected during the run
//! 4. Print a summary and decide the exit code

use std::path::{Path, PathBuf};

use sedrila_build::{run_author, AuthorOptions, BuildReport, Kind};
use sedrila_cache::State;
use sedrila_diagnostics::{DiagnosticRenderer, JsonRenderer, TerminalRenderer};

use crate::{AuthorArgs, GlobalArgs, ReportFormat};

/// Runs the `sedrila author` command.
///
/// Returns exit code 0 if no errors were reported, 1 otherwise.
pub fn run(args: &AuthorArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let course_dir = course_dir_for(global.config.as_deref());
    let mut options = AuthorOptions::new(&course_dir, &args.targetdir);
    options.config_file = global.config.clone();
    options.clean = args.clean;
    options.include_stage = args.include_stage.clone();

    if !global.quiet && args.format == ReportFormat::Text {
        eprintln!(
            "   Authoring {} into {}",
            course_dir.display(),
            args.targetdir.display()
        );
    }

    let report = run_author(&options)?;
    tracing::info!(
        target: "sedrila.cli",
        elements = report.elements.len(),
        written = report.files_written.len(),
        "author run finished"
    );

    match args.format {
        ReportFormat::Text => {
            let renderer = TerminalRenderer::new(global.color);
            for diag in &report.diagnostics {
                eprintln!("{}", renderer.render(diag));
            }
            if !global.quiet {
                eprintln!("{}", summary_line(&report));
            }
        }
        ReportFormat::Json => {
            let renderer = JsonRenderer;
            for diag in &report.diagnostics {
                eprintln!("{}", renderer.render(diag));
            }
            let json = serde_json::to_string_pretty(&report)?;
            println!("{json}");
        }
    }

    Ok(if report.has_errors() { 1 } else { 0 })
}

/// The course sources live next to the config file.
fn course_dir_for(config: Option<&Path>) -> PathBuf {
    match config.and_then(Path::parent) {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn summary_line(report: &BuildReport) -> String {
    let pages = [Kind::Course, Kind::Chapter, Kind::Taskgroup, Kind::Task, Kind::Glossary]
        .into_iter()
        .map(|kind| report.count(kind, State::Changed))
        .sum::<usize>();
    format!(
        "   Result: {} page(s) rebuilt, {} file(s) written, {} removed, {} error(s), {} warning(s)",
        pages,
        report.files_written.len(),
        report.files_removed.len(),
        report.error_count(),
        report.warning_count()
    )
}
