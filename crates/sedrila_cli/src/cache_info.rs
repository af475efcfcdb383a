//! `sedrila cache-info`: summarizes a build cache file.

use std::time::UNIX_EPOCH;

use sedrila_cache::{CacheStore, StoreSummary};

use crate::{CacheInfoArgs, GlobalArgs, ReportFormat};

/// Runs the `sedrila cache-info` command.
pub fn run(args: &CacheInfoArgs, _global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let summary = CacheStore::inspect(&args.cachefile)?;
    match args.format {
        ReportFormat::Text => print!("{}", describe(&summary)),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }
    Ok(0)
}

fn describe(summary: &StoreSummary) -> String {
    let reference = summary
        .reference_time
        .duration_since(UNIX_EPOCH)
        .map(|d| format!("{}.{:03}", d.as_secs(), d.subsec_millis()))
        .unwrap_or_else(|_| "before epoch".to_string());
    let mut out = format!(
        "reference time: {reference} (seconds since epoch)\nentries: {}\ndirty files: {}\n",
        summary.entry_count,
        summary.dirty.len()
    );
    for path in &summary.dirty {
        out.push_str(&format!("  {}\n", path.display()));
    }
    out
}
