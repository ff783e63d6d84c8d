//! The `runs` subcommands: inspect and prune the recorded run history.

use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use comfy_table::{presets::UTF8_FULL, Table};

use filament_core::{CacheStore, RunFilter, RunPrune, RunRecord, RunStatus};

use crate::cli::{OutputFormat, StatusFilter};
use crate::config::CliConfig;

pub fn list(
    config: &CliConfig,
    vault: Option<PathBuf>,
    tool: Option<String>,
    limit: usize,
    status: Option<StatusFilter>,
    format: OutputFormat,
) -> Result<()> {
    let vault = config.resolve_vault(vault.as_deref())?;
    let store = super::open_existing_store(&vault)?;

    // The database lives inside the vault, so no vault filter is needed here.
    let filter = RunFilter {
        vault: None,
        tool,
        limit,
    };
    let mut runs = store.recent_runs(&filter)?;
    if let Some(status) = status {
        let wanted = RunStatus::from(status);
        runs.retain(|run| run.status == wanted);
    }

    if runs.is_empty() {
        println!("No runs found.");
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_table(&runs),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&runs)?),
        OutputFormat::Csv => print_csv(&runs)?,
    }
    Ok(())
}

pub fn prune(
    config: &CliConfig,
    vault: Option<PathBuf>,
    older_than: Option<String>,
    keep_last: Option<usize>,
    tool: Option<String>,
    dry_run: bool,
) -> Result<()> {
    let vault = config.resolve_vault(vault.as_deref())?;
    let store = super::open_existing_store(&vault)?;

    let cutoff = match older_than.as_deref() {
        Some(window) => {
            let seconds = parse_duration(window)?;
            Some(Utc::now() - chrono::Duration::seconds(seconds))
        }
        None => None,
    };
    let prune = RunPrune {
        cutoff,
        keep_last,
        tool,
        dry_run,
    };
    let count = store.prune_runs(&prune)?;
    if dry_run {
        println!("[DRY RUN] Would delete {count} run records.");
    } else {
        println!("Deleted {count} run records.");
    }
    Ok(())
}

fn print_table(runs: &[RunRecord]) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Run", "Started", "Tool", "Operation", "Status", "Files", "Links", "Tags", "Duration",
        "Errors",
    ]);
    for run in runs {
        let id: String = run.run_id.chars().take(8).collect();
        let duration = run
            .duration_seconds
            .map(|s| format!("{s:.1}s"))
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            id,
            run.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            run.tool.clone(),
            run.operation.clone(),
            run.status.as_str().to_string(),
            run.files_total.to_string(),
            format!("+{}/-{}", run.links_added, run.links_removed),
            format!("+{}/-{}", run.tags_applied, run.tags_removed),
            duration,
            run.error_count.to_string(),
        ]);
    }
    println!("{table}");
}

fn print_csv(runs: &[RunRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    for run in runs {
        writer.serialize(run).context("Failed to write CSV row")?;
    }
    writer.flush().context("Failed to flush CSV output")?;
    Ok(())
}

/// Parse a retention window like `30d`, `4w`, `6m`, or `1y` into seconds.
fn parse_duration(input: &str) -> Result<i64> {
    if input.len() < 2 {
        bail!("Invalid duration {input:?}. Use forms like 30d, 4w, 6m, or 1y");
    }
    let (number, unit) = input.split_at(input.len() - 1);
    let count: i64 = number
        .parse()
        .with_context(|| format!("Invalid duration {input:?}"))?;
    let seconds = match unit {
        "d" => 86_400,
        "w" => 604_800,
        "m" => 2_592_000,
        "y" => 31_536_000,
        other => bail!("Invalid time unit '{other}'. Use d (days), w (weeks), m (months), or y (years)"),
    };
    Ok(count * seconds)
}
