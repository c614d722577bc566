// Batch commands: each reads its input file(s) fresh, runs one pipeline stage
// and writes the result atomically. Nothing is written when any step fails.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, TimeZone};
use fantaroster_core::aggregate::{aggregate, summary_records};
use fantaroster_core::columns::{drop_columns, rename_columns, renumber};
use fantaroster_core::parse::{read_path, ParseOptions};
use fantaroster_core::reconcile::{reconcile, ReconcileReport};
use fantaroster_core::serialize::{serialize, write_atomic, SerializeOptions};
use fantaroster_core::Record;
use indexmap::IndexMap;
use tracing::{info, warn};

use crate::config::{AggregateSettings, ReconcileSettings};

/// Where `reconcile` writes when no output path is given:
/// `<dir>/enriched_<YYYYmmdd_HHMMSS>.csv`.
pub fn default_enriched_path<Tz>(dir: &Path, now: DateTime<Tz>) -> PathBuf
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    dir.join(format!("enriched_{}.csv", now.format("%Y%m%d_%H%M%S")))
}

fn read(path: &Path, delimiter: u8) -> anyhow::Result<Vec<Record>> {
    read_path(path, &ParseOptions::with_delimiter(delimiter))
        .with_context(|| format!("failed to read {}", path.display()))
}

fn write(path: &Path, records: &[Record], delimiter: u8) -> anyhow::Result<()> {
    let text = serialize(records, &SerializeOptions::with_delimiter(delimiter))
        .with_context(|| format!("failed to serialize {}", path.display()))?;
    write_atomic(path, &text).with_context(|| format!("failed to write {}", path.display()))
}

/// Collapse per-match rows into one summary row per player and team.
/// Returns the number of groups written.
pub fn summarize(input: &Path, output: &Path, settings: &AggregateSettings) -> anyhow::Result<usize> {
    let rows = read(input, settings.delimiter)?;
    let summaries = aggregate(&rows, &settings.config);
    write(output, &summary_records(&summaries), settings.delimiter)?;
    info!(
        "Summarized {} rows into {} groups -> {}",
        rows.len(),
        summaries.len(),
        output.display()
    );
    Ok(summaries.len())
}

/// Enrich the target list with stat fields from the stats dataset.
///
/// The configured id columns are dropped from both inputs before joining.
/// With `renumber`, the output gets a fresh `id` column. The output uses
/// the target delimiter.
pub fn reconcile_files(
    stats: &Path,
    target: &Path,
    output: &Path,
    settings: &ReconcileSettings,
    renumber_ids: bool,
) -> anyhow::Result<ReconcileReport> {
    let stats_rows = drop_columns(
        &read(stats, settings.stats_delimiter)?,
        &settings.drop_stats_fields,
    );
    let target_rows = drop_columns(
        &read(target, settings.target_delimiter)?,
        &settings.drop_target_fields,
    );

    let mut report = reconcile(&stats_rows, &target_rows, &settings.config);
    if renumber_ids {
        report.rows = renumber(&report.rows, "id");
    }
    write(output, &report.rows, settings.target_delimiter)?;

    info!(
        "Reconciled {} rows ({} exact, {} by surname, {} fuzzy, {} unmatched, {} without a name, {} already filled) -> {}",
        report.rows.len(),
        report.exact,
        report.fallback,
        report.fuzzy,
        report.unmatched,
        report.missing_name,
        report.already_filled,
        output.display()
    );
    if !report.warnings.is_empty() {
        warn!("{} row(s) were zero-filled", report.warnings.len());
    }
    Ok(report)
}

/// Replace the id column with fresh sequential ids. Returns the row count.
pub fn renumber_file(
    input: &Path,
    output: &Path,
    id_field: &str,
    delimiter: u8,
) -> anyhow::Result<usize> {
    let rows = renumber(&read(input, delimiter)?, id_field);
    write(output, &rows, delimiter)?;
    info!("Renumbered {} rows -> {}", rows.len(), output.display());
    Ok(rows.len())
}

/// Rename header columns by `table`. Returns the row count.
pub fn rename_file(
    input: &Path,
    output: &Path,
    table: &IndexMap<String, String>,
    delimiter: u8,
) -> anyhow::Result<usize> {
    let rows = rename_columns(&read(input, delimiter)?, table);
    write(output, &rows, delimiter)?;
    info!("Renamed columns of {} rows -> {}", rows.len(), output.display());
    Ok(rows.len())
}
