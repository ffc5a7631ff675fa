use std::path::{Path, PathBuf};

use crate::cli::report::fetch;
use crate::error::Result;
use crate::export::{default_export_path, write_csv};
use crate::models::AnalyticsSnapshot;
use crate::range::{local_today, DateRange};
use crate::settings::{load_settings, shellexpand_path};
use crate::state::TypeFilter;
use crate::views::filter_reports;

pub fn run(range: DateRange, filter: TypeFilter, output: Option<String>) -> Result<()> {
    let snapshot = fetch(range)?;
    let path = match output {
        Some(p) => PathBuf::from(shellexpand_path(&p)),
        None => default_export_path(&load_settings().export_dir, local_today()),
    };
    let (written, rows) = export_snapshot(&snapshot, &filter, &path)?;
    println!("Wrote {} ({rows} rows)", written.display());
    Ok(())
}

/// Write the filtered range reports of `snapshot` to `path`.
pub(crate) fn export_snapshot(
    snapshot: &AnalyticsSnapshot,
    filter: &TypeFilter,
    path: &Path,
) -> Result<(PathBuf, usize)> {
    let reports = filter_reports(&snapshot.range_reports, filter);
    let written = write_csv(&reports, path)?;
    Ok((written, reports.len()))
}
