use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::error::{AppError, Result};
use crate::models::ReportCount;

pub const CSV_HEADER: [&str; 3] = ["Report Type", "Count", "Unique Patients"];

/// `reports_YYYYMMDD.csv`, stamped with the export date.
pub fn export_filename(today: NaiveDate) -> String {
    format!("reports_{}.csv", today.format("%Y%m%d"))
}

pub fn default_export_path(export_dir: &str, today: NaiveDate) -> PathBuf {
    PathBuf::from(export_dir).join(export_filename(today))
}

/// Serialize the (already filtered) range reports. Fields containing commas,
/// quotes or newlines are quoted.
pub fn build_csv(reports: &[ReportCount]) -> Result<String> {
    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    wtr.write_record(CSV_HEADER)?;
    for r in reports {
        let count = r.count.to_string();
        let patients = r.unique_patients.to_string();
        wtr.write_record([r.report_type.as_str(), count.as_str(), patients.as_str()])?;
    }
    let bytes = wtr.into_inner().map_err(|e| AppError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| AppError::Other(e.to_string()))
}

pub fn write_csv(reports: &[ReportCount], path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let csv = build_csv(reports)?;
    std::fs::write(path, csv)?;
    tracing::info!(path = %path.display(), rows = reports.len(), "exported CSV");
    Ok(path.to_path_buf())
}
