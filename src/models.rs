use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

use crate::range::DateRange;

// ---------------------------------------------------------------------------
// Lenient number/string decoding
// ---------------------------------------------------------------------------

// Aggregate counts arrive as JSON numbers or as numeric strings depending on
// which SQL driver produced them.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrText {
    Int(u64),
    Float(f64),
    Text(String),
}

fn count<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    Ok(match Option::<NumOrText>::deserialize(d)? {
        Some(NumOrText::Int(n)) => n,
        Some(NumOrText::Float(f)) if f.is_finite() && f >= 0.0 => f as u64,
        Some(NumOrText::Text(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

fn rate<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(match Option::<NumOrText>::deserialize(d)? {
        Some(NumOrText::Int(n)) => n as f64,
        Some(NumOrText::Float(f)) => f,
        Some(NumOrText::Text(s)) => s.trim().parse().unwrap_or(0.0),
        None => 0.0,
    })
}

fn text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Option::<NumOrText>::deserialize(d)? {
        Some(NumOrText::Int(n)) => n.to_string(),
        Some(NumOrText::Float(f)) => f.to_string(),
        Some(NumOrText::Text(s)) => s,
        None => String::new(),
    })
}

fn opt_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<NumOrText>::deserialize(d)? {
        Some(NumOrText::Int(n)) => Some(n.to_string()),
        Some(NumOrText::Float(f)) => Some(f.to_string()),
        Some(NumOrText::Text(s)) if !s.is_empty() => Some(s),
        _ => None,
    })
}

// Deletion flags come back as booleans or as 0/1 from the same drivers.
#[derive(Deserialize)]
#[serde(untagged)]
enum FlagValue {
    Bool(bool),
    Num(f64),
    Text(String),
}

fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match Option::<FlagValue>::deserialize(d)? {
        Some(FlagValue::Bool(b)) => b,
        Some(FlagValue::Num(n)) => n != 0.0,
        Some(FlagValue::Text(s)) => {
            let s = s.trim();
            s.eq_ignore_ascii_case("true") || s == "1"
        }
        None => false,
    })
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStats {
    #[serde(default, deserialize_with = "count")]
    pub total_reports: u64,
    #[serde(default, deserialize_with = "count")]
    pub total_unique_patients: u64,
    #[serde(default, deserialize_with = "count")]
    pub todays_uploads: u64,
    /// Percentage, 0-100.
    #[serde(default, deserialize_with = "rate")]
    pub deletion_rate: f64,
}

/// One row of the distribution list.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DistributionEntry {
    #[serde(default, deserialize_with = "text")]
    pub report_type: String,
    #[serde(default, deserialize_with = "opt_text")]
    pub report_subtype: Option<String>,
    #[serde(default, deserialize_with = "count")]
    pub count: u64,
    #[serde(default, deserialize_with = "count")]
    pub unique_patients: u64,
}

/// Per-type totals for today or for the selected range.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReportCount {
    #[serde(default, deserialize_with = "text")]
    pub report_type: String,
    #[serde(default, deserialize_with = "count")]
    pub count: u64,
    #[serde(default, deserialize_with = "count")]
    pub unique_patients: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MonthlyTrend {
    #[serde(default, deserialize_with = "text")]
    pub month: String,
    #[serde(default, deserialize_with = "count")]
    pub total_uploads: u64,
    #[serde(default, deserialize_with = "count")]
    pub deletions: u64,
    #[serde(default, deserialize_with = "count")]
    pub unique_patients: u64,
    #[serde(default, deserialize_with = "count")]
    pub active_uploaders: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DailyActivity {
    #[serde(default, deserialize_with = "text")]
    pub date: String,
    #[serde(default, deserialize_with = "count")]
    pub uploads: u64,
    #[serde(default, deserialize_with = "count")]
    pub deletions: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Contributor {
    #[serde(default, deserialize_with = "text")]
    pub user_id: String,
    #[serde(default, deserialize_with = "count")]
    pub report_count: u64,
    #[serde(default, deserialize_with = "count")]
    pub unique_patients: u64,
    #[serde(default, deserialize_with = "count")]
    pub report_types_uploaded: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DeletionEntry {
    #[serde(default, deserialize_with = "text")]
    pub report_type: String,
    #[serde(default, deserialize_with = "opt_text")]
    pub deleted_by: Option<String>,
    #[serde(default, deserialize_with = "count")]
    pub total_deleted: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ActivityEntry {
    #[serde(default, deserialize_with = "text")]
    pub report_name: String,
    #[serde(default, deserialize_with = "text")]
    pub report_type: String,
    #[serde(default, deserialize_with = "opt_text")]
    pub report_subtype: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub user_id: String,
    #[serde(default, deserialize_with = "text")]
    pub uploaded_at: String,
    #[serde(default, deserialize_with = "flag")]
    pub is_deleted: bool,
    #[serde(default, deserialize_with = "opt_text")]
    pub deleted_by: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub deleted_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RangeUsed {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

// ---------------------------------------------------------------------------
// Wire response and normalized snapshot
// ---------------------------------------------------------------------------

/// Body of `GET /analytics` exactly as sent. Every field may be missing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResponse {
    pub summary_stats: Option<SummaryStats>,
    pub report_type_stats: Option<Vec<DistributionEntry>>,
    pub report_type_distribution: Option<Vec<DistributionEntry>>,
    pub date_range_reports: Option<Vec<ReportCount>>,
    pub date_range_used: Option<RangeUsed>,
    pub todays_reports: Option<Vec<ReportCount>>,
    pub monthly_trends: Option<Vec<MonthlyTrend>>,
    pub daily_activity: Option<Vec<DailyActivity>>,
    pub top_contributors: Option<Vec<Contributor>>,
    pub deletion_analysis: Option<Vec<DeletionEntry>>,
    pub recent_activity: Option<Vec<ActivityEntry>>,
}

/// The complete normalized result of one successful fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsSnapshot {
    pub summary: SummaryStats,
    pub distribution: Vec<DistributionEntry>,
    pub range_reports: Vec<ReportCount>,
    pub todays_reports: Vec<ReportCount>,
    pub monthly_trends: Vec<MonthlyTrend>,
    pub daily_activity: Vec<DailyActivity>,
    pub top_contributors: Vec<Contributor>,
    pub deletion_analysis: Vec<DeletionEntry>,
    pub recent_activity: Vec<ActivityEntry>,
    /// Range the backend actually used; the requested range when not echoed.
    pub effective_range: DateRange,
}

impl AnalyticsSnapshot {
    /// True when nothing in the snapshot can be drawn as a chart or table row.
    pub fn is_empty(&self) -> bool {
        self.distribution.is_empty()
            && self.range_reports.is_empty()
            && self.todays_reports.is_empty()
            && self.monthly_trends.is_empty()
            && self.daily_activity.is_empty()
            && self.top_contributors.is_empty()
            && self.deletion_analysis.is_empty()
            && self.recent_activity.is_empty()
    }
}

/// Accepts "2025-03-01" as well as full ISO timestamps.
pub(crate) fn parse_day(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let day = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_accept_strings_and_numbers() {
        let json = r#"{"report_type": "MRI", "count": "12", "unique_patients": 4}"#;
        let r: ReportCount = serde_json::from_str(json).unwrap();
        assert_eq!(r.count, 12);
        assert_eq!(r.unique_patients, 4);
    }

    #[test]
    fn test_null_and_missing_fields_default() {
        let json = r#"{"report_type": "CT", "report_subtype": null}"#;
        let e: DistributionEntry = serde_json::from_str(json).unwrap();
        assert_eq!(e.report_subtype, None);
        assert_eq!(e.count, 0);
    }

    #[test]
    fn test_empty_subtype_is_none() {
        let json = r#"{"report_type": "CT", "report_subtype": "", "count": 3}"#;
        let e: DistributionEntry = serde_json::from_str(json).unwrap();
        assert_eq!(e.report_subtype, None);
    }

    #[test]
    fn test_summary_camel_case() {
        let json = r#"{"totalReports": 40, "totalUniquePatients": "9",
                       "todaysUploads": 2, "deletionRate": "12.6"}"#;
        let s: SummaryStats = serde_json::from_str(json).unwrap();
        assert_eq!(s.total_reports, 40);
        assert_eq!(s.total_unique_patients, 9);
        assert!((s.deletion_rate - 12.6).abs() < 1e-9);
    }

    #[test]
    fn test_numeric_user_id() {
        let json = r#"{"user_id": 42, "report_count": 3}"#;
        let c: Contributor = serde_json::from_str(json).unwrap();
        assert_eq!(c.user_id, "42");
    }

    fn deleted(raw: &str) -> bool {
        let json = format!(r#"{{"report_name": "scan.pdf", "is_deleted": {raw}}}"#);
        let a: ActivityEntry = serde_json::from_str(&json).unwrap();
        a.is_deleted
    }

    #[test]
    fn test_deletion_flag_forms() {
        assert!(deleted("true"));
        assert!(!deleted("false"));
        assert!(deleted("1"));
        assert!(!deleted("0"));
        assert!(deleted(r#""true""#));
        assert!(deleted(r#""1""#));
        assert!(!deleted(r#""0""#));
        assert!(!deleted("null"));
        let a: ActivityEntry = serde_json::from_str(r#"{"report_name": "x"}"#).unwrap();
        assert!(!a.is_deleted);
    }

    #[test]
    fn test_parse_day() {
        let d = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert_eq!(parse_day("2025-03-01"), Some(d));
        assert_eq!(parse_day("2025-03-01T10:00:00.000Z"), Some(d));
        assert_eq!(parse_day("garbage"), None);
    }
}
