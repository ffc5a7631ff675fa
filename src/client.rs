use std::time::Duration;

use chrono::NaiveDate;

use crate::error::{AppError, Result};
use crate::models::{parse_day, AnalyticsResponse, AnalyticsSnapshot};
use crate::range::DateRange;
use crate::settings::Settings;

pub const GENERIC_FETCH_ERROR: &str = "Failed to fetch analytics data.";

/// Anything that can answer an analytics query for a date range.
pub trait AnalyticsSource: Send + Sync {
    fn fetch(&self, range: &DateRange) -> Result<AnalyticsResponse>;
}

// ---------------------------------------------------------------------------
// HTTP source
// ---------------------------------------------------------------------------

pub struct HttpSource {
    client: reqwest::blocking::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpSource {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(concat!("medlytics/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            token: settings.api_token.clone().filter(|t| !t.is_empty()),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/analytics", self.base_url)
    }
}

impl AnalyticsSource for HttpSource {
    fn fetch(&self, range: &DateRange) -> Result<AnalyticsResponse> {
        let url = self.endpoint();
        tracing::debug!(%url, start = %range.start, end = %range.end, "requesting analytics");

        let mut req = self.client.get(&url).query(&[
            ("startDate", range.start_param()),
            ("endDate", range.end_param()),
        ]);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send()?;
        let status = resp.status();
        let body = resp.text()?;

        if !status.is_success() {
            tracing::warn!(%status, "analytics request failed");
            let msg = server_message(&body).unwrap_or_else(|| GENERIC_FETCH_ERROR.to_string());
            return Err(AppError::Server(msg));
        }
        parse_response(&body)
    }
}

/// Decode a response body. Anything other than a JSON object is a failure.
pub fn parse_response(body: &str) -> Result<AnalyticsResponse> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    if !value.is_object() {
        return Err(AppError::Server(GENERIC_FETCH_ERROR.to_string()));
    }
    Ok(serde_json::from_value(value)?)
}

/// `{"message": "..."}` from an error body, if present.
fn server_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let msg = value.get("message")?.as_str()?.trim();
    (!msg.is_empty()).then(|| msg.to_string())
}

/// The text a user sees for a failed fetch.
pub fn failure_message(err: &AppError) -> String {
    match err {
        AppError::Server(msg) => msg.clone(),
        AppError::InvalidRange(v) => v.to_string(),
        _ => GENERIC_FETCH_ERROR.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

pub fn normalize(raw: AnalyticsResponse, requested: &DateRange) -> Result<AnalyticsSnapshot> {
    let summary = raw
        .summary_stats
        .ok_or_else(|| AppError::Server(GENERIC_FETCH_ERROR.to_string()))?;

    let distribution = raw
        .report_type_stats
        .or(raw.report_type_distribution)
        .unwrap_or_default();

    let effective_range = match raw.date_range_used {
        Some(used) => DateRange::new(
            echoed_day(used.start.as_deref()).unwrap_or(requested.start),
            echoed_day(used.end.as_deref()).unwrap_or(requested.end),
        ),
        None => *requested,
    };

    Ok(AnalyticsSnapshot {
        summary,
        distribution,
        range_reports: raw.date_range_reports.unwrap_or_default(),
        todays_reports: raw.todays_reports.unwrap_or_default(),
        monthly_trends: raw.monthly_trends.unwrap_or_default(),
        daily_activity: raw.daily_activity.unwrap_or_default(),
        top_contributors: raw.top_contributors.unwrap_or_default(),
        deletion_analysis: raw.deletion_analysis.unwrap_or_default(),
        recent_activity: raw.recent_activity.unwrap_or_default(),
        effective_range,
    })
}

fn echoed_day(s: Option<&str>) -> Option<NaiveDate> {
    s.and_then(parse_day)
}

/// Validate, fetch and normalize in one step. No request is made for an
/// invalid range.
pub fn load_snapshot(
    source: &dyn AnalyticsSource,
    range: &DateRange,
    today: NaiveDate,
) -> Result<AnalyticsSnapshot> {
    range.validate(today)?;
    let raw = source.fetch(range)?;
    normalize(raw, range)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;

    pub(crate) const SAMPLE: &str = r#"{
        "summaryStats": {"totalReports": 17, "totalUniquePatients": 9,
                         "todaysUploads": 3, "deletionRate": 11.7},
        "reportTypeStats": [
            {"report_type": "X-Ray", "report_subtype": null, "count": 5, "unique_patients": 4},
            {"report_type": "X-Ray", "report_subtype": "Chest", "count": 3, "unique_patients": 2},
            {"report_type": "MRI", "report_subtype": null, "count": 2, "unique_patients": 2}
        ],
        "dateRangeReports": [
            {"report_type": "X-Ray", "count": 8, "unique_patients": 6},
            {"report_type": "MRI", "count": 2, "unique_patients": 2}
        ],
        "todaysReports": [{"report_type": "MRI", "count": 1, "unique_patients": 1}],
        "dateRangeUsed": {"start": "2025-03-02", "end": "2025-03-30"},
        "monthlyTrends": [{"month": "2025-03", "total_uploads": 10, "deletions": 2,
                           "unique_patients": 9, "active_uploaders": 3}],
        "dailyActivity": [{"date": "2025-03-03", "uploads": 4, "deletions": 1}],
        "topContributors": [{"user_id": "u7", "report_count": 6, "unique_patients": 5,
                             "report_types_uploaded": 2}],
        "deletionAnalysis": [{"report_type": "MRI", "deleted_by": null, "total_deleted": 1}],
        "recentActivity": [{"report_name": "scan.pdf", "report_type": "MRI",
                            "user_id": "u7", "uploaded_at": "2025-03-03T09:15:00Z",
                            "is_deleted": true, "deleted_by": "u1",
                            "deleted_at": "2025-03-04T10:00:00Z"}]
    }"#;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn march() -> DateRange {
        DateRange::new(d(2025, 3, 1), d(2025, 3, 31))
    }

    /// Serve exactly one HTTP response, returning the raw request text.
    fn serve_once(status: &str, body: &str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 8192];
            let n = stream.read(&mut buf).unwrap();
            stream.write_all(response.as_bytes()).unwrap();
            String::from_utf8_lossy(&buf[..n]).to_string()
        });
        (format!("http://{addr}"), handle)
    }

    fn settings_for(base_url: String) -> Settings {
        Settings {
            base_url,
            api_token: Some("secret".to_string()),
            ..Settings::default()
        }
    }

    pub(crate) struct CountingSource {
        pub calls: AtomicUsize,
        pub body: &'static str,
    }

    impl AnalyticsSource for CountingSource {
        fn fetch(&self, _range: &DateRange) -> Result<AnalyticsResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            parse_response(self.body)
        }
    }

    #[test]
    fn test_normalize_full_response() {
        let raw = parse_response(SAMPLE).unwrap();
        let snap = normalize(raw, &march()).unwrap();
        assert_eq!(snap.summary.total_reports, 17);
        assert_eq!(snap.distribution.len(), 3);
        assert_eq!(snap.range_reports.len(), 2);
        assert_eq!(snap.effective_range, DateRange::new(d(2025, 3, 2), d(2025, 3, 30)));
        assert!(snap.recent_activity[0].is_deleted);
    }

    #[test]
    fn test_normalize_defaults_missing_arrays() {
        let raw = parse_response(r#"{"summaryStats": {"totalReports": 0}}"#).unwrap();
        let snap = normalize(raw, &march()).unwrap();
        assert!(snap.distribution.is_empty());
        assert!(snap.range_reports.is_empty());
        assert!(snap.recent_activity.is_empty());
        assert!(snap.is_empty());
        assert_eq!(snap.effective_range, march());
    }

    #[test]
    fn test_normalize_falls_back_to_distribution_field() {
        let raw = parse_response(
            r#"{"summaryStats": {}, "reportTypeDistribution": [{"report_type": "CT", "count": 1}]}"#,
        )
        .unwrap();
        let snap = normalize(raw, &march()).unwrap();
        assert_eq!(snap.distribution.len(), 1);
        assert_eq!(snap.distribution[0].report_type, "CT");
    }

    #[test]
    fn test_normalize_partial_echoed_range() {
        let raw = parse_response(
            r#"{"summaryStats": {}, "dateRangeUsed": {"start": "2025-03-05T00:00:00Z"}}"#,
        )
        .unwrap();
        let snap = normalize(raw, &march()).unwrap();
        assert_eq!(snap.effective_range, DateRange::new(d(2025, 3, 5), d(2025, 3, 31)));
    }

    #[test]
    fn test_numeric_deletion_flag_keeps_snapshot() {
        for (raw, expected) in [("1", true), ("0", false), ("null", false)] {
            let body = format!(
                r#"{{"summaryStats": {{}}, "recentActivity": [{{"report_name": "a.pdf", "is_deleted": {raw}}}]}}"#
            );
            let snap = normalize(parse_response(&body).unwrap(), &march()).unwrap();
            assert_eq!(snap.recent_activity[0].is_deleted, expected, "is_deleted={raw}");
        }
    }

    #[test]
    fn test_missing_summary_is_total_failure() {
        let raw = parse_response(r#"{"reportTypeStats": []}"#).unwrap();
        let err = normalize(raw, &march()).unwrap_err();
        assert_eq!(failure_message(&err), GENERIC_FETCH_ERROR);
    }

    #[test]
    fn test_non_object_body_is_failure() {
        assert!(parse_response("[]").is_err());
        assert!(parse_response("null").is_err());
        assert!(parse_response("<html>").is_err());
    }

    #[test]
    fn test_load_snapshot_skips_fetch_on_invalid_range() {
        let source = CountingSource { calls: AtomicUsize::new(0), body: SAMPLE };
        let bad = DateRange::new(d(2025, 3, 10), d(2025, 3, 1));
        let err = load_snapshot(&source, &bad, d(2025, 6, 1)).unwrap_err();
        assert_eq!(failure_message(&err), "Start date must be before end date");
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_http_source_sends_range_and_token() {
        let (url, server) = serve_once("200 OK", SAMPLE);
        let source = HttpSource::new(&settings_for(url)).unwrap();
        let raw = source.fetch(&march()).unwrap();
        let request = server.join().unwrap();
        assert!(request.starts_with("GET /analytics?startDate=2025-03-01&endDate=2025-03-31 "));
        assert!(request.to_lowercase().contains("authorization: bearer secret"));
        assert!(raw.summary_stats.is_some());
    }

    #[test]
    fn test_http_source_uses_server_message() {
        let (url, server) = serve_once(
            "500 Internal Server Error",
            r#"{"message": "Analytics database unavailable"}"#,
        );
        let source = HttpSource::new(&settings_for(url)).unwrap();
        let err = source.fetch(&march()).unwrap_err();
        server.join().unwrap();
        assert_eq!(failure_message(&err), "Analytics database unavailable");
    }

    #[test]
    fn test_http_source_generic_message_without_body() {
        let (url, server) = serve_once("502 Bad Gateway", "upstream down");
        let source = HttpSource::new(&settings_for(url)).unwrap();
        let err = source.fetch(&march()).unwrap_err();
        server.join().unwrap();
        assert_eq!(failure_message(&err), GENERIC_FETCH_ERROR);
    }
}
