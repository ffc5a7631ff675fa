use chrono::{DateTime, Local, NaiveDateTime};

/// Format an integer with thousands separators: 1,234,567
pub fn number(val: u64) -> String {
    let digits = val.to_string();
    let mut with_commas = String::new();
    for (i, c) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    with_commas.chars().rev().collect()
}

/// Deletion rate as shown on the summary card: rounded whole percent.
pub fn percent(rate: f64) -> String {
    if !rate.is_finite() {
        return "0%".to_string();
    }
    format!("{}%", rate.round() as i64)
}

/// Timeline timestamp in local time, e.g. "Mar 03, 09:15". Timestamps
/// without an offset are taken as local already. Unparseable input is
/// returned as-is.
pub fn short_timestamp(raw: &str) -> String {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Local).format("%b %d, %H:%M").to_string();
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, pattern) {
            return dt.format("%b %d, %H:%M").to_string();
        }
    }
    raw.to_string()
}
