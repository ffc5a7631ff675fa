use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::ReportKind;
use crate::client::{load_snapshot, HttpSource};
use crate::error::Result;
use crate::fmt::{number, percent, short_timestamp};
use crate::models::AnalyticsSnapshot;
use crate::range::{local_today, DateRange};
use crate::settings::load_settings;
use crate::state::TypeFilter;
use crate::views::{build_hierarchy, filter_reports};

/// Fetch one snapshot synchronously. The range is validated before any
/// request goes out.
pub(crate) fn fetch(range: DateRange) -> Result<AnalyticsSnapshot> {
    let settings = load_settings();
    let source = HttpSource::new(&settings)?;
    load_snapshot(&source, &range, local_today())
}

pub fn run(kind: ReportKind, range: DateRange, filter: TypeFilter) -> Result<()> {
    let snapshot = fetch(range)?;
    println!("{}", render(kind, &snapshot, &filter));
    Ok(())
}

pub(crate) fn render(kind: ReportKind, snapshot: &AnalyticsSnapshot, filter: &TypeFilter) -> String {
    match kind {
        ReportKind::Summary => summary(snapshot, filter),
        ReportKind::Types => types(snapshot),
        ReportKind::Trends => trends(snapshot),
        ReportKind::Daily => daily(snapshot),
        ReportKind::Contributors => contributors(snapshot),
        ReportKind::Deletions => deletions(snapshot),
        ReportKind::Activity => activity(snapshot),
    }
}

fn no_data(title: &str) -> String {
    format!(
        "{}\nNo data available for the selected date range and filters.",
        title.bold()
    )
}

fn summary(snapshot: &AnalyticsSnapshot, filter: &TypeFilter) -> String {
    let s = &snapshot.summary;
    let mut cards = Table::new();
    cards.set_header(vec!["Total Reports", "Unique Patients", "Today's Uploads", "Deletion Rate"]);
    cards.add_row(vec![
        Cell::new(number(s.total_reports)),
        Cell::new(number(s.total_unique_patients)),
        Cell::new(number(s.todays_uploads)),
        Cell::new(percent(s.deletion_rate)),
    ]);

    let title = format!(
        "Reports Analysis ({})",
        snapshot.effective_range.label()
    );
    let reports = filter_reports(&snapshot.range_reports, filter);
    let analysis = if reports.is_empty() {
        no_data(&title)
    } else {
        let mut table = Table::new();
        table.set_header(vec!["Report Type", "Count", "Unique Patients"]);
        for r in &reports {
            table.add_row(vec![
                Cell::new(&r.report_type),
                Cell::new(number(r.count)),
                Cell::new(number(r.unique_patients)),
            ]);
        }
        format!("{} [{}]\n{table}", title.bold(), filter.label())
    };

    let todays = filter_reports(&snapshot.todays_reports, filter);
    let today_line = if todays.is_empty() {
        "none".to_string()
    } else {
        todays
            .iter()
            .map(|r| format!("{} {}", r.report_type, number(r.count)))
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        "{}\n{cards}\nToday's Reports: {today_line}\n\n{analysis}",
        "Medical Reports Analytics".bold()
    )
}

fn types(snapshot: &AnalyticsSnapshot) -> String {
    if snapshot.distribution.is_empty() {
        return no_data("Report Type Distribution");
    }
    let hierarchy = build_hierarchy(&snapshot.distribution);
    let total = hierarchy
        .groups()
        .iter()
        .fold(0u64, |acc, g| acc.saturating_add(g.count));

    let mut dist = Table::new();
    dist.set_header(vec!["Report Type", "Reports", "%"]);
    for group in hierarchy.groups() {
        let pct = if total == 0 {
            0.0
        } else {
            group.count as f64 / total as f64 * 100.0
        };
        dist.add_row(vec![
            Cell::new(&group.report_type),
            Cell::new(number(group.count)),
            Cell::new(format!("{pct:.1}%")),
        ]);
    }

    let mut subtypes = Table::new();
    subtypes.set_header(vec!["Type", "Subtype", "Reports", "Patients"]);
    for d in &snapshot.distribution {
        subtypes.add_row(vec![
            Cell::new(&d.report_type),
            Cell::new(d.report_subtype.as_deref().unwrap_or("N/A")),
            Cell::new(number(d.count)),
            Cell::new(number(d.unique_patients)),
        ]);
    }

    format!(
        "{}\n{dist}\n\n{}\n{subtypes}",
        "Report Type Distribution".bold(),
        "Report Subtypes Analysis".bold()
    )
}

fn trends(snapshot: &AnalyticsSnapshot) -> String {
    if snapshot.monthly_trends.is_empty() {
        return no_data("Monthly Trends");
    }
    let mut table = Table::new();
    table.set_header(vec!["Month", "Uploads", "Deletions", "Unique Patients", "Active Uploaders"]);
    for t in &snapshot.monthly_trends {
        table.add_row(vec![
            Cell::new(&t.month),
            Cell::new(number(t.total_uploads)),
            Cell::new(number(t.deletions)),
            Cell::new(number(t.unique_patients)),
            Cell::new(number(t.active_uploaders)),
        ]);
    }
    format!("{}\n{table}", "Monthly Trends".bold())
}

fn daily(snapshot: &AnalyticsSnapshot) -> String {
    if snapshot.daily_activity.is_empty() {
        return no_data("Daily Activity");
    }
    let mut table = Table::new();
    table.set_header(vec!["Date", "Uploads", "Deletions"]);
    for d in &snapshot.daily_activity {
        table.add_row(vec![
            Cell::new(&d.date),
            Cell::new(number(d.uploads)),
            Cell::new(number(d.deletions)),
        ]);
    }
    format!("{}\n{table}", "Daily Activity".bold())
}

fn contributors(snapshot: &AnalyticsSnapshot) -> String {
    if snapshot.top_contributors.is_empty() {
        return no_data("Top Contributors");
    }
    let mut table = Table::new();
    table.set_header(vec!["User ID", "Reports Uploaded", "Unique Patients", "Report Types"]);
    for c in &snapshot.top_contributors {
        table.add_row(vec![
            Cell::new(format!("User {}", c.user_id)),
            Cell::new(number(c.report_count)),
            Cell::new(number(c.unique_patients)),
            Cell::new(number(c.report_types_uploaded)),
        ]);
    }
    format!("{}\n{table}", "Top Contributors".bold())
}

fn deletions(snapshot: &AnalyticsSnapshot) -> String {
    if snapshot.deletion_analysis.is_empty() {
        return no_data("Deletion Analysis");
    }
    let mut table = Table::new();
    table.set_header(vec!["Report Type", "Deleted By", "Total Deleted"]);
    for d in &snapshot.deletion_analysis {
        table.add_row(vec![
            Cell::new(&d.report_type),
            Cell::new(d.deleted_by.as_deref().unwrap_or("System")),
            Cell::new(number(d.total_deleted)),
        ]);
    }
    format!("{}\n{table}", "Deletion Analysis".bold())
}

fn activity(snapshot: &AnalyticsSnapshot) -> String {
    if snapshot.recent_activity.is_empty() {
        return no_data("Recent Activity");
    }
    let mut out = format!("{}\n", "Recent Activity".bold());
    for a in &snapshot.recent_activity {
        let stamp = short_timestamp(&a.uploaded_at);
        let name = if a.is_deleted {
            a.report_name.red().bold()
        } else {
            a.report_name.bold()
        };
        out.push_str(&format!("{stamp:>14}  {name}\n"));
        out.push_str(&format!(
            "{:>14}  [{}] {}\n",
            "",
            a.report_type,
            a.report_subtype.as_deref().unwrap_or("No subtype")
        ));
        out.push_str(&format!("{:>14}  Uploaded by User {}\n", "", a.user_id));
        if a.is_deleted {
            let by = a.deleted_by.as_deref().unwrap_or("unknown");
            let at = a.deleted_at.as_deref().map(short_timestamp).unwrap_or_default();
            out.push_str(&format!(
                "{:>14}  {}\n",
                "",
                format!("Deleted by User {by} on {at}").red()
            ));
        }
    }
    out
}
