//! Per-tab view shapes derived from an [`AnalyticsSnapshot`].
//!
//! Everything here is a pure function of the snapshot and the current
//! filter. The dashboard calls these on every draw; nothing is cached.

use std::collections::HashMap;

use crate::models::{parse_day, DailyActivity, DistributionEntry, MonthlyTrend, ReportCount};
use crate::state::TypeFilter;

// ---------------------------------------------------------------------------
// Report type hierarchy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtypeCount {
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeGroup {
    pub report_type: String,
    pub count: u64,
    pub subtypes: Vec<SubtypeCount>,
}

/// report_type -> aggregate count plus subtype breakdown, in first-occurrence
/// order of the report type in the distribution list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportTypeHierarchy {
    groups: Vec<TypeGroup>,
}

impl ReportTypeHierarchy {
    pub fn get(&self, report_type: &str) -> Option<&TypeGroup> {
        self.groups.iter().find(|g| g.report_type == report_type)
    }

    pub fn groups(&self) -> &[TypeGroup] {
        &self.groups
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.report_type.as_str())
    }
}

pub fn build_hierarchy(distribution: &[DistributionEntry]) -> ReportTypeHierarchy {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<TypeGroup> = Vec::new();

    for item in distribution {
        let slot = *index.entry(item.report_type.as_str()).or_insert_with(|| {
            groups.push(TypeGroup {
                report_type: item.report_type.clone(),
                count: 0,
                subtypes: Vec::new(),
            });
            groups.len() - 1
        });
        let group = &mut groups[slot];
        group.count = group.count.saturating_add(item.count);
        if let Some(sub) = item.report_subtype.as_deref().filter(|s| !s.is_empty()) {
            group.subtypes.push(SubtypeCount {
                name: sub.to_string(),
                count: item.count,
            });
        }
    }

    ReportTypeHierarchy { groups }
}

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

/// Exact match on report type; `All` passes everything through. Order is kept.
pub fn filter_reports(reports: &[ReportCount], filter: &TypeFilter) -> Vec<ReportCount> {
    reports
        .iter()
        .filter(|r| filter.matches(&r.report_type))
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// Colors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeColor {
    Primary,
    Secondary,
    Success,
    Error,
    Warning,
}

pub const PALETTE: [ThemeColor; 5] = [
    ThemeColor::Primary,
    ThemeColor::Secondary,
    ThemeColor::Success,
    ThemeColor::Error,
    ThemeColor::Warning,
];

/// Colors for `count` series or categories, cycling the palette by index.
pub fn palette_colors(count: usize) -> Vec<ThemeColor> {
    (0..count).map(|i| PALETTE[i % PALETTE.len()]).collect()
}

// ---------------------------------------------------------------------------
// Chart shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Donut {
    pub labels: Vec<String>,
    pub values: Vec<u64>,
}

impl Donut {
    pub fn total(&self) -> u64 {
        self.values.iter().fold(0u64, |acc, v| acc.saturating_add(*v))
    }

    /// Whole-number share of each slice, as drawn on the slice labels.
    pub fn percentages(&self) -> Vec<u64> {
        let total = self.total();
        self.values
            .iter()
            .map(|&v| {
                if total == 0 {
                    0
                } else {
                    (v as f64 * 100.0 / total as f64).round() as u64
                }
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

pub fn hierarchy_donut(hierarchy: &ReportTypeHierarchy) -> Donut {
    Donut {
        labels: hierarchy.types().map(str::to_string).collect(),
        values: hierarchy.groups().iter().map(|g| g.count).collect(),
    }
}

pub fn reports_donut(reports: &[ReportCount]) -> Donut {
    Donut {
        labels: reports.iter().map(|r| r.report_type.clone()).collect(),
        values: reports.iter().map(|r| r.count).collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Series {
    pub name: &'static str,
    pub data: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesChart {
    pub categories: Vec<String>,
    pub series: Vec<Series>,
}

impl SeriesChart {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn max_value(&self) -> u64 {
        self.series
            .iter()
            .flat_map(|s| s.data.iter().copied())
            .max()
            .unwrap_or(0)
    }
}

pub fn monthly_series(trends: &[MonthlyTrend]) -> SeriesChart {
    SeriesChart {
        categories: trends.iter().map(|t| t.month.clone()).collect(),
        series: vec![
            Series {
                name: "Uploads",
                data: trends.iter().map(|t| t.total_uploads).collect(),
            },
            Series {
                name: "Deletions",
                data: trends.iter().map(|t| t.deletions).collect(),
            },
            Series {
                name: "Unique Patients",
                data: trends.iter().map(|t| t.unique_patients).collect(),
            },
            Series {
                name: "Active Uploaders",
                data: trends.iter().map(|t| t.active_uploaders).collect(),
            },
        ],
    }
}

pub fn daily_series(activity: &[DailyActivity]) -> SeriesChart {
    SeriesChart {
        categories: activity
            .iter()
            .map(|a| match parse_day(&a.date) {
                Some(day) => day.format("%b %d").to_string(),
                None => a.date.clone(),
            })
            .collect(),
        series: vec![
            Series {
                name: "Uploads",
                data: activity.iter().map(|a| a.uploads).collect(),
            },
            Series {
                name: "Deletions",
                data: activity.iter().map(|a| a.deletions).collect(),
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(t: &str, sub: Option<&str>, count: u64) -> DistributionEntry {
        DistributionEntry {
            report_type: t.to_string(),
            report_subtype: sub.map(str::to_string),
            count,
            unique_patients: 0,
        }
    }

    fn report(t: &str, count: u64) -> ReportCount {
        ReportCount {
            report_type: t.to_string(),
            count,
            unique_patients: count / 2,
        }
    }

    #[test]
    fn test_hierarchy_example() {
        let dist = vec![
            entry("X-Ray", None, 5),
            entry("X-Ray", Some("Chest"), 3),
            entry("MRI", None, 2),
        ];
        let h = build_hierarchy(&dist);
        assert_eq!(h.types().collect::<Vec<_>>(), vec!["X-Ray", "MRI"]);
        let xray = h.get("X-Ray").unwrap();
        assert_eq!(xray.count, 8);
        assert_eq!(
            xray.subtypes,
            vec![SubtypeCount { name: "Chest".to_string(), count: 3 }]
        );
        let mri = h.get("MRI").unwrap();
        assert_eq!(mri.count, 2);
        assert!(mri.subtypes.is_empty());
    }

    #[test]
    fn test_hierarchy_counts_are_order_independent() {
        let dist = vec![
            entry("CT", Some("Head"), 4),
            entry("MRI", None, 2),
            entry("CT", None, 1),
            entry("X-Ray", Some("Hand"), 7),
            entry("MRI", Some("Knee"), 6),
        ];
        let base = build_hierarchy(&dist);
        let mut permuted = dist.clone();
        for rotation in 0..permuted.len() {
            permuted.rotate_left(1);
            let mut reversed = permuted.clone();
            reversed.reverse();
            for candidate in [&permuted, &reversed] {
                let h = build_hierarchy(candidate);
                for group in base.groups() {
                    assert_eq!(
                        h.get(&group.report_type).unwrap().count,
                        group.count,
                        "rotation {rotation}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_subtypes_keep_encounter_order() {
        let dist = vec![
            entry("MRI", Some("Spine"), 1),
            entry("MRI", Some("Knee"), 2),
            entry("MRI", Some("Brain"), 3),
        ];
        let h = build_hierarchy(&dist);
        let names: Vec<&str> = h.get("MRI").unwrap().subtypes.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Spine", "Knee", "Brain"]);
    }

    #[test]
    fn test_empty_subtype_not_collected() {
        let h = build_hierarchy(&[entry("CT", Some(""), 2)]);
        assert!(h.get("CT").unwrap().subtypes.is_empty());
    }

    #[test]
    fn test_filter_all_passes_through() {
        let reports = vec![report("CT", 1), report("MRI", 2), report("CT", 3)];
        assert_eq!(filter_reports(&reports, &TypeFilter::All), reports);
    }

    #[test]
    fn test_filter_only_keeps_matching_in_order() {
        let reports = vec![report("CT", 1), report("MRI", 2), report("CT", 3)];
        let filtered = filter_reports(&reports, &TypeFilter::Only("CT".to_string()));
        assert_eq!(filtered, vec![report("CT", 1), report("CT", 3)]);
        let none = filter_reports(&reports, &TypeFilter::Only("ct".to_string()));
        assert!(none.is_empty());
    }

    #[test]
    fn test_palette_cycles() {
        let colors = palette_colors(7);
        assert_eq!(colors.len(), 7);
        assert_eq!(colors[0], ThemeColor::Primary);
        assert_eq!(colors[4], ThemeColor::Warning);
        assert_eq!(colors[5], ThemeColor::Primary);
        assert_eq!(colors[6], ThemeColor::Secondary);
        assert_eq!(palette_colors(3), palette_colors(3));
        assert!(palette_colors(0).is_empty());
    }

    #[test]
    fn test_donut_percentages() {
        let d = reports_donut(&[report("CT", 1), report("MRI", 2)]);
        assert_eq!(d.total(), 3);
        assert_eq!(d.percentages(), vec![33, 67]);
        let empty = reports_donut(&[]);
        assert!(empty.is_empty());
        assert!(empty.percentages().is_empty());
    }

    #[test]
    fn test_huge_counts_saturate() {
        let h = build_hierarchy(&[entry("CT", None, u64::MAX), entry("CT", Some("Head"), 5)]);
        assert_eq!(h.get("CT").unwrap().count, u64::MAX);
        let d = reports_donut(&[report("CT", u64::MAX), report("MRI", 2)]);
        assert_eq!(d.total(), u64::MAX);
    }

    #[test]
    fn test_daily_series_labels() {
        let activity = vec![
            DailyActivity { date: "2025-03-03".to_string(), uploads: 4, deletions: 1 },
            DailyActivity { date: "2025-03-04T00:00:00.000Z".to_string(), uploads: 2, deletions: 0 },
        ];
        let chart = daily_series(&activity);
        assert_eq!(chart.categories, vec!["Mar 03", "Mar 04"]);
        assert_eq!(chart.series[0].data, vec![4, 2]);
        assert_eq!(chart.series[1].data, vec![1, 0]);
        assert_eq!(chart.max_value(), 4);
    }

    #[test]
    fn test_monthly_series_has_four_series() {
        let trends = vec![MonthlyTrend {
            month: "2025-03".to_string(),
            total_uploads: 10,
            deletions: 2,
            unique_patients: 9,
            active_uploaders: 3,
        }];
        let chart = monthly_series(&trends);
        let names: Vec<&str> = chart.series.iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Uploads", "Deletions", "Unique Patients", "Active Uploaders"]);
        assert_eq!(chart.categories, vec!["2025-03"]);
    }
}
