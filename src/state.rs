use crate::charts::ChartSet;
use crate::models::ReportCount;
use crate::views::ReportTypeHierarchy;

/// Report-type selection applied to today's and the range report lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TypeFilter {
    #[default]
    All,
    Only(String),
}

impl TypeFilter {
    /// `"all"` (any case) selects everything; anything else is an exact type.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("all") || s.is_empty() {
            TypeFilter::All
        } else {
            TypeFilter::Only(s.to_string())
        }
    }

    pub fn matches(&self, report_type: &str) -> bool {
        match self {
            TypeFilter::All => true,
            TypeFilter::Only(t) => t == report_type,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            TypeFilter::All => "All Types",
            TypeFilter::Only(t) => t,
        }
    }
}

/// "All" followed by every report type in hierarchy order.
pub fn filter_choices(hierarchy: &ReportTypeHierarchy) -> Vec<TypeFilter> {
    std::iter::once(TypeFilter::All)
        .chain(hierarchy.types().map(|t| TypeFilter::Only(t.to_string())))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Trends,
    ReportTypes,
    Contributors,
    Deletions,
    RecentActivity,
}

impl Tab {
    pub const ALL: [Tab; 5] = [
        Tab::Trends,
        Tab::ReportTypes,
        Tab::Contributors,
        Tab::Deletions,
        Tab::RecentActivity,
    ];

    pub fn index(self) -> usize {
        Tab::ALL.iter().position(|t| *t == self).unwrap_or(0)
    }

    pub fn from_index(i: usize) -> Option<Tab> {
        Tab::ALL.get(i).copied()
    }

    pub fn title(self) -> &'static str {
        match self {
            Tab::Trends => "Trends",
            Tab::ReportTypes => "Report Types",
            Tab::Contributors => "Contributors",
            Tab::Deletions => "Deletions",
            Tab::RecentActivity => "Recent Activity",
        }
    }

    pub fn next(self) -> Tab {
        Tab::ALL[(self.index() + 1) % Tab::ALL.len()]
    }

    pub fn prev(self) -> Tab {
        Tab::ALL[(self.index() + Tab::ALL.len() - 1) % Tab::ALL.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Chart,
    Table,
}

impl ViewMode {
    pub fn toggled(self) -> ViewMode {
        match self {
            ViewMode::Chart => ViewMode::Table,
            ViewMode::Table => ViewMode::Chart,
        }
    }
}

/// UI-only state. The three axes are independent of each other.
#[derive(Debug, Default)]
pub struct ViewState {
    active_tab: Tab,
    view_mode: ViewMode,
    details: Option<ReportCount>,
    filter: TypeFilter,
}

impl ViewState {
    pub fn active_tab(&self) -> Tab {
        self.active_tab
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn filter(&self) -> &TypeFilter {
        &self.filter
    }

    pub fn details(&self) -> Option<&ReportCount> {
        self.details.as_ref()
    }

    /// Switch tabs. Charts belonging to the previous tab are released first.
    pub fn select_tab(&mut self, tab: Tab, charts: &mut ChartSet) {
        if tab == self.active_tab {
            return;
        }
        charts.release_all();
        self.active_tab = tab;
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.view_mode = mode;
    }

    pub fn toggle_view_mode(&mut self) {
        self.view_mode = self.view_mode.toggled();
    }

    pub fn set_filter(&mut self, filter: TypeFilter) {
        self.filter = filter;
    }

    /// Advance to the next filter choice; wraps back to "All".
    pub fn cycle_filter(&mut self, hierarchy: &ReportTypeHierarchy) {
        let choices = filter_choices(hierarchy);
        let next = choices
            .iter()
            .position(|c| *c == self.filter)
            .map(|i| (i + 1) % choices.len())
            .unwrap_or(0);
        self.filter = choices[next].clone();
    }

    /// Open the details dialog. Replaces any dialog already open.
    pub fn open_details(&mut self, record: ReportCount) {
        self.details = Some(record);
    }

    pub fn close_details(&mut self) {
        self.details = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::ChartBody;
    use crate::models::DistributionEntry;
    use crate::views::{build_hierarchy, Donut};

    fn record(t: &str) -> ReportCount {
        ReportCount {
            report_type: t.to_string(),
            count: 3,
            unique_patients: 2,
        }
    }

    fn hierarchy(types: &[&str]) -> ReportTypeHierarchy {
        let dist: Vec<DistributionEntry> = types
            .iter()
            .map(|t| DistributionEntry {
                report_type: t.to_string(),
                report_subtype: None,
                count: 1,
                unique_patients: 1,
            })
            .collect();
        build_hierarchy(&dist)
    }

    fn donut() -> ChartBody {
        ChartBody::Donut(Donut {
            labels: vec!["CT".to_string()],
            values: vec![1],
        })
    }

    #[test]
    fn test_defaults() {
        let state = ViewState::default();
        assert_eq!(state.active_tab(), Tab::Trends);
        assert_eq!(state.view_mode(), ViewMode::Chart);
        assert_eq!(state.filter(), &TypeFilter::All);
        assert!(state.details().is_none());
    }

    #[test]
    fn test_tab_navigation_wraps() {
        assert_eq!(Tab::Trends.prev(), Tab::RecentActivity);
        assert_eq!(Tab::RecentActivity.next(), Tab::Trends);
        assert_eq!(Tab::from_index(3), Some(Tab::Deletions));
        assert_eq!(Tab::from_index(5), None);
        for tab in Tab::ALL {
            assert_eq!(Tab::from_index(tab.index()), Some(tab));
        }
    }

    #[test]
    fn test_select_tab_releases_charts() {
        let mut state = ViewState::default();
        let mut charts = ChartSet::new();
        charts.mount("donut", "Types", donut()).unwrap();
        assert_eq!(charts.live(), 1);

        state.select_tab(Tab::Contributors, &mut charts);
        assert_eq!(state.active_tab(), Tab::Contributors);
        assert_eq!(charts.live(), 0);
        assert_eq!(charts.released(), 1);
    }

    #[test]
    fn test_select_same_tab_keeps_charts() {
        let mut state = ViewState::default();
        let mut charts = ChartSet::new();
        charts.mount("donut", "Types", donut()).unwrap();
        state.select_tab(Tab::Trends, &mut charts);
        assert_eq!(charts.live(), 1);
    }

    #[test]
    fn test_view_mode_independent_of_tab_and_dialog() {
        let mut state = ViewState::default();
        let mut charts = ChartSet::new();
        state.toggle_view_mode();
        state.open_details(record("CT"));
        state.select_tab(Tab::Deletions, &mut charts);
        assert_eq!(state.view_mode(), ViewMode::Table);
        assert_eq!(state.details().map(|r| r.report_type.as_str()), Some("CT"));
        state.set_view_mode(ViewMode::Chart);
        assert_eq!(state.active_tab(), Tab::Deletions);
    }

    #[test]
    fn test_details_single_instance() {
        let mut state = ViewState::default();
        state.open_details(record("CT"));
        state.open_details(record("MRI"));
        assert_eq!(state.details().unwrap().report_type, "MRI");
        state.close_details();
        assert!(state.details().is_none());
    }

    #[test]
    fn test_cycle_filter() {
        let h = hierarchy(&["X-Ray", "MRI"]);
        let mut state = ViewState::default();
        state.cycle_filter(&h);
        assert_eq!(state.filter(), &TypeFilter::Only("X-Ray".to_string()));
        state.cycle_filter(&h);
        assert_eq!(state.filter(), &TypeFilter::Only("MRI".to_string()));
        state.cycle_filter(&h);
        assert_eq!(state.filter(), &TypeFilter::All);
    }

    #[test]
    fn test_cycle_filter_resets_unknown_selection() {
        let h = hierarchy(&["CT"]);
        let mut state = ViewState::default();
        state.set_filter(TypeFilter::Only("Gone".to_string()));
        state.cycle_filter(&h);
        assert_eq!(state.filter(), &TypeFilter::All);
    }

    #[test]
    fn test_type_filter_parse() {
        assert_eq!(TypeFilter::parse("all"), TypeFilter::All);
        assert_eq!(TypeFilter::parse("ALL"), TypeFilter::All);
        assert_eq!(TypeFilter::parse("MRI"), TypeFilter::Only("MRI".to_string()));
        assert!(TypeFilter::All.matches("anything"));
        assert_eq!(TypeFilter::All.label(), "All Types");
    }
}
