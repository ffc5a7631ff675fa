use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Constraint, Flex, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs},
    DefaultTerminal, Frame,
};

use crate::charts::{ChartBody, ChartSet};
use crate::client::{AnalyticsSource, HttpSource};
use crate::error::Result;
use crate::export::{default_export_path, write_csv};
use crate::fetcher::{Fetcher, LoadState};
use crate::fmt::{number, percent, short_timestamp};
use crate::models::{AnalyticsSnapshot, ReportCount};
use crate::range::{local_today, parse_date, DateRange, QuickRange};
use crate::settings::load_settings;
use crate::state::{Tab, TypeFilter, ViewMode, ViewState};
use crate::tui::{
    install_panic_hook, theme_color, wrap_text, ERROR_STYLE, FOOTER_STYLE, HEADER_ROW_STYLE,
    HEADER_STYLE, SELECTED_STYLE,
};
use crate::views::{
    build_hierarchy, daily_series, filter_reports, hierarchy_donut, monthly_series, reports_donut,
    ThemeColor,
};

const TITLE: &str = "Medical Reports Analytics";
const NO_DATA: &str = "No data available for the selected date range and filters.";
const NO_DATA_HINT: &str = "Try adjusting the date range or filters to find relevant data.";
const NO_DATA_KEYS: &str = "r=Reload Data  0=Reset Filters";

/// How long to wait for a key before checking on the in-flight request.
const TICK: Duration = Duration::from_millis(100);

const BOLD: Style = Style::new().add_modifier(Modifier::BOLD);

enum InputMode {
    Normal,
    EditStart(String),
    EditEnd(String),
}

#[derive(Debug, PartialEq)]
enum DashboardAction {
    Continue,
    Quit,
}

struct Dashboard {
    fetcher: Fetcher,
    /// The requested range. Drives the date inputs; labels use the
    /// snapshot's effective range.
    range: DateRange,
    view: ViewState,
    charts: ChartSet,
    input: InputMode,
    selected_row: usize,
    scroll: u16,
    export_dir: String,
    status_message: Option<String>,
}

impl Dashboard {
    fn new(source: Arc<dyn AnalyticsSource>, range: DateRange, export_dir: String) -> Self {
        Self {
            fetcher: Fetcher::new(source),
            range,
            view: ViewState::default(),
            charts: ChartSet::new(),
            input: InputMode::Normal,
            selected_row: 0,
            scroll: 0,
            export_dir,
            status_message: None,
        }
    }

    fn start(&mut self) {
        self.fetcher.request(self.range, local_today());
    }

    fn set_range(&mut self, range: DateRange) {
        self.range = range;
        self.selected_row = 0;
        self.fetcher.request(range, local_today());
    }

    fn reload(&mut self) {
        self.fetcher.refresh(self.range, local_today());
    }

    fn select_tab(&mut self, tab: Tab) {
        self.view.select_tab(tab, &mut self.charts);
        self.scroll = 0;
    }

    /// Range reports after the report-type filter.
    fn filtered_range_reports(&self) -> Vec<ReportCount> {
        self.fetcher
            .snapshot()
            .map(|s| filter_reports(&s.range_reports, self.view.filter()))
            .unwrap_or_default()
    }

    fn export_csv(&mut self) {
        if self.fetcher.snapshot().is_none() {
            self.status_message = Some("Nothing to export.".to_string());
            return;
        }
        let reports = self.filtered_range_reports();
        let path = default_export_path(&self.export_dir, local_today());
        self.status_message = Some(match write_csv(&reports, &path) {
            Ok(p) => format!("Exported {}", p.display()),
            Err(e) => format!("Export failed: {e}"),
        });
    }

    // -----------------------------------------------------------------------
    // Keys
    // -----------------------------------------------------------------------

    fn handle_key(&mut self, code: KeyCode) -> DashboardAction {
        self.status_message = None;

        if !matches!(self.input, InputMode::Normal) {
            self.handle_edit_key(code);
            return DashboardAction::Continue;
        }

        if self.view.details().is_some() {
            if matches!(code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q')) {
                self.view.close_details();
            }
            return DashboardAction::Continue;
        }

        match code {
            KeyCode::Char('q') | KeyCode::Esc => return DashboardAction::Quit,
            KeyCode::Tab | KeyCode::Right => self.select_tab(self.view.active_tab().next()),
            KeyCode::BackTab | KeyCode::Left => self.select_tab(self.view.active_tab().prev()),
            KeyCode::Char(c @ '1'..='6') => {
                let quick = QuickRange::ALL[c as usize - '1' as usize];
                self.set_range(quick.resolve(local_today()));
            }
            KeyCode::Char('0') => {
                self.view.set_filter(TypeFilter::All);
                self.set_range(DateRange::today(local_today()));
            }
            KeyCode::F(n) => {
                if let Some(tab) = Tab::from_index(usize::from(n).saturating_sub(1)) {
                    self.select_tab(tab);
                }
            }
            KeyCode::Char('s') => self.input = InputMode::EditStart(self.range.start_param()),
            KeyCode::Char('e') => self.input = InputMode::EditEnd(self.range.end_param()),
            KeyCode::Char('r') => self.reload(),
            KeyCode::Char('v') => self.view.toggle_view_mode(),
            KeyCode::Char('c') => self.view.set_view_mode(ViewMode::Chart),
            KeyCode::Char('t') => self.view.set_view_mode(ViewMode::Table),
            KeyCode::Char('f') => {
                if let Some(snapshot) = self.fetcher.snapshot() {
                    let hierarchy = build_hierarchy(&snapshot.distribution);
                    self.view.cycle_filter(&hierarchy);
                    self.selected_row = 0;
                }
            }
            KeyCode::Up => self.selected_row = self.selected_row.saturating_sub(1),
            KeyCode::Down => {
                let len = self.filtered_range_reports().len();
                if self.selected_row + 1 < len {
                    self.selected_row += 1;
                }
            }
            KeyCode::PageUp => self.scroll = self.scroll.saturating_sub(10),
            KeyCode::PageDown => self.scroll = self.scroll.saturating_add(10),
            KeyCode::Enter if self.view.view_mode() == ViewMode::Table => {
                if let Some(record) = self.filtered_range_reports().into_iter().nth(self.selected_row) {
                    self.view.open_details(record);
                }
            }
            KeyCode::Char('x') => self.export_csv(),
            _ => {}
        }
        DashboardAction::Continue
    }

    fn handle_edit_key(&mut self, code: KeyCode) {
        let buf = match &mut self.input {
            InputMode::EditStart(b) | InputMode::EditEnd(b) => b,
            InputMode::Normal => return,
        };
        match code {
            KeyCode::Esc => self.input = InputMode::Normal,
            KeyCode::Backspace => {
                buf.pop();
            }
            KeyCode::Char(c) if (c.is_ascii_digit() || c == '-') && buf.len() < 10 => buf.push(c),
            KeyCode::Enter => {
                let editing_start = matches!(self.input, InputMode::EditStart(_));
                let parsed = match &self.input {
                    InputMode::EditStart(b) | InputMode::EditEnd(b) => parse_date(b),
                    InputMode::Normal => return,
                };
                self.input = InputMode::Normal;
                match parsed {
                    Ok(day) => {
                        let range = if editing_start {
                            DateRange::new(day, self.range.end)
                        } else {
                            DateRange::new(self.range.start, day)
                        };
                        self.set_range(range);
                    }
                    Err(e) => self.status_message = Some(e.to_string()),
                }
            }
            _ => {}
        }
    }

    // -----------------------------------------------------------------------
    // Drawing
    // -----------------------------------------------------------------------

    fn draw(&mut self, frame: &mut Frame) {
        if self.fetcher.snapshot().is_some() {
            self.draw_ready(frame);
            return;
        }
        match self.fetcher.state() {
            LoadState::Failed(msg) => draw_failed(frame, msg),
            LoadState::Invalid(violation) => self.draw_invalid(frame, &violation.to_string()),
            _ => draw_loading(frame),
        }
    }

    fn date_controls(&self) -> Line<'static> {
        let field = |label: &str, value: String, editing: bool| -> Vec<Span<'static>> {
            let style = if editing { SELECTED_STYLE } else { BOLD };
            let cursor = if editing { "▏" } else { "" };
            vec![
                Span::styled(format!(" {label} "), FOOTER_STYLE),
                Span::styled(format!("{value}{cursor}"), style),
            ]
        };
        let (start, start_editing) = match &self.input {
            InputMode::EditStart(b) => (b.clone(), true),
            _ => (self.range.start_param(), false),
        };
        let (end, end_editing) = match &self.input {
            InputMode::EditEnd(b) => (b.clone(), true),
            _ => (self.range.end_param(), false),
        };

        let mut spans = field("Start", start, start_editing);
        spans.extend(field("End", end, end_editing));
        spans.push(Span::raw("   "));
        for (i, quick) in QuickRange::ALL.iter().enumerate() {
            spans.push(Span::styled(format!("{}=", i + 1), FOOTER_STYLE));
            spans.push(Span::raw(format!("{}  ", quick.label())));
        }
        spans.push(Span::styled("0=", FOOTER_STYLE));
        spans.push(Span::raw("Reset"));
        Line::from(spans)
    }

    fn draw_invalid(&self, frame: &mut Frame, msg: &str) {
        let area = frame.area();
        let [header_area, sep, controls_area, _, error_area, _, hints_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Fill(1),
            Constraint::Length(1),
        ])
        .areas(area);

        draw_header(frame, header_area, sep);
        frame.render_widget(Paragraph::new(self.date_controls()), controls_area);
        frame.render_widget(
            Paragraph::new(Span::styled(format!(" {msg}"), ERROR_STYLE)),
            error_area,
        );
        self.draw_hints(frame, hints_area, " s/e=edit dates  1-6=quick range  0=reset  q=quit");
    }

    fn draw_hints(&self, frame: &mut Frame, area: Rect, default: &str) {
        let widget = match &self.status_message {
            Some(msg) => Paragraph::new(format!(" {msg}")).style(HEADER_STYLE),
            None => Paragraph::new(default.to_string()).style(FOOTER_STYLE),
        };
        frame.render_widget(widget, area);
    }

    fn draw_ready(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let [header_area, sep1, cards_area, sep2, analysis_area, sep3, tabs_area, content_area, hints_area] =
            Layout::vertical([
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(2),
                Constraint::Length(1),
                Constraint::Length(13),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Fill(1),
                Constraint::Length(1),
            ])
            .areas(area);

        draw_header(frame, header_area, sep1);
        draw_separator(frame, sep2);
        draw_separator(frame, sep3);

        let Some(snapshot) = self.fetcher.snapshot() else {
            return;
        };

        draw_summary_cards(frame, cards_area, snapshot);
        self.draw_analysis(frame, analysis_area);

        let tabs = Tabs::new(Tab::ALL.iter().map(|t| t.title()))
            .select(self.view.active_tab().index())
            .highlight_style(HEADER_STYLE)
            .divider(" | ");
        frame.render_widget(tabs, tabs_area);

        self.draw_tab(frame, content_area);

        self.draw_hints(
            frame,
            hints_area,
            " Tab/F1-F5=tabs  s/e=dates  1-6=quick range  0=reset  f=type  v=chart/table  Enter=details  x=export  r=reload  q=quit",
        );

        if let Some(record) = self.view.details() {
            let subtypes = self
                .fetcher
                .snapshot()
                .map(|s| build_hierarchy(&s.distribution))
                .and_then(|h| {
                    h.get(&record.report_type).map(|g| {
                        g.subtypes
                            .iter()
                            .map(|s| s.name.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                })
                .filter(|s| !s.is_empty());
            draw_details(frame, area, record, subtypes.as_deref());
        }
    }

    fn draw_analysis(&mut self, frame: &mut Frame, area: Rect) {
        let [title_area, controls_area, today_area, body_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Fill(1),
        ])
        .areas(area);

        let Some(snapshot) = self.fetcher.snapshot() else {
            return;
        };
        let filtered = filter_reports(&snapshot.range_reports, self.view.filter());
        let mode = match self.view.view_mode() {
            ViewMode::Chart => "Chart",
            ViewMode::Table => "Table",
        };

        frame.render_widget(
            Paragraph::new(Line::from(vec![
                Span::styled(
                    format!(" Reports Analysis ({})", snapshot.effective_range.label()),
                    BOLD,
                ),
                Span::styled("   Report Type: ", FOOTER_STYLE),
                Span::raw(self.view.filter().label().to_string()),
                Span::styled("   View: ", FOOTER_STYLE),
                Span::raw(mode),
            ])),
            title_area,
        );
        frame.render_widget(Paragraph::new(self.date_controls()), controls_area);

        let todays = filter_reports(&snapshot.todays_reports, self.view.filter());
        let mut today_line = vec![Span::styled(" Today's Reports: ", FOOTER_STYLE)];
        if todays.is_empty() {
            today_line.push(Span::raw("none"));
        }
        for r in &todays {
            today_line.push(Span::raw(format!("{} ", r.report_type)));
            today_line.push(Span::styled(format!("{}  ", number(r.count)), BOLD));
        }
        frame.render_widget(Paragraph::new(Line::from(today_line)), today_area);

        match self.view.view_mode() {
            ViewMode::Chart => draw_chart(
                frame,
                body_area,
                &mut self.charts,
                "range",
                "Reports by Type",
                ChartBody::Donut(reports_donut(&filtered)),
            ),
            ViewMode::Table if filtered.is_empty() => draw_no_data(frame, body_area),
            ViewMode::Table => {
                let visible = body_area.height.saturating_sub(1) as usize;
                let offset = self.selected_row.saturating_sub(visible.saturating_sub(1));
                let rows: Vec<Row> = filtered
                    .iter()
                    .enumerate()
                    .skip(offset)
                    .take(visible)
                    .map(|(i, r)| {
                        let row = Row::new([
                            Cell::from(format!(" {}", r.report_type)),
                            Cell::from(number(r.count)),
                            Cell::from(number(r.unique_patients)),
                        ]);
                        if i == self.selected_row {
                            row.style(SELECTED_STYLE)
                        } else {
                            row
                        }
                    })
                    .collect();
                let table = Table::new(
                    rows,
                    [Constraint::Fill(1), Constraint::Length(10), Constraint::Length(16)],
                )
                .header(Row::new([" Report Type", "Count", "Unique Patients"]).style(HEADER_ROW_STYLE))
                .column_spacing(2);
                frame.render_widget(table, body_area);
            }
        }
    }

    fn draw_tab(&mut self, frame: &mut Frame, area: Rect) {
        let Some(snapshot) = self.fetcher.snapshot() else {
            return;
        };
        match self.view.active_tab() {
            Tab::Trends => {
                let [monthly_area, daily_area] =
                    Layout::vertical([Constraint::Percentage(50), Constraint::Percentage(50)])
                        .areas(area);
                draw_chart(
                    frame,
                    monthly_area,
                    &mut self.charts,
                    "monthly",
                    "Monthly Trends",
                    ChartBody::Lines(monthly_series(&snapshot.monthly_trends)),
                );
                draw_chart(
                    frame,
                    daily_area,
                    &mut self.charts,
                    "daily",
                    "Daily Activity",
                    ChartBody::Bars(daily_series(&snapshot.daily_activity)),
                );
            }
            Tab::ReportTypes => {
                let [donut_area, table_area] =
                    Layout::horizontal([Constraint::Percentage(45), Constraint::Percentage(55)])
                        .areas(area);
                let hierarchy = build_hierarchy(&snapshot.distribution);
                draw_chart(
                    frame,
                    donut_area,
                    &mut self.charts,
                    "types",
                    "Report Type Distribution",
                    ChartBody::Donut(hierarchy_donut(&hierarchy)),
                );
                draw_subtypes(frame, table_area, snapshot, self.scroll);
            }
            Tab::Contributors => draw_contributors(frame, area, snapshot, self.scroll),
            Tab::Deletions => draw_deletions(frame, area, snapshot, self.scroll),
            Tab::RecentActivity => draw_timeline(frame, area, snapshot, self.scroll),
        }
    }
}

// ---------------------------------------------------------------------------
// Drawing helpers
// ---------------------------------------------------------------------------

fn draw_separator(frame: &mut Frame, area: Rect) {
    frame.render_widget(
        Paragraph::new("━".repeat(area.width as usize)).style(FOOTER_STYLE),
        area,
    );
}

fn draw_header(frame: &mut Frame, header_area: Rect, sep_area: Rect) {
    frame.render_widget(Paragraph::new(format!(" {TITLE}")).style(HEADER_STYLE), header_area);
    draw_separator(frame, sep_area);
}

fn draw_loading(frame: &mut Frame) {
    let area = frame.area();
    let [_, middle, _] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(1),
        Constraint::Fill(1),
    ])
    .areas(area);
    frame.render_widget(
        Paragraph::new("Fetching Data ...")
            .style(HEADER_STYLE)
            .centered(),
        middle,
    );
}

fn draw_failed(frame: &mut Frame, msg: &str) {
    let area = frame.area();
    let [_, message_area, _, retry_area, _] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Fill(1),
    ])
    .areas(area);
    frame.render_widget(Paragraph::new(msg.to_string()).style(ERROR_STYLE).centered(), message_area);
    frame.render_widget(
        Paragraph::new("r=Reload Data  q=quit").style(FOOTER_STYLE).centered(),
        retry_area,
    );
}

fn draw_no_data(frame: &mut Frame, area: Rect) {
    let lines = vec![
        Line::from(""),
        Line::from(NO_DATA).centered(),
        Line::from(Span::styled(NO_DATA_HINT, FOOTER_STYLE)).centered(),
        Line::from(""),
        Line::from(Span::styled(NO_DATA_KEYS, BOLD)).centered(),
    ];
    frame.render_widget(Paragraph::new(lines), area);
}

/// Draw one chart. An empty series gets the no-data placeholder; a chart that
/// fails to prepare gets an inline message and leaves its neighbours alone.
fn draw_chart(
    frame: &mut Frame,
    area: Rect,
    charts: &mut ChartSet,
    slot: &'static str,
    title: &str,
    body: ChartBody,
) {
    if body.is_empty() {
        draw_no_data(frame, area);
        return;
    }
    match charts.mount(slot, title, body) {
        Ok(handle) => handle.render(frame, area),
        Err(_) => frame.render_widget(
            Paragraph::new(vec![
                Line::from(Span::styled(format!(" {title}"), BOLD)),
                Line::from(Span::styled(" Chart rendering failed", ERROR_STYLE)),
            ]),
            area,
        ),
    }
}

fn draw_summary_cards(frame: &mut Frame, area: Rect, snapshot: &AnalyticsSnapshot) {
    let s = &snapshot.summary;
    let cards = [
        ("Total Reports", number(s.total_reports), ThemeColor::Primary),
        ("Unique Patients", number(s.total_unique_patients), ThemeColor::Success),
        ("Today's Uploads", number(s.todays_uploads), ThemeColor::Warning),
        ("Deletion Rate", percent(s.deletion_rate), ThemeColor::Error),
    ];
    let columns = Layout::horizontal([Constraint::Ratio(1, 4); 4]).split(area);
    for (i, (label, value, color)) in cards.into_iter().enumerate() {
        let lines = vec![
            Line::from(Span::styled(format!(" {label}"), FOOTER_STYLE)),
            Line::from(Span::styled(
                format!(" {value}"),
                Style::default().fg(theme_color(color)).add_modifier(Modifier::BOLD),
            )),
        ];
        frame.render_widget(Paragraph::new(lines), columns[i]);
    }
}

fn section_title(title: &str) -> Line<'static> {
    Line::from(Span::styled(format!(" {title}"), BOLD))
}

fn draw_table(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    header: Vec<&'static str>,
    rows: Vec<Vec<String>>,
    widths: Vec<Constraint>,
    scroll: u16,
) {
    let [title_area, table_area] =
        Layout::vertical([Constraint::Length(1), Constraint::Fill(1)]).areas(area);
    frame.render_widget(Paragraph::new(section_title(title)), title_area);

    if rows.is_empty() {
        draw_no_data(frame, table_area);
        return;
    }
    let visible = table_area.height.saturating_sub(1) as usize;
    let max_offset = rows.len().saturating_sub(visible);
    let offset = (scroll as usize).min(max_offset);
    let body: Vec<Row> = rows
        .into_iter()
        .skip(offset)
        .take(visible)
        .map(|cells| Row::new(cells.into_iter().map(Cell::from)))
        .collect();
    let table = Table::new(body, widths)
        .header(Row::new(header).style(HEADER_ROW_STYLE))
        .column_spacing(2);
    frame.render_widget(table, table_area);
}

fn draw_subtypes(frame: &mut Frame, area: Rect, snapshot: &AnalyticsSnapshot, scroll: u16) {
    let rows = snapshot
        .distribution
        .iter()
        .map(|d| {
            vec![
                format!(" {}", d.report_type),
                d.report_subtype.clone().unwrap_or_else(|| "N/A".to_string()),
                number(d.count),
                number(d.unique_patients),
            ]
        })
        .collect();
    draw_table(
        frame,
        area,
        "Report Subtypes Analysis",
        vec![" Type", "Subtype", "Reports", "Patients"],
        rows,
        vec![
            Constraint::Fill(1),
            Constraint::Fill(1),
            Constraint::Length(8),
            Constraint::Length(8),
        ],
        scroll,
    );
}

fn draw_contributors(frame: &mut Frame, area: Rect, snapshot: &AnalyticsSnapshot, scroll: u16) {
    let rows = snapshot
        .top_contributors
        .iter()
        .map(|c| {
            vec![
                format!(" User {}", c.user_id),
                number(c.report_count),
                number(c.unique_patients),
                number(c.report_types_uploaded),
            ]
        })
        .collect();
    draw_table(
        frame,
        area,
        "Top Contributors",
        vec![" User ID", "Reports Uploaded", "Unique Patients", "Report Types"],
        rows,
        vec![
            Constraint::Fill(1),
            Constraint::Length(16),
            Constraint::Length(16),
            Constraint::Length(12),
        ],
        scroll,
    );
}

fn draw_deletions(frame: &mut Frame, area: Rect, snapshot: &AnalyticsSnapshot, scroll: u16) {
    let rows = snapshot
        .deletion_analysis
        .iter()
        .map(|d| {
            vec![
                format!(" {}", d.report_type),
                d.deleted_by.clone().unwrap_or_else(|| "System".to_string()),
                number(d.total_deleted),
            ]
        })
        .collect();
    draw_table(
        frame,
        area,
        "Deletion Analysis",
        vec![" Report Type", "Deleted By", "Total Deleted"],
        rows,
        vec![Constraint::Fill(1), Constraint::Fill(1), Constraint::Length(13)],
        scroll,
    );
}

fn draw_timeline(frame: &mut Frame, area: Rect, snapshot: &AnalyticsSnapshot, scroll: u16) {
    let [title_area, body_area] =
        Layout::vertical([Constraint::Length(1), Constraint::Fill(1)]).areas(area);
    frame.render_widget(Paragraph::new(section_title("Recent Activity")), title_area);

    if snapshot.recent_activity.is_empty() {
        draw_no_data(frame, body_area);
        return;
    }

    let primary = Style::default().fg(theme_color(ThemeColor::Primary));
    let error = Style::default().fg(theme_color(ThemeColor::Error));
    let text_width = (body_area.width as usize).saturating_sub(20);
    let last = snapshot.recent_activity.len() - 1;

    let mut lines: Vec<Line> = Vec::new();
    for (i, a) in snapshot.recent_activity.iter().enumerate() {
        let dot_style = if a.is_deleted { error } else { primary };
        let gutter = if i < last { "│" } else { " " };
        let (name, _) = wrap_text(&a.report_name, text_width);
        for (n, name_line) in name.lines().enumerate() {
            let stamp = if n == 0 { short_timestamp(&a.uploaded_at) } else { String::new() };
            let dot = if n == 0 { "●" } else { gutter };
            lines.push(Line::from(vec![
                Span::styled(format!(" {stamp:>14} "), FOOTER_STYLE),
                Span::styled(dot.to_string(), dot_style),
                Span::styled(format!("  {name_line}"), BOLD),
            ]));
        }
        let detail = |text: String, style: Style| {
            Line::from(vec![
                Span::raw(format!(" {:>14} ", "")),
                Span::styled(gutter.to_string(), dot_style),
                Span::styled(format!("  {text}"), style),
            ])
        };
        lines.push(detail(
            format!(
                "[{}] {}",
                a.report_type,
                a.report_subtype.as_deref().unwrap_or("No subtype")
            ),
            Style::default(),
        ));
        lines.push(detail(format!("Uploaded by User {}", a.user_id), FOOTER_STYLE));
        if a.is_deleted {
            let by = a.deleted_by.as_deref().unwrap_or("unknown");
            let at = a.deleted_at.as_deref().map(short_timestamp).unwrap_or_default();
            lines.push(detail(format!("Deleted by User {by} on {at}"), error));
        }
        if i < last {
            lines.push(detail(String::new(), Style::default()));
        }
    }

    let max_scroll = (lines.len() as u16).saturating_sub(body_area.height);
    frame.render_widget(Paragraph::new(lines).scroll((scroll.min(max_scroll), 0)), body_area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let [vertical] = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .areas(area);
    let [rect] = Layout::horizontal([Constraint::Length(width)])
        .flex(Flex::Center)
        .areas(vertical);
    rect
}

fn draw_details(frame: &mut Frame, area: Rect, record: &ReportCount, subtypes: Option<&str>) {
    let popup = centered(area, 56.min(area.width), 9.min(area.height));
    frame.render_widget(Clear, popup);
    let block = Block::default()
        .title(" Report Details ")
        .title_style(HEADER_STYLE)
        .borders(Borders::ALL)
        .border_style(FOOTER_STYLE);
    let inner = block.inner(popup);
    frame.render_widget(block, popup);

    let rows = vec![
        Row::new([Cell::from(" Report Type"), Cell::from(record.report_type.clone())]),
        Row::new([Cell::from(" Count"), Cell::from(number(record.count))]),
        Row::new([Cell::from(" Unique Patients"), Cell::from(number(record.unique_patients))]),
        Row::new([Cell::from(" Subtypes"), Cell::from(subtypes.unwrap_or("N/A").to_string())]),
    ];
    let [table_area, _, hint_area] = Layout::vertical([
        Constraint::Length(4),
        Constraint::Fill(1),
        Constraint::Length(1),
    ])
    .areas(inner);
    frame.render_widget(
        Table::new(rows, [Constraint::Length(17), Constraint::Fill(1)]),
        table_area,
    );
    frame.render_widget(
        Paragraph::new(" Enter/Esc=Close").style(FOOTER_STYLE),
        hint_area,
    );
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

fn event_loop(terminal: &mut DefaultTerminal, dashboard: &mut Dashboard) -> Result<()> {
    loop {
        terminal.draw(|frame| dashboard.draw(frame))?;

        if dashboard.fetcher.poll() {
            continue;
        }
        if !event::poll(TICK)? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
                return Ok(());
            }
            if dashboard.handle_key(key.code) == DashboardAction::Quit {
                return Ok(());
            }
        }
    }
}

pub fn run(range: DateRange) -> Result<()> {
    let settings = load_settings();
    let source: Arc<dyn AnalyticsSource> = Arc::new(HttpSource::new(&settings)?);

    let mut dashboard = Dashboard::new(source, range, settings.export_dir.clone());
    dashboard.start();

    install_panic_hook();
    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &mut dashboard);
    drop(terminal);
    ratatui::restore();

    tracing::info!(
        charts_acquired = dashboard.charts.acquired(),
        charts_released = dashboard.charts.released(),
        "dashboard closed"
    );
    result
}
