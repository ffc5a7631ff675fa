//! Chart instances and their lifecycle.
//!
//! A [`ChartHandle`] owns the prepared data for one drawn chart. Handles live
//! in a [`ChartSet`] owned by the dashboard; switching tabs or replacing the
//! snapshot calls [`ChartSet::release_all`], and dropping the set releases
//! whatever is left.

use std::cell::Cell;
use std::rc::Rc;

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Bar, BarChart, BarGroup, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame,
};
use thiserror::Error;

use crate::fmt::number;
use crate::tui::{theme_color, FOOTER_STYLE};
use crate::views::{palette_colors, Donut, SeriesChart, ThemeColor};

#[derive(Debug, Clone, PartialEq)]
pub enum ChartBody {
    Donut(Donut),
    Lines(SeriesChart),
    Bars(SeriesChart),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChartError {
    #[error("series '{series}' has {got} points for {expected} categories")]
    SeriesLength {
        series: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("donut has {labels} labels for {values} values")]
    DonutShape { labels: usize, values: usize },
}

impl ChartBody {
    fn check(&self) -> Result<(), ChartError> {
        match self {
            ChartBody::Donut(d) => {
                if d.labels.len() != d.values.len() {
                    return Err(ChartError::DonutShape {
                        labels: d.labels.len(),
                        values: d.values.len(),
                    });
                }
            }
            ChartBody::Lines(c) | ChartBody::Bars(c) => {
                for s in &c.series {
                    if s.data.len() != c.categories.len() {
                        return Err(ChartError::SeriesLength {
                            series: s.name,
                            expected: c.categories.len(),
                            got: s.data.len(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Number of colored things: slices for a donut, series otherwise.
    fn color_count(&self) -> usize {
        match self {
            ChartBody::Donut(d) => d.labels.len(),
            ChartBody::Lines(c) | ChartBody::Bars(c) => c.series.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ChartBody::Donut(d) => d.is_empty(),
            ChartBody::Lines(c) | ChartBody::Bars(c) => c.is_empty(),
        }
    }
}

pub struct ChartHandle {
    slot: &'static str,
    title: String,
    body: ChartBody,
    colors: Vec<ThemeColor>,
    released: Rc<Cell<u64>>,
}

impl ChartHandle {
    pub fn render(&self, frame: &mut Frame, area: Rect) {
        match &self.body {
            ChartBody::Donut(d) => self.render_donut(frame, area, d),
            ChartBody::Lines(c) => self.render_lines(frame, area, c),
            ChartBody::Bars(c) => self.render_bars(frame, area, c),
        }
    }

    fn title_block(&self) -> Block<'static> {
        Block::default()
            .title(self.title.clone())
            .title_style(Style::default().add_modifier(Modifier::BOLD))
            .borders(Borders::NONE)
    }

    /// Terminal stand-in for a donut: one proportional bar per slice.
    fn render_donut(&self, frame: &mut Frame, area: Rect, donut: &Donut) {
        let label_width = donut.labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        let bar_room = (area.width as usize).saturating_sub(label_width + 16).max(1);
        let total = donut.total();
        let percents = donut.percentages();

        let mut lines = vec![Line::from(Span::styled(
            format!(" {}", self.title),
            Style::default().add_modifier(Modifier::BOLD),
        ))];
        for (i, (label, value)) in donut.labels.iter().zip(&donut.values).enumerate() {
            let filled = if total == 0 {
                0
            } else {
                ((*value as f64 / total as f64) * bar_room as f64).round() as usize
            };
            let color = theme_color(self.colors[i]);
            lines.push(Line::from(vec![
                Span::raw(format!(" {:<label_width$}  ", label)),
                Span::styled("█".repeat(filled), Style::default().fg(color)),
                Span::raw(format!(" {}% ({})", percents[i], number(*value))),
            ]));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(" Total Reports: {}", number(total)),
            FOOTER_STYLE,
        )));
        frame.render_widget(Paragraph::new(lines), area);
    }

    fn render_lines(&self, frame: &mut Frame, area: Rect, chart: &SeriesChart) {
        let points: Vec<Vec<(f64, f64)>> = chart
            .series
            .iter()
            .map(|s| {
                s.data
                    .iter()
                    .enumerate()
                    .map(|(x, y)| (x as f64, *y as f64))
                    .collect()
            })
            .collect();

        let datasets: Vec<Dataset> = chart
            .series
            .iter()
            .zip(&points)
            .enumerate()
            .map(|(i, (s, data))| {
                Dataset::default()
                    .name(s.name)
                    .marker(symbols::Marker::Braille)
                    .graph_type(GraphType::Line)
                    .style(Style::default().fg(theme_color(self.colors[i])))
                    .data(data)
            })
            .collect();

        let max_x = chart.categories.len().saturating_sub(1).max(1) as f64;
        let max_y = chart.max_value().max(1) as f64;
        let x_labels: Vec<Span> = match (chart.categories.first(), chart.categories.last()) {
            (Some(first), Some(last)) if chart.categories.len() > 1 => {
                vec![Span::raw(first.clone()), Span::raw(last.clone())]
            }
            (Some(only), _) => vec![Span::raw(only.clone())],
            _ => vec![],
        };

        let widget = Chart::new(datasets)
            .block(self.title_block())
            .x_axis(Axis::default().bounds([0.0, max_x]).labels(x_labels).style(FOOTER_STYLE))
            .y_axis(
                Axis::default()
                    .title("Count")
                    .bounds([0.0, max_y])
                    .labels(vec![
                        Span::raw("0"),
                        Span::raw(number((max_y / 2.0).round() as u64)),
                        Span::raw(number(max_y as u64)),
                    ])
                    .style(FOOTER_STYLE),
            )
            .hidden_legend_constraints((Constraint::Ratio(1, 2), Constraint::Ratio(1, 2)));
        frame.render_widget(widget, area);
    }

    fn render_bars(&self, frame: &mut Frame, area: Rect, chart: &SeriesChart) {
        let [legend_area, bar_area] =
            Layout::vertical([Constraint::Length(1), Constraint::Fill(1)]).areas(area);

        let mut legend = vec![Span::raw(" ")];
        for (i, s) in chart.series.iter().enumerate() {
            legend.push(Span::styled("■ ", Style::default().fg(theme_color(self.colors[i]))));
            legend.push(Span::raw(format!("{}  ", s.name)));
        }
        frame.render_widget(Paragraph::new(Line::from(legend)), legend_area);

        let groups: Vec<BarGroup> = chart
            .categories
            .iter()
            .enumerate()
            .map(|(ci, label)| {
                let bars: Vec<Bar> = chart
                    .series
                    .iter()
                    .enumerate()
                    .map(|(si, s)| {
                        Bar::default()
                            .value(s.data[ci])
                            .style(Style::default().fg(theme_color(self.colors[si])))
                    })
                    .collect();
                BarGroup::default().label(Line::from(label.as_str())).bars(&bars)
            })
            .collect();

        let mut widget = BarChart::default()
            .block(self.title_block())
            .bar_width(2)
            .bar_gap(0)
            .group_gap(1);
        for group in groups {
            widget = widget.data(group);
        }
        frame.render_widget(widget, bar_area);
    }
}

impl Drop for ChartHandle {
    fn drop(&mut self) {
        self.released.set(self.released.get() + 1);
        tracing::trace!(slot = self.slot, "chart released");
    }
}

/// Owner of every live chart on screen. One slot holds at most one handle.
#[derive(Default)]
pub struct ChartSet {
    handles: Vec<ChartHandle>,
    acquired: u64,
    released: Rc<Cell<u64>>,
}

impl ChartSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the chart for `slot`, preparing a new handle if the data changed.
    /// A body that fails validation releases whatever the slot held.
    pub fn mount(
        &mut self,
        slot: &'static str,
        title: impl Into<String>,
        body: ChartBody,
    ) -> Result<&ChartHandle, ChartError> {
        let existing = self.handles.iter().position(|h| h.slot == slot);
        if let Err(e) = body.check() {
            if let Some(i) = existing {
                self.handles.remove(i);
            }
            tracing::warn!(slot, error = %e, "chart rejected");
            return Err(e);
        }

        let title = title.into();
        if let Some(i) = existing {
            let unchanged = self.handles[i].body == body && self.handles[i].title == title;
            if unchanged {
                return Ok(&self.handles[i]);
            }
            self.handles.remove(i);
        }

        self.acquired += 1;
        let colors = palette_colors(body.color_count());
        self.handles.push(ChartHandle {
            slot,
            title,
            body,
            colors,
            released: Rc::clone(&self.released),
        });
        let last = self.handles.len() - 1;
        Ok(&self.handles[last])
    }

    pub fn release_all(&mut self) {
        if !self.handles.is_empty() {
            tracing::debug!(count = self.handles.len(), "releasing charts");
        }
        self.handles.clear();
    }

    #[cfg(test)]
    pub fn live(&self) -> usize {
        self.handles.len()
    }

    pub fn acquired(&self) -> u64 {
        self.acquired
    }

    pub fn released(&self) -> u64 {
        self.released.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::views::Series;

    fn donut(values: Vec<u64>) -> ChartBody {
        ChartBody::Donut(Donut {
            labels: values.iter().map(|v| format!("T{v}")).collect(),
            values,
        })
    }

    fn bars(points: usize) -> ChartBody {
        ChartBody::Bars(SeriesChart {
            categories: vec!["Mar 01".to_string(), "Mar 02".to_string()],
            series: vec![Series { name: "Uploads", data: vec![1; points] }],
        })
    }

    #[test]
    fn test_mount_reuses_unchanged_chart() {
        let mut charts = ChartSet::new();
        charts.mount("types", "Types", donut(vec![1, 2])).unwrap();
        charts.mount("types", "Types", donut(vec![1, 2])).unwrap();
        assert_eq!(charts.live(), 1);
        assert_eq!(charts.acquired(), 1);
        assert_eq!(charts.released(), 0);
    }

    #[test]
    fn test_mount_replaces_changed_chart() {
        let mut charts = ChartSet::new();
        charts.mount("types", "Types", donut(vec![1, 2])).unwrap();
        charts.mount("types", "Types", donut(vec![3])).unwrap();
        assert_eq!(charts.live(), 1);
        assert_eq!(charts.acquired(), 2);
        assert_eq!(charts.released(), 1);
    }

    #[test]
    fn test_repeated_tab_switches_do_not_grow() {
        let mut charts = ChartSet::new();
        for round in 0..50u64 {
            charts.mount("monthly", "Monthly Trends", donut(vec![round, 1])).unwrap();
            charts.mount("daily", "Daily Activity", bars(2)).unwrap();
            assert_eq!(charts.live(), 2);
            charts.release_all();
            assert_eq!(charts.live(), 0);
        }
        assert_eq!(charts.acquired(), 100);
        assert_eq!(charts.released(), 100);
    }

    #[test]
    fn test_invalid_chart_is_isolated() {
        let mut charts = ChartSet::new();
        charts.mount("types", "Types", donut(vec![1])).unwrap();
        charts.mount("daily", "Daily", bars(2)).unwrap();
        let err = charts.mount("daily", "Daily", bars(3)).err().unwrap();
        assert_eq!(
            err,
            ChartError::SeriesLength { series: "Uploads", expected: 2, got: 3 }
        );
        // The sibling chart survives; the broken slot is emptied.
        assert_eq!(charts.live(), 1);
        assert!(charts.mount("types", "Types", donut(vec![1])).is_ok());
        assert_eq!(charts.acquired(), 2);
    }

    #[test]
    fn test_drop_releases_everything() {
        let released = {
            let mut charts = ChartSet::new();
            charts.mount("a", "A", donut(vec![1])).unwrap();
            charts.mount("b", "B", bars(2)).unwrap();
            Rc::clone(&charts.released)
        };
        assert_eq!(released.get(), 2);
    }

    #[test]
    fn test_colors_follow_series_count() {
        let mut charts = ChartSet::new();
        let handle = charts.mount("types", "Types", donut(vec![1, 2, 3, 4, 5, 6])).unwrap();
        assert_eq!(handle.colors.len(), 6);
        assert_eq!(handle.colors[5], handle.colors[0]);
    }
}
