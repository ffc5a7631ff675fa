use ratatui::style::{Color, Modifier, Style};

use crate::views::ThemeColor;

pub const HEADER_STYLE: Style = Style::new()
    .fg(Color::Yellow)
    .add_modifier(Modifier::BOLD);

pub const FOOTER_STYLE: Style = Style::new().fg(Color::DarkGray);

pub const ERROR_STYLE: Style = Style::new().fg(Color::Red).add_modifier(Modifier::BOLD);

pub const SELECTED_STYLE: Style = Style::new()
    .bg(Color::Rgb(40, 40, 60))
    .add_modifier(Modifier::BOLD);

pub const HEADER_ROW_STYLE: Style = Style::new()
    .fg(Color::DarkGray)
    .add_modifier(Modifier::BOLD);

pub fn theme_color(c: ThemeColor) -> Color {
    match c {
        ThemeColor::Primary => Color::Rgb(25, 118, 210),
        ThemeColor::Secondary => Color::Rgb(156, 39, 176),
        ThemeColor::Success => Color::Rgb(80, 220, 100),
        ThemeColor::Error => Color::Red,
        ThemeColor::Warning => Color::Rgb(237, 108, 2),
    }
}

/// Wrap text to a given width. Returns (wrapped_string, line_count).
pub fn wrap_text(text: &str, width: usize) -> (String, u16) {
    if width == 0 {
        return (text.to_string(), 1);
    }
    let wrapped = textwrap::fill(text, width);
    let lines = wrapped.lines().count().max(1) as u16;
    (wrapped, lines)
}

/// Restore the terminal before the default panic output is printed.
pub fn install_panic_hook() {
    let hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        ratatui::restore();
        hook(info);
    }));
}
