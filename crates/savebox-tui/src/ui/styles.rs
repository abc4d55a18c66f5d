use ratatui::style::{Color, Modifier, Style};

const BLUE: Color = Color::Rgb(64, 128, 192);
const GREEN: Color = Color::Rgb(96, 160, 96);
const AMBER: Color = Color::Rgb(192, 160, 64);
const RED: Color = Color::Rgb(192, 64, 64);
const GREY: Color = Color::Rgb(128, 128, 128);
const TEXT: Color = Color::White;
const SELECTION_BG: Color = Color::Rgb(48, 48, 64);
const STATUS_BG: Color = Color::Rgb(32, 32, 40);

pub fn title_style() -> Style {
    Style::default().fg(BLUE).add_modifier(Modifier::BOLD)
}

/// Focused input field, focused button or selected list row
pub fn selected_style() -> Style {
    Style::default().bg(SELECTION_BG).add_modifier(Modifier::BOLD)
}

pub fn field_style(focused: bool) -> Style {
    if focused {
        selected_style()
    } else {
        Style::default().fg(TEXT)
    }
}

pub fn muted_style() -> Style {
    Style::default().fg(GREY)
}

/// Key hints such as `[Enter]`, and the quit prompt
pub fn key_style() -> Style {
    Style::default().fg(AMBER).add_modifier(Modifier::BOLD)
}

pub fn synced_style() -> Style {
    Style::default().fg(GREEN)
}

pub fn error_style() -> Style {
    Style::default().fg(RED)
}

pub fn border_style(focused: bool) -> Style {
    Style::default().fg(if focused { BLUE } else { GREY })
}

pub fn status_bar_style() -> Style {
    Style::default().bg(STATUS_BG).fg(TEXT)
}
