use chrono::Local;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Frame,
};

use crate::app::{App, AppState, AuthFocus, ItemsFocus, Screen};

use super::styles;

const TITLE: &str = "  Savebox";

pub fn render(frame: &mut Frame, app: &App) {
    match app.screen() {
        Screen::Resolving => render_resolving(frame),
        Screen::Auth => render_auth(frame, app),
        Screen::Items => render_items(frame, app),
    }

    if matches!(app.state, AppState::ConfirmingQuit) {
        render_quit_overlay(frame);
    }
}

fn render_resolving(frame: &mut Frame) {
    let area = centered_rect_fixed(30, 3, frame.area());
    let paragraph = Paragraph::new(Line::from(Span::styled(
        "  Checking session...",
        styles::muted_style(),
    )))
    .block(Block::default().borders(Borders::ALL).border_style(styles::border_style(false)));
    frame.render_widget(paragraph, area);
}

// ============================================================================
// Sign-in screen
// ============================================================================

fn render_auth(frame: &mut Frame, app: &App) {
    let height = if app.auth_error.is_some() { 11 } else { 9 };
    let area = centered_rect_fixed(50, height, frame.area());

    frame.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(Span::styled(TITLE, styles::title_style())),
        Line::from(""),
    ];

    let email_focused = app.auth_focus == AuthFocus::Email;
    let cursor = if email_focused { "▌" } else { "" };
    lines.push(Line::from(vec![
        Span::raw("  "),
        Span::styled("Email:    [", styles::muted_style()),
        Span::styled(
            format!("{:<28}{}", tail(&app.auth_email, 28), cursor),
            styles::field_style(email_focused),
        ),
        Span::styled("]", styles::muted_style()),
    ]));

    let password_focused = app.auth_focus == AuthFocus::Password;
    let cursor = if password_focused { "▌" } else { "" };
    let masked = "*".repeat(app.auth_password.chars().count().min(28));
    lines.push(Line::from(vec![
        Span::raw("  "),
        Span::styled("Password: [", styles::muted_style()),
        Span::styled(format!("{:<28}{}", masked, cursor), styles::field_style(password_focused)),
        Span::styled("]", styles::muted_style()),
    ]));

    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::raw("        "),
        button("Register", app.auth_focus == AuthFocus::Register),
        Span::raw("    "),
        button("Login", app.auth_focus == AuthFocus::Login),
    ]));

    if app.auth_pending {
        lines.push(Line::from(Span::styled("  Contacting server...", styles::muted_style())));
    }

    if let Some(ref error) = app.auth_error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(format!("  {}", error), styles::error_style())));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn button(label: &str, focused: bool) -> Span<'static> {
    if focused {
        Span::styled(format!("[ ▶ {} ◀ ]", label), styles::selected_style())
    } else {
        Span::styled(format!("[   {}   ]", label), styles::field_style(false))
    }
}

// ============================================================================
// Items screen
// ============================================================================

fn render_items(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Title bar
            Constraint::Length(5), // Item form
            Constraint::Min(5),    // Item list
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, chunks[0]);
    render_item_form(frame, app, chunks[1]);
    render_item_list(frame, app, chunks[2]);
    render_status_bar(frame, app, chunks[3]);
}

fn render_title_bar(frame: &mut Frame, area: Rect) {
    let hint = "[L] Logout";
    let title_line = Line::from(vec![
        Span::styled(TITLE, styles::title_style()),
        Span::raw(" ".repeat(
            (area.width as usize).saturating_sub(TITLE.len() + hint.len() + 2),
        )),
        Span::styled(hint, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());
    frame.render_widget(Paragraph::new(title_line).block(block), area);
}

fn render_item_form(frame: &mut Frame, app: &App, area: Rect) {
    let draft = &app.directory.draft;
    let title_focused = app.items_focus == ItemsFocus::Title;
    let description_focused = app.items_focus == ItemsFocus::Description;
    let form_focused = title_focused || description_focused;

    let field = |label: &'static str, value: &str, focused: bool| {
        let cursor = if focused { "▌" } else { "" };
        Line::from(vec![
            Span::styled(label, styles::muted_style()),
            Span::styled(format!("{}{}", value, cursor), styles::field_style(focused)),
        ])
    };

    let action_hint = if draft.is_editing() {
        Line::from(vec![
            Span::styled("[Enter]", styles::key_style()),
            Span::styled(" save  ", styles::muted_style()),
            Span::styled("[Esc]", styles::key_style()),
            Span::styled(" cancel", styles::muted_style()),
        ])
    } else {
        Line::from(vec![
            Span::styled("[Enter]", styles::key_style()),
            Span::styled(" on description to create", styles::muted_style()),
        ])
    };

    let lines = vec![
        field(" Title:       ", &draft.title, title_focused),
        field(" Description: ", &draft.description, description_focused),
        action_hint,
    ];

    let heading = match draft.editing_id() {
        Some(id) => format!(" Editing item #{} ", id),
        None => " New item ".to_string(),
    };

    let block = Block::default()
        .title(heading)
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(form_focused));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_item_list(frame: &mut Frame, app: &App, area: Rect) {
    let focused = app.items_focus == ItemsFocus::List;
    let editing = app.directory.draft.editing_id();

    let items: Vec<ListItem> = app
        .directory
        .items()
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let marker = if editing == Some(item.id) { "✎ " } else { "  " };
            let mut spans = vec![
                Span::raw(marker),
                Span::styled(item.title.clone(), styles::title_style()),
            ];
            if item.has_description() {
                spans.push(Span::styled(
                    format!("  {}", item.description_display()),
                    styles::muted_style(),
                ));
            }

            ListItem::new(Line::from(spans)).style(styles::field_style(focused && i == app.selection))
        })
        .collect();

    let block = Block::default()
        .title(format!(" My items ({}) ", app.directory.items().len()))
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(focused));

    let list = List::new(items).block(block);

    let mut state = ListState::default();
    if !app.directory.items().is_empty() {
        state.select(Some(app.selection));
    }

    frame.render_stateful_widget(list, area, &mut state);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let shortcuts = "[Tab] focus | [e]dit [d]elete [r]efresh | [q]uit";

    let (left_text, left_style) = match app.status_message {
        Some(ref msg) if app.directory.is_busy() => (format!(" {} ", msg), styles::muted_style()),
        Some(ref msg) => (format!(" {} ", msg), styles::error_style()),
        None => match app.directory.synced_at() {
            Some(at) => (
                format!(" Synced {} ", at.with_timezone(&Local).format("%H:%M:%S")),
                styles::synced_style(),
            ),
            None => (" Not synced ".to_string(), styles::muted_style()),
        },
    };

    let right_text = format!(" {} ", shortcuts);
    let padding_len = (area.width as usize)
        .saturating_sub(left_text.chars().count())
        .saturating_sub(right_text.len());

    let status_line = Line::from(vec![
        Span::styled(left_text, left_style),
        Span::raw(" ".repeat(padding_len)),
        Span::styled(right_text, styles::muted_style()),
    ]);
    frame.render_widget(Paragraph::new(status_line).style(styles::status_bar_style()), area);
}

// ============================================================================
// Overlays and helpers
// ============================================================================

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

/// Last `width` characters of `s`, so the cursor end stays visible
fn tail(s: &str, width: usize) -> String {
    let count = s.chars().count();
    s.chars().skip(count.saturating_sub(width)).collect()
}

fn render_quit_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(46, 6, frame.area());

    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "   Are you sure you want to quit?",
            styles::key_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("   Press ", styles::muted_style()),
            Span::styled("[Y]", styles::key_style()),
            Span::styled(" to quit, ", styles::muted_style()),
            Span::styled("[N]", styles::key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}
