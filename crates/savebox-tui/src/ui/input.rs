//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};

use crate::app::{
    can_add_description_char, can_add_email_char, can_add_password_char, can_add_title_char, App,
    AppState, AuthAction, AuthFocus, ItemsFocus, Screen,
};

/// Handle keyboard input. Returns true if the app should quit.
pub async fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    // Handle quit confirmation
    if matches!(app.state, AppState::ConfirmingQuit) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                app.state = AppState::Quitting;
                return Ok(true);
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                app.state = AppState::Normal;
            }
            _ => {}
        }
        return Ok(false);
    }

    match app.screen() {
        Screen::Resolving => Ok(false),
        Screen::Auth => handle_auth_input(app, key),
        Screen::Items => handle_items_input(app, key).await,
    }
}

fn handle_auth_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Esc => {
            // Quit if on the sign-in screen
            app.state = AppState::Quitting;
            return Ok(true);
        }
        KeyCode::Down | KeyCode::Tab => {
            app.auth_focus = app.auth_focus.next();
        }
        KeyCode::Up | KeyCode::BackTab => {
            app.auth_focus = app.auth_focus.prev();
        }
        KeyCode::Left | KeyCode::Right
            if matches!(app.auth_focus, AuthFocus::Register | AuthFocus::Login) =>
        {
            app.auth_focus = match app.auth_focus {
                AuthFocus::Register => AuthFocus::Login,
                _ => AuthFocus::Register,
            };
        }
        KeyCode::Enter => match app.auth_focus {
            AuthFocus::Email => app.auth_focus = AuthFocus::Password,
            // Enter on the password field is the common case: log in
            AuthFocus::Password | AuthFocus::Login => app.submit_auth(AuthAction::Login),
            AuthFocus::Register => app.submit_auth(AuthAction::Register),
        },
        KeyCode::Backspace => match app.auth_focus {
            AuthFocus::Email => {
                app.auth_email.pop();
            }
            AuthFocus::Password => {
                app.auth_password.pop();
            }
            AuthFocus::Register | AuthFocus::Login => {}
        },
        KeyCode::Char(c) => match app.auth_focus {
            AuthFocus::Email => {
                if can_add_email_char(&app.auth_email, c) {
                    app.auth_email.push(c);
                }
            }
            AuthFocus::Password => {
                if can_add_password_char(&app.auth_password, c) {
                    app.auth_password.push(c);
                }
            }
            AuthFocus::Register | AuthFocus::Login => {}
        },
        _ => {}
    }
    Ok(false)
}

async fn handle_items_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Tab => {
            app.items_focus = app.items_focus.next();
            return Ok(false);
        }
        KeyCode::BackTab => {
            app.items_focus = app.items_focus.prev();
            return Ok(false);
        }
        KeyCode::Esc => {
            if app.directory.draft.is_editing() {
                app.cancel_edit();
            } else {
                app.state = AppState::ConfirmingQuit;
            }
            return Ok(false);
        }
        _ => {}
    }

    match app.items_focus {
        ItemsFocus::Title | ItemsFocus::Description => handle_form_input(app, key),
        ItemsFocus::List => handle_list_input(app, key).await,
    }
    Ok(false)
}

fn handle_form_input(app: &mut App, key: KeyEvent) {
    let on_title = app.items_focus == ItemsFocus::Title;

    match key.code {
        KeyCode::Enter => {
            if on_title {
                app.items_focus = ItemsFocus::Description;
            } else {
                app.submit_item();
            }
        }
        KeyCode::Down => app.items_focus = app.items_focus.next(),
        KeyCode::Up => app.items_focus = app.items_focus.prev(),
        KeyCode::Backspace => {
            let draft = &mut app.directory.draft;
            if on_title {
                draft.title.pop();
            } else {
                draft.description.pop();
            }
        }
        KeyCode::Char(c) => {
            let draft = &mut app.directory.draft;
            if on_title {
                if can_add_title_char(&draft.title, c) {
                    draft.title.push(c);
                }
            } else if can_add_description_char(&draft.description, c) {
                draft.description.push(c);
            }
        }
        _ => {}
    }
}

async fn handle_list_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
        KeyCode::Enter | KeyCode::Char('e') => app.edit_selected(),
        KeyCode::Char('d') | KeyCode::Delete => app.delete_selected(),
        KeyCode::Char('r') => app.dispatch(savebox_core::ItemOp::List),
        KeyCode::Char('s') => app.submit_item(),
        KeyCode::Char('L') => app.logout().await,
        KeyCode::Char('q') => app.state = AppState::ConfirmingQuit,
        _ => {}
    }
}
