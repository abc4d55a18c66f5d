//! Application state management for savebox.
//!
//! `App` owns the session gate, the API client and the item directory, plus
//! the form state of whichever screen the gate currently routes to. Network
//! work runs on spawned tasks that report back over an mpsc channel; each
//! result is tagged with the gate generation it was started under so that
//! answers for a screen that has since been reset are dropped.

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use savebox_core::items::{self, ItemOp, OpOutcome};
use savebox_core::{ApiClient, ApiError, Config, CredentialStore, GateState, Item, ItemDirectory, SessionGate};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
const CHANNEL_BUFFER_SIZE: usize = 32;

/// Maximum length for email input (RFC 5321 path limit).
const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
const MAX_PASSWORD_LENGTH: usize = 128;

const MAX_TITLE_LENGTH: usize = 200;

const MAX_DESCRIPTION_LENGTH: usize = 1000;

/// Prefills the email field when set
const EMAIL_ENV: &str = "SAVEBOX_EMAIL";

// ============================================================================
// UI State Types
// ============================================================================

/// Which screen the session gate routes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Resolving,
    Auth,
    Items,
}

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    ConfirmingQuit,
    Quitting,
}

/// Auth form focus state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFocus {
    Email,
    Password,
    Register,
    Login,
}

impl AuthFocus {
    pub fn next(&self) -> Self {
        match self {
            AuthFocus::Email => AuthFocus::Password,
            AuthFocus::Password => AuthFocus::Register,
            AuthFocus::Register => AuthFocus::Login,
            AuthFocus::Login => AuthFocus::Email,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            AuthFocus::Email => AuthFocus::Login,
            AuthFocus::Password => AuthFocus::Email,
            AuthFocus::Register => AuthFocus::Password,
            AuthFocus::Login => AuthFocus::Register,
        }
    }
}

/// Items screen focus state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemsFocus {
    Title,
    Description,
    List,
}

impl ItemsFocus {
    pub fn next(&self) -> Self {
        match self {
            ItemsFocus::Title => ItemsFocus::Description,
            ItemsFocus::Description => ItemsFocus::List,
            ItemsFocus::List => ItemsFocus::Title,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            ItemsFocus::Title => ItemsFocus::List,
            ItemsFocus::Description => ItemsFocus::Title,
            ItemsFocus::List => ItemsFocus::Description,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAction {
    Register,
    Login,
}

impl AuthAction {
    pub fn failure_message(&self) -> &'static str {
        match self {
            AuthAction::Register => "Failed to register",
            AuthAction::Login => "Failed to authenticate",
        }
    }
}

// ============================================================================
// Background Task Results
// ============================================================================

/// Results sent from spawned network tasks back to the UI loop.
enum TaskResult {
    /// Register or login finished (generation, action, token or error)
    Auth {
        generation: u64,
        action: AuthAction,
        result: Result<String, ApiError>,
    },
    /// An item operation and its re-fetch finished
    Items {
        generation: u64,
        op: ItemOp,
        outcome: OpOutcome,
    },
}

// ============================================================================
// Main Application Struct
// ============================================================================

pub struct App {
    // Core services
    pub config: Config,
    pub gate: SessionGate,
    pub api: ApiClient,
    pub directory: ItemDirectory,

    pub state: AppState,

    // Auth form state
    pub auth_email: String,
    pub auth_password: String,
    pub auth_focus: AuthFocus,
    pub auth_error: Option<String>,
    pub auth_pending: bool,

    // Items screen state
    pub items_focus: ItemsFocus,
    pub selection: usize,

    pub status_message: Option<String>,

    // Background task channel
    task_rx: mpsc::Receiver<TaskResult>,
    task_tx: mpsc::Sender<TaskResult>,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let store = CredentialStore::from_config(&config)?;
        let gate = SessionGate::new(store);
        let api = ApiClient::new(config.api_base(), gate.token())?;
        debug!(api_base = %api.base_url(), backend = ?config.credential_backend, "App configured");

        let (task_tx, task_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        let auth_email = std::env::var(EMAIL_ENV)
            .ok()
            .or_else(|| config.last_email.clone())
            .unwrap_or_default();

        Ok(Self {
            config,
            gate,
            api,
            directory: ItemDirectory::new(),

            state: AppState::Normal,

            auth_email,
            auth_password: String::new(),
            auth_focus: AuthFocus::Email,
            auth_error: None,
            auth_pending: false,

            items_focus: ItemsFocus::Title,
            selection: 0,

            status_message: None,

            task_rx,
            task_tx,
        })
    }

    pub fn screen(&self) -> Screen {
        match self.gate.state() {
            GateState::Resolving => Screen::Resolving,
            GateState::Unauthenticated => Screen::Auth,
            GateState::Authenticated => Screen::Items,
        }
    }

    /// Resolve the stored session and open the matching screen
    pub async fn start(&mut self) {
        match self.gate.resolve().await {
            GateState::Authenticated => self.enter_items().await,
            _ => self.reset_auth_screen(),
        }
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Mount the items screen, re-checking the stored token first
    async fn enter_items(&mut self) {
        match self.gate.enter_authenticated().await {
            GateState::Authenticated => {
                self.directory = ItemDirectory::new();
                self.items_focus = ItemsFocus::Title;
                self.selection = 0;
                self.status_message = None;
                self.dispatch(ItemOp::List);
            }
            _ => {
                info!("No stored token on items screen entry, returning to sign-in");
                self.reset_auth_screen();
            }
        }
    }

    fn reset_auth_screen(&mut self) {
        self.directory = ItemDirectory::new();
        self.auth_password.clear();
        self.auth_error = None;
        self.auth_pending = false;
        self.auth_focus = if self.auth_email.is_empty() {
            AuthFocus::Email
        } else {
            AuthFocus::Password
        };
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Send the auth form as a register or login request
    pub fn submit_auth(&mut self, action: AuthAction) {
        if self.auth_pending {
            return;
        }
        if self.auth_email.trim().is_empty() || self.auth_password.is_empty() {
            self.auth_error = Some("Email and password required".to_string());
            return;
        }

        self.auth_error = None;
        self.auth_pending = true;

        let api = self.api.clone();
        let tx = self.task_tx.clone();
        let generation = self.gate.generation();
        let email = self.auth_email.trim().to_string();
        let password = self.auth_password.clone();

        tokio::spawn(async move {
            let result = match action {
                AuthAction::Register => api.register(&email, &password).await,
                AuthAction::Login => api.login(&email, &password).await,
            };
            Self::send_result(&tx, TaskResult::Auth { generation, action, result }).await;
        });
    }

    async fn finish_auth(&mut self, action: AuthAction, result: Result<String, ApiError>) {
        self.auth_pending = false;
        let token = match result {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, ?action, "Authentication failed");
                self.auth_error = Some(e.user_message(action.failure_message()));
                return;
            }
        };

        if let Err(e) = self.gate.establish(token).await {
            warn!(error = %e, "Failed to persist session token");
            self.auth_error = Some(e.user_message(action.failure_message()));
            return;
        }

        info!(?action, "Signed in");
        self.config.last_email = Some(self.auth_email.trim().to_string());
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }
        self.auth_password.clear();
        self.enter_items().await;
    }

    pub async fn logout(&mut self) {
        if let Err(e) = self.gate.logout().await {
            warn!(error = %e, "Logout could not clear stored token");
        }
        self.reset_auth_screen();
        self.status_message = None;
        info!("Signed out");
    }

    // =========================================================================
    // Items
    // =========================================================================

    /// Start an item operation on a background task
    pub fn dispatch(&mut self, op: ItemOp) {
        if let Err(e) = self.directory.begin() {
            self.status_message = Some(e.to_string());
            return;
        }
        self.status_message = Some(match op {
            ItemOp::List => "Loading items...".to_string(),
            _ => "Saving...".to_string(),
        });

        let api = self.api.clone();
        let tx = self.task_tx.clone();
        let generation = self.gate.generation();

        tokio::spawn(async move {
            let outcome = items::run(&api, &op).await;
            Self::send_result(&tx, TaskResult::Items { generation, op, outcome }).await;
        });
    }

    /// Create from the form, or save over the item being edited
    pub fn submit_item(&mut self) {
        let op = if self.directory.draft.is_editing() {
            self.directory.save_edit_op()
        } else {
            self.directory.create_op()
        };
        match op {
            Ok(op) => self.dispatch(op),
            Err(e) => self.status_message = Some(e.to_string()),
        }
    }

    pub fn selected_item(&self) -> Option<&Item> {
        self.directory.items().get(self.selection)
    }

    pub fn edit_selected(&mut self) {
        if let Some(item) = self.selected_item().cloned() {
            self.directory.start_edit(&item);
            self.items_focus = ItemsFocus::Title;
        }
    }

    pub fn delete_selected(&mut self) {
        if let Some(id) = self.selected_item().map(|i| i.id) {
            self.dispatch(ItemOp::Delete(id));
        }
    }

    pub fn cancel_edit(&mut self) {
        self.directory.cancel_edit();
    }

    pub fn select_next(&mut self) {
        let len = self.directory.items().len();
        if len > 0 && self.selection + 1 < len {
            self.selection += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selection = self.selection.saturating_sub(1);
    }

    // =========================================================================
    // Background Tasks
    // =========================================================================

    async fn send_result(tx: &mpsc::Sender<TaskResult>, result: TaskResult) {
        if tx.send(result).await.is_err() {
            debug!("UI loop gone, dropping task result");
        }
    }

    /// Drain finished background tasks and fold their results into state
    pub async fn check_background_tasks(&mut self) {
        while let Ok(result) = self.task_rx.try_recv() {
            self.process_task_result(result).await;
        }
    }

    async fn process_task_result(&mut self, result: TaskResult) {
        match result {
            TaskResult::Auth { generation, action, result } => {
                if !self.gate.is_current(generation) {
                    debug!(generation, ?action, "Ignoring auth result for a reset screen");
                    return;
                }
                self.finish_auth(action, result).await;
            }
            TaskResult::Items { generation, op, outcome } => {
                if !self.gate.is_current(generation) {
                    debug!(generation, ?op, "Ignoring item result for a reset screen");
                    return;
                }
                self.status_message = match self.directory.apply(&op, outcome) {
                    Ok(()) => None,
                    Err(e) => Some(e.to_string()),
                };
                let len = self.directory.items().len();
                if self.selection >= len {
                    self.selection = len.saturating_sub(1);
                }
            }
        }
    }
}

// ============================================================================
// Input validation helpers (exported for use in input.rs)
// ============================================================================

/// Check if a character is valid for input (no control characters)
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

fn can_add_char(current: &str, c: char, max: usize) -> bool {
    current.chars().count() < max && is_valid_input_char(c)
}

pub fn can_add_email_char(current: &str, c: char) -> bool {
    can_add_char(current, c, MAX_EMAIL_LENGTH)
}

pub fn can_add_password_char(current: &str, c: char) -> bool {
    can_add_char(current, c, MAX_PASSWORD_LENGTH)
}

pub fn can_add_title_char(current: &str, c: char) -> bool {
    can_add_char(current, c, MAX_TITLE_LENGTH)
}

pub fn can_add_description_char(current: &str, c: char) -> bool {
    can_add_char(current, c, MAX_DESCRIPTION_LENGTH)
}

// ============================================================================
// Tests
// ============================================================================
