use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use tracing::{info, warn};

use crate::api::{ApiClient, ApiError};

use super::CredentialStore;

/// Shared handle to the process-wide session token.
///
/// The session gate is the only writer. Request clients hold clones and read
/// the current value each time they build a request.
#[derive(Clone, Default)]
pub struct SessionToken(Arc<RwLock<Option<String>>>);

impl SessionToken {
    pub fn current(&self) -> Option<String> {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_present(&self) -> bool {
        self.0.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    pub(crate) fn set(&self, token: String) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    pub(crate) fn clear(&self) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the token itself
        f.debug_tuple("SessionToken")
            .field(&if self.is_present() { "<set>" } else { "<none>" })
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Startup read of the credential store has not finished
    Resolving,
    Unauthenticated,
    Authenticated,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Credential storage failed: {0:#}")]
    Storage(anyhow::Error),
}

impl SessionError {
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            SessionError::Api(e) => e.user_message(fallback),
            SessionError::Storage(_) => self.to_string(),
        }
    }
}

/// Decides whether the user belongs in the signed-out or signed-in flow.
///
/// Token presence in the credential store is the only source of truth.
/// Every transition bumps `generation`; front-ends treat a bump as a
/// navigation reset and drop responses tagged with an older generation.
pub struct SessionGate {
    store: CredentialStore,
    token: SessionToken,
    state: GateState,
    generation: u64,
}

impl SessionGate {
    pub fn new(store: CredentialStore) -> Self {
        Self {
            store,
            token: SessionToken::default(),
            state: GateState::Resolving,
            generation: 0,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == GateState::Authenticated
    }

    /// Handle for request clients; always reflects the latest token
    pub fn token(&self) -> SessionToken {
        self.token.clone()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether work started at `generation` still belongs to the current screen
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Initial routing on cold start
    pub async fn resolve(&mut self) -> GateState {
        match self.store.load().await {
            Some(token) => {
                self.token.set(token);
                self.reset_to(GateState::Authenticated);
            }
            None => {
                self.token.clear();
                self.reset_to(GateState::Unauthenticated);
            }
        }
        self.state
    }

    pub async fn register(&mut self, api: &ApiClient, email: &str, password: &str) -> Result<(), SessionError> {
        let token = api.register(email, password).await?;
        self.establish(token).await
    }

    pub async fn login(&mut self, api: &ApiClient, username: &str, password: &str) -> Result<(), SessionError> {
        let token = api.login(username, password).await?;
        self.establish(token).await
    }

    /// Persist a freshly issued token, then enter the signed-in flow.
    ///
    /// Nothing is published in memory until the store accepted the token.
    pub async fn establish(&mut self, token: String) -> Result<(), SessionError> {
        self.store.save(&token).await.map_err(SessionError::Storage)?;
        self.token.set(token);
        if self.state != GateState::Authenticated {
            self.reset_to(GateState::Authenticated);
        }
        Ok(())
    }

    /// Sign out. The in-memory token is dropped and the gate moves to the
    /// signed-out flow even when the store could not be cleared; that
    /// failure is still returned so it can be reported.
    pub async fn logout(&mut self) -> Result<(), SessionError> {
        let cleared = self.store.clear().await;
        self.token.clear();
        self.reset_to(GateState::Unauthenticated);
        if let Err(ref e) = cleared {
            warn!(error = %format!("{:#}", e), "Failed to clear stored token on logout");
        }
        cleared.map_err(SessionError::Storage)
    }

    /// Re-check the store when a signed-in screen mounts.
    ///
    /// A token removed behind our back sends the user to the signed-out flow.
    pub async fn enter_authenticated(&mut self) -> GateState {
        match self.store.load().await {
            Some(token) => {
                self.token.set(token);
                if self.state != GateState::Authenticated {
                    self.reset_to(GateState::Authenticated);
                }
            }
            None => {
                self.token.clear();
                if self.state != GateState::Unauthenticated {
                    self.reset_to(GateState::Unauthenticated);
                }
            }
        }
        self.state
    }

    fn reset_to(&mut self, state: GateState) {
        let from = self.state;
        self.state = state;
        self.generation += 1;
        info!(?from, to = ?state, generation = self.generation, "Session gate transition");
    }
}
