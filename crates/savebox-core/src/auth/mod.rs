//! Authentication module for session tokens and routing.
//!
//! This module provides:
//! - `CredentialStore`: durable storage of the session token (file or OS keychain)
//! - `SessionToken`: the in-process token handle shared with request clients
//! - `SessionGate`: signed-in / signed-out routing driven by token presence

pub mod credentials;
pub mod session;

pub use credentials::{CredentialStore, FileTokenStorage, KeyringTokenStorage, TokenStorage};
pub use session::{GateState, SessionError, SessionGate, SessionToken};
