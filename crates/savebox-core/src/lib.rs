//! Core library for savebox.
//!
//! Everything the front-end needs to talk to an item server on behalf of a
//! signed-in user:
//!
//! - [`auth`]: credential storage, the shared session token and the session gate
//! - [`api`]: HTTP client that attaches the current bearer token
//! - [`items`]: item directory operations and the local edit draft
//! - [`config`]: application configuration
//! - [`models`]: wire types

pub mod api;
pub mod auth;
pub mod config;
pub mod items;
pub mod models;

pub use api::{ApiClient, ApiError};
pub use auth::{CredentialStore, GateState, SessionError, SessionGate, SessionToken};
pub use config::Config;
pub use items::{DirectoryError, ItemDirectory, ItemOp, OpOutcome};
pub use models::{Item, ItemPayload};
