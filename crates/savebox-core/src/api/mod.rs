//! REST API client module for the savebox item server.
//!
//! This module provides the `ApiClient` for registering, logging in and
//! managing the user's items. Authenticated calls carry a bearer token
//! read from the session gate's shared token handle.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
pub use reqwest::StatusCode;
