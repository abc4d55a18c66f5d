//! Data models for savebox entities.
//!
//! - `Item`: an entry in the user's remote item collection
//! - `ItemPayload`: request body for creating or updating an item
//! - `TokenResponse`: body returned by the register and login endpoints

pub mod item;

pub use item::{Item, ItemPayload, TokenResponse};
