//! Item directory operations: list, create, update and delete against the
//! remote collection, with the local copy and edit draft they drive.

pub mod directory;

pub use directory::{run, DirectoryError, Draft, ItemDirectory, ItemOp, OpOutcome};
