//! Shared types for the intent engine.
//!
//! This crate holds the data model exchanged between the engine, its
//! capabilities and callers, plus the schema utilities capability
//! implementations use to check their configuration tables.

pub mod estimate;
pub mod intent;
pub mod schema;

pub use estimate::*;
pub use intent::*;
pub use schema::*;
