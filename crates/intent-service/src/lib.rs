//! Service layer for the intent engine.
//!
//! Provides the `intentctl` command-line interface and the HTTP API, both
//! driving an [`intent_engine::IntentEngine`] built from configuration.
//!
//! # Components
//!
//! - `api`: HTTP routes for health, parse, validate, estimate and plan
//! - `cli`: command-line interface definitions
//! - `service`: engine construction and the combined plan operation

pub mod api;
pub mod cli;
pub mod service;
