//! Configuration for the intent engine.
//!
//! Configuration is read from TOML, JSON or YAML, with `${VAR}` placeholders
//! substituted from the environment and `INTENT_*` variables overriding
//! individual settings.

use thiserror::Error;

pub mod loader;
pub mod types;

pub use loader::{validate_config, ConfigFormat, ConfigLoader};
pub use types::*;

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(String),

	#[error("Unsupported config format: {0}")]
	UnsupportedFormat(String),

	#[error("Parse error: {0}")]
	Parse(String),

	#[error("Validation error: {0}")]
	Validation(String),

	#[error("Environment variable not found: {0}")]
	EnvVarNotFound(String),
}
