//! Capability module for the intent engine.
//!
//! A capability bundles the three operations the engine delegates: parsing
//! free-form text into an intent, validating an intent, and estimating the
//! cost of executing it. Capabilities exchange serialized JSON with the
//! engine, and are obtained through a [`CapabilityLoader`] so that expensive
//! setup (loading a module, connecting to a backend) happens lazily.

use async_trait::async_trait;
use intent_types::ConfigSchema;
use std::sync::Arc;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod http;
	pub mod rules;
}

/// Errors that can occur at the capability boundary.
///
/// The type is `Clone` so that one failed load can be reported to every
/// caller waiting on it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CapabilityError {
	/// The capability could not be loaded or reached.
	#[error("Capability unavailable: {0}")]
	Unavailable(String),
	/// The capability understood the request and refused it.
	#[error("Rejected: {0}")]
	Rejected(String),
	/// The call failed in transit or while computing.
	#[error("Transport error: {0}")]
	Transport(String),
	/// A payload could not be encoded or decoded.
	#[error("Malformed payload: {0}")]
	Malformed(String),
	/// The call did not finish within the configured deadline.
	#[error("Timed out after {0} ms")]
	Timeout(u64),
	/// The capability configuration is invalid.
	#[error("Configuration error: {0}")]
	Config(String),
}

/// The operations the engine delegates to an external provider.
///
/// Inputs and outputs are serialized JSON so that implementations may live
/// behind any transport boundary.
#[async_trait]
pub trait IntentCapability: Send + Sync {
	/// Parses raw text into an intent-shaped JSON value.
	async fn parse(&self, input: &str) -> Result<serde_json::Value, CapabilityError>;

	/// Validates a serialized intent, returning a `{valid, errors}` value.
	async fn validate(&self, intent_json: &str) -> Result<serde_json::Value, CapabilityError>;

	/// Estimates the cost of a serialized intent, returning a
	/// `{min_cost, max_cost, confidence, currency}` value.
	async fn estimate_cost(&self, intent_json: &str)
		-> Result<serde_json::Value, CapabilityError>;
}

/// Produces a ready capability handle. May be slow.
#[async_trait]
pub trait CapabilityLoader: Send + Sync {
	/// Short name used in logs.
	fn name(&self) -> &str;

	/// Performs the load step and returns a working handle.
	async fn load(&self) -> Result<Arc<dyn IntentCapability>, CapabilityError>;
}

/// Capability implementations selectable from configuration.
pub const CAPABILITY_TYPES: &[&str] = &["rules", "http"];

/// Returns the configuration schema for the named capability type.
pub fn config_schema(kind: &str) -> Option<Box<dyn ConfigSchema>> {
	match kind {
		"rules" => Some(Box::new(implementations::rules::RulesConfigSchema)),
		"http" => Some(Box::new(implementations::http::HttpConfigSchema)),
		_ => None,
	}
}

/// Checks `config` against the named capability's schema and builds its
/// loader.
pub fn create_loader(
	kind: &str,
	config: &toml::Value,
) -> Result<Arc<dyn CapabilityLoader>, CapabilityError> {
	let check = |schema: &dyn ConfigSchema| {
		schema
			.validate(config)
			.map_err(|e| CapabilityError::Config(e.to_string()))
	};

	match kind {
		"rules" => {
			check(&implementations::rules::RulesConfigSchema)?;
			Ok(Arc::new(implementations::rules::create_loader(config)))
		}
		"http" => {
			check(&implementations::http::HttpConfigSchema)?;
			Ok(Arc::new(implementations::http::create_loader(config)))
		}
		other => Err(CapabilityError::Config(format!(
			"Unknown capability type '{}', expected one of {:?}",
			other, CAPABILITY_TYPES
		))),
	}
}
