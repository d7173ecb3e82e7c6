//! The intent engine.
//!
//! Sits between raw user text and an executable plan. The engine owns the
//! lifecycle of a capability (see [`lifecycle`]), forwards parse, validate
//! and estimate requests to it, and applies the failure policy: parse errors
//! reach the caller, while validation and estimation faults degrade to
//! conservative results.

use intent_capability::{CapabilityError, CapabilityLoader, IntentCapability};
use intent_types::{generate_intent_id, CostEstimate, Intent, IntentStatus, ValidationResult};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

pub mod lifecycle;

use lifecycle::Lifecycle;

/// Errors surfaced to engine callers.
///
/// Only parsing can fail from a caller's point of view; validation and
/// estimation faults are absorbed (see [`IntentEngine::validate_detailed`]).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
	/// The capability could not be loaded. The next call retries.
	#[error("Initialization error: {0}")]
	Initialization(CapabilityError),
	/// Input could not be turned into a valid intent.
	#[error("Parse failure: {0}")]
	ParseFailure(#[from] ParseFailure),
}

/// Why a parse produced no intent.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseFailure {
	/// The capability rejected the input or failed while parsing it.
	#[error(transparent)]
	Capability(#[from] CapabilityError),
	/// The capability answered with something that is not a usable intent.
	#[error("Invalid intent: {0}")]
	InvalidIntent(String),
}

/// Where a validation result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationSource {
	Capability,
	/// The capability faulted; the result is the synthetic failure.
	Fallback,
}

/// Where a cost estimate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimateSource {
	Capability,
	/// The capability faulted; the estimate is the fixed placeholder.
	Fallback,
}

impl std::fmt::Display for EstimateSource {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Capability => write!(f, "capability"),
			Self::Fallback => write!(f, "fallback"),
		}
	}
}

impl std::fmt::Display for ValidationSource {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Capability => write!(f, "capability"),
			Self::Fallback => write!(f, "fallback"),
		}
	}
}

/// Faults absorbed by validate and estimate, kept for logging.
#[derive(Debug, Error)]
enum Fault {
	#[error("capability unavailable: {0}")]
	Unavailable(CapabilityError),
	#[error("capability call failed: {0}")]
	Call(CapabilityError),
	#[error("could not serialize intent: {0}")]
	Encode(serde_json::Error),
	#[error("malformed capability response: {0}")]
	Decode(String),
}

/// Parses, validates and estimates intents through a lazily loaded
/// capability.
///
/// Cheap to share behind an `Arc`; all operations take `&self` and may run
/// concurrently.
pub struct IntentEngine {
	lifecycle: Lifecycle,
	call_timeout: Option<Duration>,
}

impl IntentEngine {
	/// Creates an engine. Nothing is loaded until the first operation or
	/// [`ensure_ready`](Self::ensure_ready).
	///
	/// `call_timeout`, when set, bounds the load step and every capability
	/// call. An expired deadline counts as a capability error.
	pub fn new(loader: Arc<dyn CapabilityLoader>, call_timeout: Option<Duration>) -> Self {
		Self {
			lifecycle: Lifecycle::new(loader, call_timeout),
			call_timeout,
		}
	}

	/// Loads the capability if it is not loaded yet. Idempotent.
	pub async fn ensure_ready(&self) -> Result<(), EngineError> {
		self.lifecycle
			.capability()
			.await
			.map(|_| ())
			.map_err(EngineError::Initialization)
	}

	/// True once the capability is loaded. Never blocks.
	pub fn is_ready(&self) -> bool {
		self.lifecycle.is_ready()
	}

	/// Name of the configured capability.
	pub fn capability_name(&self) -> &str {
		self.lifecycle.capability_name()
	}

	/// Parses free-form text into an intent.
	///
	/// The returned intent is always pending and has at least one route.
	#[instrument(skip(self), fields(capability = %self.capability_name()))]
	pub async fn parse(&self, input: &str) -> Result<Intent, EngineError> {
		let capability = self
			.lifecycle
			.capability()
			.await
			.map_err(EngineError::Initialization)?;

		let raw = self
			.call(capability.parse(input))
			.await
			.map_err(ParseFailure::Capability)?;
		let intent = normalize_intent(raw, input)?;

		debug!(
			intent_id = %intent.id,
			intent_type = %intent.parsed.intent_type,
			routes = intent.parsed.routes.len(),
			constraints = intent.constraints.len(),
			"Parsed intent"
		);
		Ok(intent)
	}

	/// Validates an intent. Never fails; a fault yields
	/// `{valid: false, errors: ["Validation failed"]}`.
	pub async fn validate(&self, intent: &Intent) -> ValidationResult {
		self.validate_detailed(intent).await.0
	}

	/// Like [`validate`](Self::validate), also reporting whether the result
	/// came from the capability or the fallback.
	#[instrument(skip(self, intent), fields(intent_id = %intent.id))]
	pub async fn validate_detailed(&self, intent: &Intent) -> (ValidationResult, ValidationSource) {
		let outcome = self
			.delegate(intent, |capability, json| async move {
				capability.validate(&json).await
			})
			.await
			.and_then(|value| {
				let result: ValidationResult =
					serde_json::from_value(value).map_err(|e| Fault::Decode(e.to_string()))?;
				if !result.is_consistent() {
					return Err(Fault::Decode(format!(
						"valid = {} disagrees with {} error(s)",
						result.valid,
						result.errors.len()
					)));
				}
				Ok(result)
			});

		match outcome {
			Ok(result) => {
				debug!(valid = result.valid, errors = result.errors.len(), "Validated intent");
				(result, ValidationSource::Capability)
			}
			Err(fault) => {
				warn!(fallback = true, error = %fault, "Validation fault suppressed");
				(ValidationResult::failed(), ValidationSource::Fallback)
			}
		}
	}

	/// Estimates execution cost. Never fails; a fault yields the fixed
	/// fallback estimate.
	pub async fn estimate_cost(&self, intent: &Intent) -> CostEstimate {
		self.estimate_cost_detailed(intent).await.0
	}

	/// Like [`estimate_cost`](Self::estimate_cost), also reporting whether the
	/// estimate came from the capability or the fallback.
	#[instrument(skip(self, intent), fields(intent_id = %intent.id))]
	pub async fn estimate_cost_detailed(&self, intent: &Intent) -> (CostEstimate, EstimateSource) {
		let outcome = self
			.delegate(intent, |capability, json| async move {
				capability.estimate_cost(&json).await
			})
			.await
			.and_then(|value| {
				let estimate: CostEstimate =
					serde_json::from_value(value).map_err(|e| Fault::Decode(e.to_string()))?;
				estimate.check().map_err(Fault::Decode)?;
				Ok(estimate)
			});

		match outcome {
			Ok(estimate) => {
				debug!(
					min_cost = %estimate.min_cost,
					max_cost = %estimate.max_cost,
					confidence = estimate.confidence,
					"Estimated intent cost"
				);
				(estimate, EstimateSource::Capability)
			}
			Err(fault) => {
				warn!(fallback = true, error = %fault, "Estimation fault suppressed");
				(CostEstimate::fallback(), EstimateSource::Fallback)
			}
		}
	}

	/// Loads the capability, serializes `intent` and runs `op` under the call
	/// deadline.
	async fn delegate<F, Fut>(&self, intent: &Intent, op: F) -> Result<Value, Fault>
	where
		F: FnOnce(Arc<dyn IntentCapability>, String) -> Fut,
		Fut: Future<Output = Result<Value, CapabilityError>>,
	{
		let capability = self.lifecycle.capability().await.map_err(Fault::Unavailable)?;
		let json = serde_json::to_string(intent).map_err(Fault::Encode)?;
		self.call(op(capability, json)).await.map_err(Fault::Call)
	}

	async fn call<Fut>(&self, fut: Fut) -> Result<Value, CapabilityError>
	where
		Fut: Future<Output = Result<Value, CapabilityError>>,
	{
		match self.call_timeout {
			Some(limit) => tokio::time::timeout(limit, fut)
				.await
				.unwrap_or_else(|_| Err(CapabilityError::Timeout(limit.as_millis() as u64))),
			None => fut.await,
		}
	}
}

/// Turns capability output into an [`Intent`].
///
/// Accepts either a full intent or a bare parsed-intent structure (with an
/// optional `constraints` list). Missing `id`, `user_input` and `status` are
/// filled in; any other status, or a route-less result, is rejected.
fn normalize_intent(raw: Value, input: &str) -> Result<Intent, ParseFailure> {
	let Value::Object(mut object) = raw else {
		return Err(ParseFailure::InvalidIntent(
			"capability output is not a JSON object".into(),
		));
	};

	if !object.contains_key("parsed") {
		let constraints = object
			.remove("constraints")
			.unwrap_or_else(|| Value::Array(Vec::new()));
		let mut wrapped = serde_json::Map::new();
		wrapped.insert("parsed".into(), Value::Object(object));
		wrapped.insert("constraints".into(), constraints);
		object = wrapped;
	}

	if !matches!(object.get("id"), Some(Value::String(id)) if !id.is_empty()) {
		object.insert("id".into(), Value::String(generate_intent_id()));
	}
	if !matches!(object.get("user_input"), Some(Value::String(_))) {
		object.insert("user_input".into(), Value::String(input.to_string()));
	}
	object
		.entry("constraints")
		.or_insert_with(|| Value::Array(Vec::new()));
	object
		.entry("status")
		.or_insert_with(|| Value::String(IntentStatus::Pending.to_string()));

	let intent: Intent = serde_json::from_value(Value::Object(object))
		.map_err(|e| ParseFailure::InvalidIntent(e.to_string()))?;

	if intent.status != IntentStatus::Pending {
		return Err(ParseFailure::InvalidIntent(format!(
			"new intents must be pending, got {}",
			intent.status
		)));
	}
	if intent.parsed.routes.is_empty() {
		return Err(ParseFailure::InvalidIntent("intent has no routes".into()));
	}

	Ok(intent)
}
