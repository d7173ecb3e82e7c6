//! Engine construction and the combined parse/validate/estimate plan.

use anyhow::{Context, Result};
use intent_config::IntentConfig;
use intent_engine::{EngineError, IntentEngine};
use intent_types::{CostEstimate, Intent, ValidationResult};
use serde::Serialize;
use tracing::info;

/// Builds an engine from configuration. The capability is not loaded yet.
pub fn build_engine(config: &IntentConfig) -> Result<IntentEngine> {
	let loader =
		intent_capability::create_loader(&config.capability.kind, &config.capability.config)
			.with_context(|| {
				format!(
					"Failed to create '{}' capability loader",
					config.capability.kind
				)
			})?;

	info!(
		engine = %config.engine.name,
		capability = loader.name(),
		call_timeout_ms = ?config.engine.call_timeout_ms,
		"Intent engine configured"
	);

	Ok(IntentEngine::new(loader, config.engine.call_timeout()))
}

/// An intent together with its validation result and cost estimate.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
	pub intent: Intent,
	pub validation: ValidationResult,
	pub estimate: CostEstimate,
	/// "capability" or "fallback"
	pub validation_source: String,
	/// "capability" or "fallback"
	pub estimate_source: String,
}

/// Parses `input`, then validates and estimates the intent concurrently.
pub async fn plan(engine: &IntentEngine, input: &str) -> Result<Plan, EngineError> {
	let intent = engine.parse(input).await?;

	let ((validation, validation_source), (estimate, estimate_source)) = tokio::join!(
		engine.validate_detailed(&intent),
		engine.estimate_cost_detailed(&intent)
	);

	Ok(Plan {
		intent,
		validation,
		estimate,
		validation_source: validation_source.to_string(),
		estimate_source: estimate_source.to_string(),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use intent_types::IntentType;

	#[tokio::test]
	async fn test_plan_with_rules_capability() {
		let engine = build_engine(&IntentConfig::default()).unwrap();
		let plan = plan(&engine, "swap 1 ETH for USDC with max 1% slippage")
			.await
			.unwrap();

		assert_eq!(plan.intent.parsed.intent_type, IntentType::Swap);
		assert!(plan.validation.valid, "{:?}", plan.validation.errors);
		assert_eq!(plan.validation_source, "capability");
		assert_eq!(plan.estimate_source, "capability");
		assert!(plan.estimate.check().is_ok());
	}

	#[tokio::test]
	async fn test_plan_surfaces_parse_failure() {
		let engine = build_engine(&IntentConfig::default()).unwrap();
		assert!(matches!(
			plan(&engine, "make me rich").await,
			Err(EngineError::ParseFailure(_))
		));
	}

	#[test]
	fn test_unknown_capability_fails_to_build() {
		let mut config = IntentConfig::default();
		config.capability.kind = "wasm".into();
		assert!(build_engine(&config).is_err());
	}
}
