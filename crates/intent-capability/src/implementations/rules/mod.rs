//! Rule-based capability.
//!
//! Recognizes a fixed English grammar for swaps, bridges, yield deposits and
//! limit orders, builds candidate routes from static market data, and runs
//! deterministic validation and cost estimation. It needs no network access,
//! which makes it the default capability and a reference for others.

use async_trait::async_trait;
use intent_types::{
	parse_decimal, ConfigSchema, CostEstimate, Field, FieldType, Intent, IntentType, Parameters,
	ParsedIntent, Schema, SchemaError,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::{CapabilityError, CapabilityLoader, IntentCapability};

mod checks;
mod grammar;
mod market;

const DEFAULT_CURRENCY: &str = "ETH";
const DEFAULT_SLIPPAGE_LIMIT: f64 = 50.0;

/// Settings for the rules capability.
#[derive(Debug, Clone)]
pub struct RulesConfig {
	/// Currency reported with cost estimates.
	pub currency: String,
	/// Largest `max_slippage` percentage accepted by validation.
	pub slippage_limit: f64,
}

impl Default for RulesConfig {
	fn default() -> Self {
		Self {
			currency: DEFAULT_CURRENCY.to_string(),
			slippage_limit: DEFAULT_SLIPPAGE_LIMIT,
		}
	}
}

/// Configuration schema for the rules capability.
pub struct RulesConfigSchema;

impl ConfigSchema for RulesConfigSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), SchemaError> {
		let schema = Schema::new(
			// Required fields
			vec![],
			// Optional fields
			vec![
				Field::new("default_currency", FieldType::String).with_validator(|v| {
					match v.as_str() {
						Some(s) if !s.trim().is_empty() => Ok(()),
						_ => Err("must not be empty".to_string()),
					}
				}),
				Field::new(
					"slippage_limit",
					FieldType::Float {
						min: Some(0.0),
						max: Some(100.0),
					},
				),
			],
		);

		schema.validate(config)
	}
}

/// Loader for [`RulesCapability`]. Loading is immediate.
pub struct RulesLoader {
	config: RulesConfig,
}

impl RulesLoader {
	pub fn new(config: RulesConfig) -> Self {
		Self { config }
	}
}

#[async_trait]
impl CapabilityLoader for RulesLoader {
	fn name(&self) -> &str {
		"rules"
	}

	async fn load(&self) -> Result<Arc<dyn IntentCapability>, CapabilityError> {
		Ok(Arc::new(RulesCapability::new(self.config.clone())))
	}
}

/// Deterministic parse/validate/estimate over a static grammar.
pub struct RulesCapability {
	config: RulesConfig,
}

impl RulesCapability {
	pub fn new(config: RulesConfig) -> Self {
		Self { config }
	}

	fn build_intent(&self, input: &str) -> Result<Intent, CapabilityError> {
		let request = grammar::parse_request(input)?;

		let parsed = match request.actions.as_slice() {
			[action] => {
				let routes = market::routes_for(action)?;
				if routes.is_empty() {
					return Err(CapabilityError::Rejected(format!(
						"No route available for {} intent",
						action.intent_type()
					)));
				}
				ParsedIntent {
					intent_type: action.intent_type(),
					parameters: action.parameters(),
					routes,
				}
			}
			actions => {
				let route = market::composite_route(actions)?.ok_or_else(|| {
					CapabilityError::Rejected("No route available for a composite step".into())
				})?;
				let parts = actions
					.iter()
					.map(|a| json!({ "type": a.intent_type(), "parameters": a.parameters() }))
					.collect();
				let mut parameters = Parameters::new();
				parameters.insert("intents".to_string(), serde_json::Value::Array(parts));
				ParsedIntent {
					intent_type: IntentType::Composite,
					parameters,
					routes: vec![route],
				}
			}
		};

		Ok(Intent::new(input, parsed, request.constraints))
	}

	fn estimate(&self, intent: &Intent) -> Result<CostEstimate, CapabilityError> {
		let costs = intent
			.parsed
			.routes
			.iter()
			.map(|r| {
				parse_decimal(&r.estimated_cost).ok_or_else(|| {
					CapabilityError::Malformed(format!(
						"route {} has invalid estimated_cost {:?}",
						r.protocol, r.estimated_cost
					))
				})
			})
			.collect::<Result<Vec<_>, _>>()?;

		let (Some(min), Some(max)) = (costs.iter().min().copied(), costs.iter().max().copied())
		else {
			return Err(CapabilityError::Rejected(
				"Intent has no routes to estimate".into(),
			));
		};

		// Confidence drops as candidate costs diverge
		let spread = if max.is_zero() {
			Decimal::ZERO
		} else {
			(max - min) / max
		};
		let confidence = (Decimal::new(95, 2) - spread / Decimal::TWO)
			.round_dp(2)
			.to_f64()
			.unwrap_or(0.1)
			.clamp(0.1, 0.95);

		Ok(CostEstimate::from_range(
			min,
			max,
			confidence,
			&self.config.currency,
		))
	}
}

fn decode(intent_json: &str) -> Result<Intent, CapabilityError> {
	serde_json::from_str(intent_json).map_err(|e| CapabilityError::Malformed(e.to_string()))
}

fn encode<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, CapabilityError> {
	serde_json::to_value(value).map_err(|e| CapabilityError::Malformed(e.to_string()))
}

#[async_trait]
impl IntentCapability for RulesCapability {
	async fn parse(&self, input: &str) -> Result<serde_json::Value, CapabilityError> {
		let intent = self.build_intent(input)?;
		debug!(
			intent_id = %intent.id,
			intent_type = %intent.parsed.intent_type,
			routes = intent.parsed.routes.len(),
			"rules capability parsed intent"
		);
		encode(&intent)
	}

	async fn validate(&self, intent_json: &str) -> Result<serde_json::Value, CapabilityError> {
		let intent = decode(intent_json)?;
		encode(&checks::validate_intent(&intent, self.config.slippage_limit))
	}

	async fn estimate_cost(
		&self,
		intent_json: &str,
	) -> Result<serde_json::Value, CapabilityError> {
		let intent = decode(intent_json)?;
		encode(&self.estimate(&intent)?)
	}
}

/// Factory function to create a rules loader from configuration.
///
/// Configuration parameters:
/// - `default_currency`: currency reported with estimates (default: "ETH")
/// - `slippage_limit`: largest accepted slippage percentage (default: 50)
pub fn create_loader(config: &toml::Value) -> RulesLoader {
	let currency = config
		.get("default_currency")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_CURRENCY)
		.to_string();
	let slippage_limit = config
		.get("slippage_limit")
		.and_then(|v| v.as_float().or_else(|| v.as_integer().map(|i| i as f64)))
		.unwrap_or(DEFAULT_SLIPPAGE_LIMIT);

	RulesLoader::new(RulesConfig {
		currency,
		slippage_limit,
	})
}
