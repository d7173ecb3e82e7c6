//! Intent data model.
//!
//! These types mirror the JSON shape produced by parsing capabilities. Field
//! names are serialized verbatim, and the `type` tags on [`ParsedIntent`] and
//! [`Constraint`] use snake_case string values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, implementation-defined parameter map.
pub type Parameters = serde_json::Map<String, serde_json::Value>;

/// Lifecycle status of an intent.
///
/// The engine only ever produces [`IntentStatus::Pending`]; later states are
/// set by whatever orchestrates auctions and execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
	#[default]
	Pending,
	Auctioning,
	Executing,
	Completed,
	Failed,
}

impl fmt::Display for IntentStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			Self::Pending => "pending",
			Self::Auctioning => "auctioning",
			Self::Executing => "executing",
			Self::Completed => "completed",
			Self::Failed => "failed",
		};
		f.write_str(s)
	}
}

/// Kind of financial action an intent describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentType {
	Swap,
	Bridge,
	Yield,
	Limit,
	Composite,
}

impl fmt::Display for IntentType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			Self::Swap => "swap",
			Self::Bridge => "bridge",
			Self::Yield => "yield",
			Self::Limit => "limit",
			Self::Composite => "composite",
		};
		f.write_str(s)
	}
}

/// Kind of limit a constraint places on execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintType {
	MaxSlippage,
	Deadline,
	MinOutput,
	MaxCost,
}

/// Constraint value: either a JSON number or a string.
///
/// Numbers are kept as [`serde_json::Number`] so integers and floats survive
/// a round trip unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstraintValue {
	Number(serde_json::Number),
	Text(String),
}

impl ConstraintValue {
	/// Numeric view of the value. Strings are parsed when they hold a number.
	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Self::Number(n) => n.as_f64(),
			Self::Text(s) => s.trim().parse().ok(),
		}
	}
}

impl From<u64> for ConstraintValue {
	fn from(value: u64) -> Self {
		Self::Number(value.into())
	}
}

impl From<&str> for ConstraintValue {
	fn from(value: &str) -> Self {
		Self::Text(value.to_string())
	}
}

impl From<String> for ConstraintValue {
	fn from(value: String) -> Self {
		Self::Text(value)
	}
}

/// A requirement the execution must satisfy. All constraints on an intent
/// must hold, including several of the same type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
	#[serde(rename = "type")]
	pub constraint_type: ConstraintType,
	pub value: ConstraintValue,
}

impl Constraint {
	pub fn new(constraint_type: ConstraintType, value: impl Into<ConstraintValue>) -> Self {
		Self {
			constraint_type,
			value: value.into(),
		}
	}
}

/// A single action within a route, interpreted downstream by an executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
	pub action: String,
	#[serde(default)]
	pub parameters: Parameters,
}

/// One candidate execution plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
	pub protocol: String,
	/// Executed sequentially, in order.
	pub steps: Vec<Step>,
	/// Decimal string.
	pub estimated_output: String,
	/// Decimal string.
	pub estimated_cost: String,
	/// Seconds. May be fractional.
	pub execution_time: serde_json::Number,
}

/// Typed payload produced by a parsing capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedIntent {
	#[serde(rename = "type")]
	pub intent_type: IntentType,
	#[serde(default)]
	pub parameters: Parameters,
	/// Ranked by the parser; the first route is the preferred one.
	pub routes: Vec<Route>,
}

/// Structured representation of a requested financial action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
	pub id: String,
	pub user_input: String,
	pub parsed: ParsedIntent,
	pub constraints: Vec<Constraint>,
	pub status: IntentStatus,
}

impl Intent {
	/// Creates a pending intent with a freshly generated identifier.
	pub fn new(
		user_input: impl Into<String>,
		parsed: ParsedIntent,
		constraints: Vec<Constraint>,
	) -> Self {
		Self {
			id: generate_intent_id(),
			user_input: user_input.into(),
			parsed,
			constraints,
			status: IntentStatus::Pending,
		}
	}

	/// Returns the first route, the parser's preferred choice.
	pub fn preferred_route(&self) -> Option<&Route> {
		self.parsed.routes.first()
	}

	/// Iterates over constraints of the given type, in order.
	pub fn constraints_of(
		&self,
		constraint_type: ConstraintType,
	) -> impl Iterator<Item = &Constraint> + '_ {
		self.constraints
			.iter()
			.filter(move |c| c.constraint_type == constraint_type)
	}
}

/// Generates a request-unique intent identifier.
pub fn generate_intent_id() -> String {
	uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_intent_wire_shape() {
		let value = json!({
			"id": "intent-1",
			"user_input": "swap 1 ETH for USDC",
			"parsed": {
				"type": "swap",
				"parameters": { "amount": "1", "from_token": "ETH", "to_token": "USDC" },
				"routes": [{
					"protocol": "uniswap-v3",
					"steps": [{ "action": "swap", "parameters": { "pool": "ETH/USDC" } }],
					"estimated_output": "3000.5",
					"estimated_cost": "0.004",
					"execution_time": 15
				}]
			},
			"constraints": [
				{ "type": "max_slippage", "value": 1 },
				{ "type": "min_output", "value": "2900" }
			],
			"status": "pending"
		});

		let intent: Intent = serde_json::from_value(value.clone()).unwrap();
		assert_eq!(intent.parsed.intent_type, IntentType::Swap);
		assert_eq!(intent.status, IntentStatus::Pending);
		assert_eq!(intent.constraints.len(), 2);
		assert_eq!(serde_json::to_value(&intent).unwrap(), value);
	}

	#[test]
	fn test_constraint_value_numeric_view() {
		assert_eq!(ConstraintValue::from(3u64).as_f64(), Some(3.0));
		assert_eq!(ConstraintValue::from("0.5").as_f64(), Some(0.5));
		assert_eq!(ConstraintValue::from("soon").as_f64(), None);
	}

	#[test]
	fn test_float_constraint_survives() {
		let value = json!({ "type": "max_slippage", "value": 0.5 });
		let constraint: Constraint = serde_json::from_value(value.clone()).unwrap();
		assert_eq!(constraint.constraint_type, ConstraintType::MaxSlippage);
		assert_eq!(serde_json::to_value(&constraint).unwrap(), value);
	}

	#[test]
	fn test_unknown_type_rejected() {
		let value = json!({ "type": "teleport", "parameters": {}, "routes": [] });
		assert!(serde_json::from_value::<ParsedIntent>(value).is_err());
	}

	#[test]
	fn test_new_intent_is_pending_with_unique_id() {
		let parsed = ParsedIntent {
			intent_type: IntentType::Bridge,
			parameters: Parameters::new(),
			routes: vec![],
		};
		let a = Intent::new("bridge", parsed.clone(), vec![]);
		let b = Intent::new("bridge", parsed, vec![]);
		assert_eq!(a.status, IntentStatus::Pending);
		assert_ne!(a.id, b.id);
	}
}
