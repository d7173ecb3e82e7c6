//! Structural and semantic checks over a parsed intent.

use intent_types::{
	parse_decimal, ConstraintType, ConstraintValue, Intent, IntentType, Parameters,
	ValidationResult,
};
use rust_decimal::Decimal;

/// Collects findings in the order they are discovered.
struct Findings(Vec<String>);

impl Findings {
	fn push(&mut self, message: impl Into<String>) {
		self.0.push(message.into());
	}
}

fn text<'a>(parameters: &'a Parameters, key: &str) -> Option<&'a str> {
	parameters.get(key).and_then(|v| v.as_str())
}

fn check_amount(parameters: &Parameters, findings: &mut Findings, prefix: &str) {
	match text(parameters, "amount").map(parse_decimal) {
		None => findings.push(format!("{}missing amount", prefix)),
		Some(None) => findings.push(format!("{}amount is not a decimal", prefix)),
		Some(Some(amount)) if amount <= Decimal::ZERO => {
			findings.push(format!("{}amount must be greater than zero", prefix))
		}
		Some(Some(_)) => {}
	}
}

fn check_distinct(parameters: &Parameters, a: &str, b: &str, findings: &mut Findings, prefix: &str) {
	match (text(parameters, a), text(parameters, b)) {
		(Some(x), Some(y)) if x.eq_ignore_ascii_case(y) => {
			findings.push(format!("{}{} and {} must differ", prefix, a, b))
		}
		(Some(_), Some(_)) => {}
		_ => findings.push(format!("{}missing {} or {}", prefix, a, b)),
	}
}

fn check_action(intent_type: IntentType, parameters: &Parameters, findings: &mut Findings, prefix: &str) {
	match intent_type {
		IntentType::Swap => {
			check_amount(parameters, findings, prefix);
			check_distinct(parameters, "from_token", "to_token", findings, prefix);
		}
		IntentType::Bridge => {
			check_amount(parameters, findings, prefix);
			check_distinct(parameters, "from_chain", "to_chain", findings, prefix);
		}
		IntentType::Yield => check_amount(parameters, findings, prefix),
		IntentType::Limit => {
			check_amount(parameters, findings, prefix);
			match text(parameters, "limit_price").and_then(parse_decimal) {
				Some(price) if price > Decimal::ZERO => {}
				_ => findings.push(format!("{}limit_price must be a positive decimal", prefix)),
			}
		}
		IntentType::Composite => {
			let Some(parts) = parameters.get("intents").and_then(|v| v.as_array()) else {
				findings.push("composite intent lists no intents");
				return;
			};
			if parts.len() < 2 {
				findings.push("composite intent needs at least two intents");
			}
			for (i, part) in parts.iter().enumerate() {
				let prefix = format!("intent {}: ", i + 1);
				let parsed = part
					.get("type")
					.cloned()
					.and_then(|t| serde_json::from_value::<IntentType>(t).ok());
				let params = part.get("parameters").and_then(|p| p.as_object());
				match (parsed, params) {
					(Some(IntentType::Composite), _) => {
						findings.push(format!("{}composite intents cannot nest", prefix))
					}
					(Some(t), Some(p)) => check_action(t, p, findings, &prefix),
					_ => findings.push(format!("{}missing type or parameters", prefix)),
				}
			}
		}
	}
}

fn check_constraints(intent: &Intent, slippage_limit: f64, findings: &mut Findings) {
	for constraint in &intent.constraints {
		match constraint.constraint_type {
			ConstraintType::MaxSlippage => match constraint.value.as_f64() {
				Some(pct) if pct > 0.0 && pct <= slippage_limit => {}
				_ => findings.push(format!(
					"max_slippage must be a percentage in (0, {}]",
					slippage_limit
				)),
			},
			ConstraintType::Deadline => match constraint.value.as_f64() {
				Some(secs) if secs > 0.0 => {}
				_ => findings.push("deadline must be a positive number of seconds"),
			},
			ConstraintType::MinOutput | ConstraintType::MaxCost => {
				if !matches!(decimal_value(&constraint.value), Some(d) if d >= Decimal::ZERO) {
					findings.push(format!(
						"{} must be a non-negative decimal",
						match constraint.constraint_type {
							ConstraintType::MinOutput => "min_output",
							_ => "max_cost",
						}
					));
				}
			}
		}
	}
}

fn decimal_value(value: &ConstraintValue) -> Option<Decimal> {
	match value {
		ConstraintValue::Text(s) => parse_decimal(s),
		ConstraintValue::Number(n) => parse_decimal(&n.to_string()),
	}
}

fn bound(intent: &Intent, constraint_type: ConstraintType) -> Vec<Decimal> {
	intent
		.constraints_of(constraint_type)
		.filter_map(|c| decimal_value(&c.value))
		.collect()
}

fn check_routes(intent: &Intent, findings: &mut Findings) {
	let routes = &intent.parsed.routes;
	if routes.is_empty() {
		findings.push("intent has no routes");
		return;
	}

	for (i, route) in routes.iter().enumerate() {
		if route.steps.is_empty() {
			findings.push(format!("route {} ({}) has no steps", i + 1, route.protocol));
		}
		if parse_decimal(&route.estimated_cost).is_none() {
			findings.push(format!("route {} ({}) has an invalid estimated_cost", i + 1, route.protocol));
		}
		if parse_decimal(&route.estimated_output).is_none() {
			findings.push(format!("route {} ({}) has an invalid estimated_output", i + 1, route.protocol));
		}
	}

	// Every bound must hold on the same route
	let max_costs = bound(intent, ConstraintType::MaxCost);
	let min_outputs = bound(intent, ConstraintType::MinOutput);
	if max_costs.is_empty() && min_outputs.is_empty() {
		return;
	}
	let satisfiable = routes.iter().any(|route| {
		let cost = parse_decimal(&route.estimated_cost);
		let output = parse_decimal(&route.estimated_output);
		max_costs.iter().all(|max| cost.is_some_and(|c| c <= *max))
			&& min_outputs.iter().all(|min| output.is_some_and(|o| o >= *min))
	});
	if !satisfiable {
		findings.push("no route satisfies the max_cost and min_output constraints");
	}
}

/// Runs every check against `intent`.
pub(crate) fn validate_intent(intent: &Intent, slippage_limit: f64) -> ValidationResult {
	let mut findings = Findings(Vec::new());
	check_action(intent.parsed.intent_type, &intent.parsed.parameters, &mut findings, "");
	check_constraints(intent, slippage_limit, &mut findings);
	check_routes(intent, &mut findings);
	ValidationResult::from_errors(findings.0)
}

#[cfg(test)]
mod tests {
	use super::*;
	use intent_types::{Constraint, ParsedIntent, Route, Step};
	use serde_json::json;

	fn swap_intent(amount: &str, from: &str, to: &str) -> Intent {
		let parameters = json!({ "amount": amount, "from_token": from, "to_token": to });
		Intent::new(
			"swap",
			ParsedIntent {
				intent_type: IntentType::Swap,
				parameters: parameters.as_object().cloned().unwrap(),
				routes: vec![Route {
					protocol: "uniswap-v3".into(),
					steps: vec![Step {
						action: "swap".into(),
						parameters: Parameters::new(),
					}],
					estimated_output: "2991".into(),
					estimated_cost: "0.004".into(),
					execution_time: 15u64.into(),
				}],
			},
			vec![],
		)
	}

	#[test]
	fn test_valid_swap() {
		let result = validate_intent(&swap_intent("1", "ETH", "USDC"), 50.0);
		assert!(result.valid, "{:?}", result.errors);
	}

	#[test]
	fn test_errors_are_collected_in_order() {
		let mut intent = swap_intent("0", "ETH", "eth");
		intent.constraints.push(Constraint::new(ConstraintType::MaxSlippage, 75u64));
		intent.parsed.routes.clear();
		let result = validate_intent(&intent, 50.0);
		assert!(!result.valid);
		assert_eq!(
			result.errors,
			vec![
				"amount must be greater than zero",
				"from_token and to_token must differ",
				"max_slippage must be a percentage in (0, 50]",
				"intent has no routes",
			]
		);
	}

	#[test]
	fn test_bounds_must_hold_on_one_route() {
		let mut intent = swap_intent("1", "ETH", "USDC");
		intent.constraints.push(Constraint::new(ConstraintType::MaxCost, "0.01"));
		assert!(validate_intent(&intent, 50.0).valid);

		intent.constraints.push(Constraint::new(ConstraintType::MinOutput, "3000"));
		let result = validate_intent(&intent, 50.0);
		assert_eq!(
			result.errors,
			vec!["no route satisfies the max_cost and min_output constraints"]
		);
	}

	#[test]
	fn test_composite_checks_each_part() {
		let parameters = json!({
			"intents": [
				{ "type": "swap", "parameters": { "amount": "1", "from_token": "ETH", "to_token": "USDC" } },
				{ "type": "bridge", "parameters": { "amount": "3000", "token": "USDC", "from_chain": "base", "to_chain": "base" } }
			]
		});
		let mut intent = swap_intent("1", "ETH", "USDC");
		intent.parsed.intent_type = IntentType::Composite;
		intent.parsed.parameters = parameters.as_object().cloned().unwrap();
		let result = validate_intent(&intent, 50.0);
		assert_eq!(result.errors, vec!["intent 2: from_chain and to_chain must differ"]);
	}
}
