//! Regex grammar turning free-form text into actions and constraints.

use intent_types::{Constraint, ConstraintType, ConstraintValue, IntentType, Parameters};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use rust_decimal::Decimal;
use serde_json::json;
use std::str::FromStr;

use super::market::{self, TokenInfo};
use crate::CapabilityError;

macro_rules! regex {
	($pat:expr) => {
		Lazy::new(|| Regex::new($pat).expect("static pattern compiles"))
	};
}

static CLAUSE_SEPARATOR: Lazy<Regex> = regex!(r"(?i)\s*(?:;|,?\s+and\s+then\s+|,?\s+then\s+)\s*");

static SWAP: Lazy<Regex> = regex!(
	r"(?i)^(?:swap|exchange|trade|convert)\s+(?P<amount>\d+(?:\.\d+)?)\s+(?P<from>[a-z][a-z0-9]{1,9})\s+(?:for|to|into)\s+(?P<to>[a-z][a-z0-9]{1,9})\b"
);

static BRIDGE: Lazy<Regex> = regex!(
	r"(?i)^(?:bridge|move|transfer)\s+(?P<amount>\d+(?:\.\d+)?)\s+(?P<token>[a-z][a-z0-9]{1,9})\s+from\s+(?P<from>[a-z][a-z0-9-]*)\s+to\s+(?P<to>[a-z][a-z0-9-]*)\b"
);

static YIELD: Lazy<Regex> = regex!(
	r"(?i)^(?:stake|deposit|lend|supply|(?:earn|farm)\s+(?:yield\s+)?(?:on|with))\s+(?P<amount>\d+(?:\.\d+)?)\s+(?P<token>[a-z][a-z0-9]{1,9})\b(?:\s+(?:in|into|on|with|to|via)\s+(?P<protocol>[a-z][a-z0-9-]*))?"
);

static LIMIT: Lazy<Regex> = regex!(
	r"(?i)^(?P<side>buy|sell)\s+(?P<amount>\d+(?:\.\d+)?)\s+(?P<token>[a-z][a-z0-9]{1,9})\s+(?:at|@|(?:when|if)\s+(?:the\s+)?price\s+(?:is|reaches|hits))\s+\$?(?P<price>\d+(?:\.\d+)?)(?:\s+(?P<quote>[a-z][a-z0-9]{1,9}))?"
);

static SLIPPAGE_BEFORE: Lazy<Regex> =
	regex!(r"(?i)\b(?:max(?:imum)?\s+)?(?P<n>\d+(?:\.\d+)?)\s*%\s*(?:max(?:imum)?\s+)?slippage\b");

static SLIPPAGE_AFTER: Lazy<Regex> =
	regex!(r"(?i)\bslippage\s*(?:of|under|below|at\s+most|max|<=?|:|=)?\s*(?P<n>\d+(?:\.\d+)?)\s*%");

static DEADLINE: Lazy<Regex> = regex!(
	r"(?i)\b(?:within|in\s+under|deadline(?:\s+of)?:?)\s+(?P<n>\d+)\s*(?P<unit>seconds?|secs?|s|minutes?|mins?|m|hours?|hrs?|h)\b"
);

static MIN_OUTPUT: Lazy<Regex> =
	regex!(r"(?i)\b(?:min(?:imum)?\s+output(?:\s+of)?|at\s+least)\s+(?P<n>\d+(?:\.\d+)?)");

static MAX_COST: Lazy<Regex> = regex!(
	r"(?i)\b(?:max(?:imum)?\s+(?:cost|fees?|gas)(?:\s+of)?|(?:gas|fees?|cost)\s+(?:under|below|<=?))\s+(?P<n>\d+(?:\.\d+)?)"
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
	Buy,
	Sell,
}

impl Side {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Buy => "buy",
			Self::Sell => "sell",
		}
	}
}

/// One recognized action within a request.
#[derive(Debug)]
pub(crate) enum Action {
	Swap {
		amount: Decimal,
		from: &'static TokenInfo,
		to: &'static TokenInfo,
	},
	Bridge {
		amount: Decimal,
		token: &'static TokenInfo,
		from_chain: &'static str,
		to_chain: &'static str,
	},
	Yield {
		amount: Decimal,
		token: &'static TokenInfo,
		protocol: Option<String>,
	},
	Limit {
		side: Side,
		amount: Decimal,
		token: &'static TokenInfo,
		price: Decimal,
		quote: &'static TokenInfo,
	},
}

impl Action {
	pub fn intent_type(&self) -> IntentType {
		match self {
			Self::Swap { .. } => IntentType::Swap,
			Self::Bridge { .. } => IntentType::Bridge,
			Self::Yield { .. } => IntentType::Yield,
			Self::Limit { .. } => IntentType::Limit,
		}
	}

	/// Named parameters describing the action; amounts as decimal strings.
	pub fn parameters(&self) -> Parameters {
		let value = match self {
			Self::Swap { amount, from, to } => json!({
				"amount": amount.normalize().to_string(),
				"from_token": from.symbol,
				"to_token": to.symbol,
			}),
			Self::Bridge {
				amount,
				token,
				from_chain,
				to_chain,
			} => json!({
				"amount": amount.normalize().to_string(),
				"token": token.symbol,
				"from_chain": from_chain,
				"to_chain": to_chain,
			}),
			Self::Yield {
				amount,
				token,
				protocol,
			} => {
				let mut value = json!({
					"amount": amount.normalize().to_string(),
					"token": token.symbol,
				});
				if let Some(protocol) = protocol {
					value["protocol"] = json!(protocol);
				}
				value
			}
			Self::Limit {
				side,
				amount,
				token,
				price,
				quote,
			} => json!({
				"side": side.as_str(),
				"amount": amount.normalize().to_string(),
				"token": token.symbol,
				"limit_price": price.normalize().to_string(),
				"quote_token": quote.symbol,
			}),
		};
		match value {
			serde_json::Value::Object(map) => map,
			_ => Parameters::new(),
		}
	}
}

/// A request split into its actions, with every constraint in text order.
#[derive(Debug)]
pub(crate) struct Request {
	pub actions: Vec<Action>,
	pub constraints: Vec<Constraint>,
}

fn rejected(message: impl Into<String>) -> CapabilityError {
	CapabilityError::Rejected(message.into())
}

fn amount(caps: &Captures, name: &str) -> Result<Decimal, CapabilityError> {
	let raw = &caps[name];
	let value = Decimal::from_str(raw).map_err(|_| rejected(format!("Invalid amount: {}", raw)))?;
	if value.is_zero() {
		return Err(rejected("Amount must be greater than zero"));
	}
	Ok(value)
}

fn known_token(caps: &Captures, name: &str) -> Result<&'static TokenInfo, CapabilityError> {
	let raw = &caps[name];
	market::token(raw).ok_or_else(|| rejected(format!("Unknown token: {}", raw.to_uppercase())))
}

fn known_chain(caps: &Captures, name: &str) -> Result<&'static str, CapabilityError> {
	let raw = &caps[name];
	market::chain(raw).ok_or_else(|| rejected(format!("Unknown chain: {}", raw)))
}

fn parse_clause(clause: &str) -> Result<Action, CapabilityError> {
	if let Some(caps) = SWAP.captures(clause) {
		return Ok(Action::Swap {
			amount: amount(&caps, "amount")?,
			from: known_token(&caps, "from")?,
			to: known_token(&caps, "to")?,
		});
	}

	if let Some(caps) = BRIDGE.captures(clause) {
		return Ok(Action::Bridge {
			amount: amount(&caps, "amount")?,
			token: known_token(&caps, "token")?,
			from_chain: known_chain(&caps, "from")?,
			to_chain: known_chain(&caps, "to")?,
		});
	}

	if let Some(caps) = YIELD.captures(clause) {
		// Trailing words that are not a venue ("with max 1% slippage") are ignored
		let protocol = caps
			.name("protocol")
			.map(|m| m.as_str().to_ascii_lowercase())
			.filter(|p| market::is_yield_protocol(p));
		return Ok(Action::Yield {
			amount: amount(&caps, "amount")?,
			token: known_token(&caps, "token")?,
			protocol,
		});
	}

	if let Some(caps) = LIMIT.captures(clause) {
		let side = if caps["side"].eq_ignore_ascii_case("buy") {
			Side::Buy
		} else {
			Side::Sell
		};
		let quote = caps
			.name("quote")
			.and_then(|m| market::token(m.as_str()))
			.or_else(|| market::token("USDC"))
			.ok_or_else(|| rejected("No quote token available"))?;
		return Ok(Action::Limit {
			side,
			amount: amount(&caps, "amount")?,
			token: known_token(&caps, "token")?,
			price: amount(&caps, "price")?,
			quote,
		});
	}

	Err(rejected(format!("Unrecognized intent: {}", clause)))
}

/// `None` when the duration does not fit in seconds.
fn deadline_seconds(n: u64, unit: &str) -> Option<u64> {
	match unit.to_ascii_lowercase().chars().next() {
		Some('h') => n.checked_mul(3600),
		Some('m') => n.checked_mul(60),
		_ => Some(n),
	}
}

fn number(raw: &str) -> ConstraintValue {
	raw.parse::<u64>()
		.map(ConstraintValue::from)
		.ok()
		.or_else(|| {
			raw.parse::<f64>()
				.ok()
				.and_then(serde_json::Number::from_f64)
				.map(ConstraintValue::Number)
		})
		.unwrap_or_else(|| ConstraintValue::from(raw))
}

fn decimal_text(raw: &str) -> ConstraintValue {
	Decimal::from_str(raw)
		.map(|d| ConstraintValue::from(d.normalize().to_string()))
		.unwrap_or_else(|_| ConstraintValue::from(raw))
}

/// Extracts every constraint mentioned in `text`, ordered by position.
/// Overlapping mentions count once.
fn extract_constraints(text: &str) -> Vec<Constraint> {
	let mut found: Vec<(usize, usize, Constraint)> = Vec::new();

	let patterns: [(&Lazy<Regex>, ConstraintType); 5] = [
		(&SLIPPAGE_BEFORE, ConstraintType::MaxSlippage),
		(&SLIPPAGE_AFTER, ConstraintType::MaxSlippage),
		(&DEADLINE, ConstraintType::Deadline),
		(&MIN_OUTPUT, ConstraintType::MinOutput),
		(&MAX_COST, ConstraintType::MaxCost),
	];

	for (pattern, constraint_type) in patterns {
		for caps in pattern.captures_iter(text) {
			let Some(span) = caps.get(0) else { continue };
			if found
				.iter()
				.any(|(start, end, _)| span.start() < *end && *start < span.end())
			{
				continue;
			}
			let raw = &caps["n"];
			let value = match constraint_type {
				ConstraintType::MaxSlippage => number(raw),
				ConstraintType::Deadline => {
					match raw.parse::<u64>().ok().and_then(|n| deadline_seconds(n, &caps["unit"])) {
						Some(seconds) => ConstraintValue::from(seconds),
						None => continue,
					}
				}
				ConstraintType::MinOutput | ConstraintType::MaxCost => decimal_text(raw),
			};
			found.push((span.start(), span.end(), Constraint::new(constraint_type, value)));
		}
	}

	found.sort_by_key(|(start, _, _)| *start);
	found.into_iter().map(|(_, _, c)| c).collect()
}

/// Parses a full request. Every clause must be recognized.
pub(crate) fn parse_request(text: &str) -> Result<Request, CapabilityError> {
	let text = text.trim();
	if text.is_empty() {
		return Err(rejected("Input is empty"));
	}

	let actions = CLAUSE_SEPARATOR
		.split(text)
		.filter(|clause| !clause.trim().is_empty())
		.map(|clause| parse_clause(clause.trim()))
		.collect::<Result<Vec<_>, _>>()?;

	Ok(Request {
		actions,
		constraints: extract_constraints(text),
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_swap_with_slippage() {
		let request = parse_request("swap 10 ETH for USDC with max 1% slippage").unwrap();
		assert_eq!(request.actions.len(), 1);
		assert!(matches!(
			&request.actions[0],
			Action::Swap { from, to, .. } if from.symbol == "ETH" && to.symbol == "USDC"
		));
		assert_eq!(request.constraints.len(), 1);
		assert_eq!(request.constraints[0].constraint_type, ConstraintType::MaxSlippage);
		assert_eq!(request.constraints[0].value.as_f64(), Some(1.0));
	}

	#[test]
	fn test_constraints_keep_text_order() {
		let request = parse_request(
			"swap 2 ETH to DAI, min output 5900 within 10 minutes, slippage 0.5% and max gas 0.01",
		)
		.unwrap();
		let types: Vec<_> = request
			.constraints
			.iter()
			.map(|c| c.constraint_type)
			.collect();
		assert_eq!(
			types,
			vec![
				ConstraintType::MinOutput,
				ConstraintType::Deadline,
				ConstraintType::MaxSlippage,
				ConstraintType::MaxCost,
			]
		);
		assert_eq!(request.constraints[1].value, ConstraintValue::from(600u64));
		assert_eq!(request.constraints[3].value, ConstraintValue::from("0.01"));
	}

	#[test]
	fn test_deadline_that_overflows_is_dropped() {
		let request =
			parse_request("swap 1 ETH for USDC within 18446744073709551615 hours").unwrap();
		assert_eq!(request.actions.len(), 1);
		assert!(request.constraints.is_empty());

		let request = parse_request("swap 1 ETH for USDC within 2 hours").unwrap();
		assert_eq!(request.constraints[0].value, ConstraintValue::from(7200u64));
	}

	#[test]
	fn test_bridge_resolves_chain_aliases() {
		let request = parse_request("bridge 500 USDC from mainnet to arb").unwrap();
		assert!(matches!(
			&request.actions[0],
			Action::Bridge { from_chain: "ethereum", to_chain: "arbitrum", .. }
		));
	}

	#[test]
	fn test_yield_protocol_is_optional() {
		let request = parse_request("stake 5 ETH with lido").unwrap();
		assert!(matches!(
			&request.actions[0],
			Action::Yield { protocol: Some(p), .. } if p == "lido"
		));

		let request = parse_request("deposit 100 USDC with max 1% slippage").unwrap();
		assert!(matches!(&request.actions[0], Action::Yield { protocol: None, .. }));
	}

	#[test]
	fn test_limit_defaults_quote_to_usdc() {
		let request = parse_request("sell 2 ETH when price reaches $4000").unwrap();
		assert!(matches!(
			&request.actions[0],
			Action::Limit { side: Side::Sell, quote, .. } if quote.symbol == "USDC"
		));
	}

	#[test]
	fn test_composite_clauses() {
		let request =
			parse_request("swap 1 ETH for USDC then bridge 3000 USDC from ethereum to base").unwrap();
		assert_eq!(request.actions.len(), 2);
		assert_eq!(request.actions[1].intent_type(), IntentType::Bridge);
	}

	#[test]
	fn test_rejections() {
		assert!(matches!(parse_request("   "), Err(CapabilityError::Rejected(_))));
		assert!(matches!(
			parse_request("swap 0 ETH for USDC"),
			Err(CapabilityError::Rejected(msg)) if msg.contains("greater than zero")
		));
		assert!(matches!(
			parse_request("swap 1 DOGE for USDC"),
			Err(CapabilityError::Rejected(msg)) if msg.contains("DOGE")
		));
		assert!(matches!(
			parse_request("make me rich"),
			Err(CapabilityError::Rejected(msg)) if msg.contains("Unrecognized")
		));
		assert!(matches!(
			parse_request("bridge 1 ETH from ethereum to narnia"),
			Err(CapabilityError::Rejected(msg)) if msg.contains("narnia")
		));
	}
}
