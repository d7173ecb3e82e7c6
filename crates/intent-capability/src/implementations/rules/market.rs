//! Static market data and route construction for the rules capability.
//!
//! Prices, fees and gas costs are reference figures, good enough to rank
//! candidate routes against each other. Gas costs are denominated in ETH.

use intent_types::{Parameters, Route, Step};
use rust_decimal::Decimal;
use serde_json::json;

use super::grammar::{Action, Side};
use crate::CapabilityError;

#[derive(Debug)]
pub(crate) struct TokenInfo {
	pub symbol: &'static str,
	/// Reference USD price as (mantissa, scale).
	usd: (i64, u32),
	pub stable: bool,
	pub native: bool,
}

impl TokenInfo {
	pub fn usd_price(&self) -> Decimal {
		Decimal::new(self.usd.0, self.usd.1)
	}
}

const TOKENS: &[TokenInfo] = &[
	TokenInfo { symbol: "ETH", usd: (3000, 0), stable: false, native: true },
	TokenInfo { symbol: "WETH", usd: (3000, 0), stable: false, native: false },
	TokenInfo { symbol: "STETH", usd: (2995, 0), stable: false, native: false },
	TokenInfo { symbol: "WBTC", usd: (60000, 0), stable: false, native: false },
	TokenInfo { symbol: "USDC", usd: (1, 0), stable: true, native: false },
	TokenInfo { symbol: "USDT", usd: (1, 0), stable: true, native: false },
	TokenInfo { symbol: "DAI", usd: (1, 0), stable: true, native: false },
	TokenInfo { symbol: "LINK", usd: (15, 0), stable: false, native: false },
	TokenInfo { symbol: "UNI", usd: (8, 0), stable: false, native: false },
	TokenInfo { symbol: "ARB", usd: (100, 2), stable: false, native: false },
	TokenInfo { symbol: "OP", usd: (200, 2), stable: false, native: false },
	TokenInfo { symbol: "MATIC", usd: (70, 2), stable: false, native: false },
];

const CHAINS: &[(&str, &[&str])] = &[
	("ethereum", &["mainnet", "eth"]),
	("arbitrum", &["arb", "arbitrum-one"]),
	("optimism", &["op"]),
	("base", &[]),
	("polygon", &["matic"]),
	("bsc", &["bnb", "binance"]),
	("avalanche", &["avax"]),
];

pub(crate) fn token(symbol: &str) -> Option<&'static TokenInfo> {
	let symbol = symbol.to_ascii_uppercase();
	TOKENS.iter().find(|t| t.symbol == symbol)
}

/// Resolves a chain name or alias to its canonical name.
pub(crate) fn chain(name: &str) -> Option<&'static str> {
	let name = name.to_ascii_lowercase();
	CHAINS
		.iter()
		.find(|(canonical, aliases)| *canonical == name || aliases.contains(&name.as_str()))
		.map(|(canonical, _)| *canonical)
}

struct Venue {
	protocol: &'static str,
	fee_bps: i64,
	/// ETH, as (mantissa, scale).
	gas: (i64, u32),
	execution_time: u64,
}

impl Venue {
	fn gas_cost(&self) -> Decimal {
		Decimal::new(self.gas.0, self.gas.1)
	}

	fn after_fee(&self, amount: Decimal) -> Result<Decimal, CapabilityError> {
		checked_mul(amount, Decimal::ONE - Decimal::new(self.fee_bps, 4))
	}
}

const SWAP_VENUES: &[Venue] = &[
	Venue { protocol: "uniswap-v3", fee_bps: 30, gas: (4, 3), execution_time: 15 },
	Venue { protocol: "1inch", fee_bps: 10, gas: (6, 3), execution_time: 20 },
	Venue { protocol: "sushiswap", fee_bps: 30, gas: (5, 3), execution_time: 15 },
];

/// Only offered when both sides are stablecoins.
static STABLE_SWAP_VENUE: Venue = Venue { protocol: "curve", fee_bps: 4, gas: (3, 3), execution_time: 15 };

const BRIDGE_VENUES: &[Venue] = &[
	Venue { protocol: "across", fee_bps: 5, gas: (2, 3), execution_time: 120 },
	Venue { protocol: "stargate", fee_bps: 6, gas: (3, 3), execution_time: 300 },
	Venue { protocol: "hop", fee_bps: 10, gas: (25, 4), execution_time: 600 },
];

const LIMIT_VENUES: &[Venue] = &[
	Venue { protocol: "cow-swap", fee_bps: 0, gas: (2, 3), execution_time: 1800 },
	Venue { protocol: "1inch-limit-order", fee_bps: 0, gas: (3, 3), execution_time: 3600 },
];

struct YieldVenue {
	protocol: &'static str,
	/// (token, APY in basis points)
	markets: &'static [(&'static str, i64)],
	gas: (i64, u32),
	execution_time: u64,
}

const YIELD_VENUES: &[YieldVenue] = &[
	YieldVenue {
		protocol: "lido",
		markets: &[("ETH", 320)],
		gas: (5, 3),
		execution_time: 30,
	},
	YieldVenue {
		protocol: "aave",
		markets: &[("ETH", 200), ("WETH", 200), ("WBTC", 50), ("USDC", 450), ("USDT", 430), ("DAI", 440)],
		gas: (7, 3),
		execution_time: 30,
	},
	YieldVenue {
		protocol: "compound",
		markets: &[("ETH", 180), ("USDC", 400), ("USDT", 390), ("DAI", 380)],
		gas: (8, 3),
		execution_time: 30,
	},
	YieldVenue {
		protocol: "yearn",
		markets: &[("USDC", 550), ("DAI", 520)],
		gas: (9, 3),
		execution_time: 45,
	},
];

pub(crate) fn is_yield_protocol(name: &str) -> bool {
	YIELD_VENUES
		.iter()
		.any(|v| v.protocol.eq_ignore_ascii_case(name))
}

fn too_large() -> CapabilityError {
	CapabilityError::Rejected("Amount too large".into())
}

fn checked_mul(a: Decimal, b: Decimal) -> Result<Decimal, CapabilityError> {
	a.checked_mul(b).ok_or_else(too_large)
}

fn amount_str(amount: Decimal) -> String {
	amount.round_dp(6).normalize().to_string()
}

fn params(value: serde_json::Value) -> Parameters {
	match value {
		serde_json::Value::Object(map) => map,
		_ => Parameters::new(),
	}
}

fn step(action: &str, parameters: serde_json::Value) -> Step {
	Step {
		action: action.to_string(),
		parameters: params(parameters),
	}
}

/// Native assets need no allowance; everything else is approved first.
fn approval(token: &TokenInfo, spender: &str, amount: Decimal) -> Option<Step> {
	(!token.native).then(|| {
		step(
			"approve",
			json!({ "token": token.symbol, "spender": spender, "amount": amount_str(amount) }),
		)
	})
}

fn route(venue_protocol: &str, steps: Vec<Step>, output: Decimal, cost: Decimal, time: u64) -> Route {
	Route {
		protocol: venue_protocol.to_string(),
		steps,
		estimated_output: amount_str(output),
		estimated_cost: amount_str(cost),
		execution_time: time.into(),
	}
}

/// Orders routes best first: highest output, then lowest cost.
fn rank(mut routes: Vec<Route>) -> Vec<Route> {
	let key = |r: &Route| {
		(
			r.estimated_output.parse::<Decimal>().unwrap_or_default(),
			r.estimated_cost.parse::<Decimal>().unwrap_or_default(),
		)
	};
	routes.sort_by(|a, b| {
		let (out_a, cost_a) = key(a);
		let (out_b, cost_b) = key(b);
		out_b.cmp(&out_a).then(cost_a.cmp(&cost_b))
	});
	routes
}

/// Builds the ranked candidate routes for one action.
///
/// Returns an empty list when no venue can serve the action, and an error
/// when the amounts involved do not fit in a decimal.
pub(crate) fn routes_for(action: &Action) -> Result<Vec<Route>, CapabilityError> {
	let routes = match action {
		Action::Swap { amount, from, to } => {
			let rate = from.usd_price() / to.usd_price();
			let stable_pair = from.stable && to.stable;
			let venues = SWAP_VENUES
				.iter()
				.chain(stable_pair.then_some(&STABLE_SWAP_VENUE));
			venues
				.map(|v| {
					let output = v.after_fee(checked_mul(*amount, rate)?)?;
					let mut steps: Vec<Step> = approval(from, v.protocol, *amount).into_iter().collect();
					steps.push(step(
						"swap",
						json!({
							"protocol": v.protocol,
							"token_in": from.symbol,
							"token_out": to.symbol,
							"amount_in": amount_str(*amount),
						}),
					));
					Ok(route(v.protocol, steps, output, v.gas_cost(), v.execution_time))
				})
				.collect::<Result<Vec<_>, _>>()?
		}
		Action::Bridge {
			amount,
			token,
			from_chain,
			to_chain,
		} => BRIDGE_VENUES
			.iter()
			.map(|v| {
				let mut steps: Vec<Step> = approval(token, v.protocol, *amount).into_iter().collect();
				steps.push(step(
					"bridge",
					json!({
						"protocol": v.protocol,
						"token": token.symbol,
						"amount": amount_str(*amount),
						"from_chain": from_chain,
						"to_chain": to_chain,
					}),
				));
				Ok(route(v.protocol, steps, v.after_fee(*amount)?, v.gas_cost(), v.execution_time))
			})
			.collect::<Result<Vec<_>, _>>()?,
		Action::Yield {
			amount,
			token,
			protocol,
		} => YIELD_VENUES
			.iter()
			.filter(|v| {
				protocol
					.as_deref()
					.map_or(true, |p| v.protocol.eq_ignore_ascii_case(p))
			})
			.filter_map(|v| {
				v.markets
					.iter()
					.find(|(symbol, _)| *symbol == token.symbol)
					.map(|(_, apy_bps)| (v, Decimal::new(*apy_bps, 4)))
			})
			.map(|(v, apy)| {
				let mut steps: Vec<Step> = approval(token, v.protocol, *amount).into_iter().collect();
				steps.push(step(
					"deposit",
					json!({
						"protocol": v.protocol,
						"token": token.symbol,
						"amount": amount_str(*amount),
						"apy": apy.normalize().to_string(),
					}),
				));
				// Projected balance after one year
				let output = checked_mul(*amount, Decimal::ONE + apy)?;
				let gas = Decimal::new(v.gas.0, v.gas.1);
				Ok(route(v.protocol, steps, output, gas, v.execution_time))
			})
			.collect::<Result<Vec<_>, _>>()?,
		Action::Limit {
			side,
			amount,
			token,
			price,
			quote,
		} => {
			let notional = checked_mul(*amount, *price)?;
			let (spent, spent_amount, output) = match side {
				Side::Buy => (*quote, notional, *amount),
				Side::Sell => (*token, *amount, notional),
			};
			LIMIT_VENUES
				.iter()
				.map(|v| {
					let mut steps: Vec<Step> = approval(spent, v.protocol, spent_amount).into_iter().collect();
					steps.push(step(
						"place_order",
						json!({
							"protocol": v.protocol,
							"side": side.as_str(),
							"token": token.symbol,
							"amount": amount_str(*amount),
							"limit_price": amount_str(*price),
							"quote_token": quote.symbol,
						}),
					));
					Ok(route(v.protocol, steps, v.after_fee(output)?, v.gas_cost(), v.execution_time))
				})
				.collect::<Result<Vec<_>, _>>()?
		}
	};
	Ok(rank(routes))
}

/// Chains the preferred route of every action into one sequential route.
///
/// Returns `Ok(None)` if any action has no route.
pub(crate) fn composite_route(actions: &[Action]) -> Result<Option<Route>, CapabilityError> {
	let mut protocols = Vec::new();
	let mut steps = Vec::new();
	let mut cost = Decimal::ZERO;
	let mut time = 0u64;
	let mut output = Decimal::ZERO;

	for action in actions {
		let Some(best) = routes_for(action)?.into_iter().next() else {
			return Ok(None);
		};
		protocols.push(best.protocol);
		steps.extend(best.steps);
		let step_cost = best.estimated_cost.parse::<Decimal>().unwrap_or_default();
		cost = cost.checked_add(step_cost).ok_or_else(too_large)?;
		time = time.saturating_add(best.execution_time.as_u64().unwrap_or_default());
		output = best.estimated_output.parse::<Decimal>().unwrap_or_default();
	}

	Ok(Some(route(&protocols.join("+"), steps, output, cost, time)))
}
