//! Validation and cost estimation results.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Error message reported when validation itself could not run.
pub const VALIDATION_FAILED_MESSAGE: &str = "Validation failed";

/// Outcome of validating an intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
	pub valid: bool,
	/// Human-readable, in the order they were found. Empty iff `valid`.
	#[serde(default)]
	pub errors: Vec<String>,
}

impl ValidationResult {
	pub fn valid() -> Self {
		Self {
			valid: true,
			errors: Vec::new(),
		}
	}

	pub fn invalid(errors: Vec<String>) -> Self {
		Self {
			valid: false,
			errors,
		}
	}

	/// Synthetic result used when the validation capability faulted.
	pub fn failed() -> Self {
		Self::invalid(vec![VALIDATION_FAILED_MESSAGE.to_string()])
	}

	/// Builds a result from collected errors.
	pub fn from_errors(errors: Vec<String>) -> Self {
		if errors.is_empty() {
			Self::valid()
		} else {
			Self::invalid(errors)
		}
	}

	/// True when `valid` agrees with the error list.
	pub fn is_consistent(&self) -> bool {
		self.valid == self.errors.is_empty()
	}
}

/// Estimated execution cost range for an intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
	/// Decimal string.
	pub min_cost: String,
	/// Decimal string.
	pub max_cost: String,
	/// In `[0, 1]`.
	pub confidence: f64,
	pub currency: String,
}

impl CostEstimate {
	pub const FALLBACK_MIN_COST: &'static str = "0.01";
	pub const FALLBACK_MAX_COST: &'static str = "0.05";
	pub const FALLBACK_CONFIDENCE: f64 = 0.5;
	pub const FALLBACK_CURRENCY: &'static str = "ETH";

	/// Conservative placeholder returned when estimation fails.
	pub fn fallback() -> Self {
		Self {
			min_cost: Self::FALLBACK_MIN_COST.to_string(),
			max_cost: Self::FALLBACK_MAX_COST.to_string(),
			confidence: Self::FALLBACK_CONFIDENCE,
			currency: Self::FALLBACK_CURRENCY.to_string(),
		}
	}

	pub fn from_range(min: Decimal, max: Decimal, confidence: f64, currency: &str) -> Self {
		Self {
			min_cost: min.normalize().to_string(),
			max_cost: max.normalize().to_string(),
			confidence,
			currency: currency.to_string(),
		}
	}

	/// Checks that both bounds are decimals with `min <= max`, the confidence
	/// lies in `[0, 1]` and a currency is named.
	pub fn check(&self) -> Result<(), String> {
		let min = parse_decimal(&self.min_cost)
			.ok_or_else(|| format!("min_cost is not a decimal: {:?}", self.min_cost))?;
		let max = parse_decimal(&self.max_cost)
			.ok_or_else(|| format!("max_cost is not a decimal: {:?}", self.max_cost))?;
		if min > max {
			return Err(format!("min_cost {} exceeds max_cost {}", min, max));
		}
		if !(0.0..=1.0).contains(&self.confidence) {
			return Err(format!("confidence {} outside [0, 1]", self.confidence));
		}
		if self.currency.trim().is_empty() {
			return Err("currency is empty".to_string());
		}
		Ok(())
	}
}

/// Parses a decimal amount string, accepting scientific notation.
pub fn parse_decimal(value: &str) -> Option<Decimal> {
	let value = value.trim();
	Decimal::from_str(value)
		.or_else(|_| Decimal::from_scientific(value))
		.ok()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn dec(s: &str) -> Decimal {
		Decimal::from_str(s).unwrap()
	}

	#[test]
	fn test_fallback_constant() {
		let estimate = CostEstimate::fallback();
		assert_eq!(estimate.min_cost, "0.01");
		assert_eq!(estimate.max_cost, "0.05");
		assert_eq!(estimate.confidence, 0.5);
		assert_eq!(estimate.currency, "ETH");
		assert!(estimate.check().is_ok());
	}

	#[test]
	fn test_check_compares_numerically() {
		// "9" > "10" as strings, but not as amounts
		let estimate = CostEstimate::from_range(dec("9"), dec("10"), 0.8, "ETH");
		assert!(estimate.check().is_ok());

		let inverted = CostEstimate {
			min_cost: "10".into(),
			max_cost: "9".into(),
			confidence: 0.8,
			currency: "ETH".into(),
		};
		assert!(inverted.check().is_err());
	}

	#[test]
	fn test_check_rejects_bad_confidence_and_amounts() {
		let mut estimate = CostEstimate::fallback();
		estimate.confidence = 1.5;
		assert!(estimate.check().is_err());

		let mut estimate = CostEstimate::fallback();
		estimate.min_cost = "cheap".into();
		assert!(estimate.check().is_err());
	}

	#[test]
	fn test_validation_result_consistency() {
		assert!(ValidationResult::valid().is_consistent());
		assert!(ValidationResult::failed().is_consistent());
		assert_eq!(ValidationResult::failed().errors, vec!["Validation failed"]);
		assert!(!ValidationResult {
			valid: true,
			errors: vec!["oops".into()]
		}
		.is_consistent());
		assert!(ValidationResult::from_errors(vec![]).valid);
	}

	#[test]
	fn test_parse_decimal_forms() {
		assert_eq!(parse_decimal(" 0.05 "), Some(dec("0.05")));
		assert_eq!(parse_decimal("1e-2"), Some(dec("0.01")));
		assert_eq!(parse_decimal("abc"), None);
	}
}
