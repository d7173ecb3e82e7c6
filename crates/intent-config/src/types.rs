//! Configuration types for the intent engine.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete engine configuration. Every section has defaults, so an empty
/// document is a valid configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct IntentConfig {
	/// Engine identity and call deadline
	#[serde(default)]
	pub engine: EngineSettings,
	/// Which capability backs the engine
	#[serde(default)]
	pub capability: CapabilitySettings,
	/// HTTP API listener
	#[serde(default)]
	pub api: ApiSettings,
	/// Log output
	#[serde(default)]
	pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineSettings {
	/// Engine name for logs and health reports
	#[serde(default = "default_engine_name")]
	pub name: String,
	/// Deadline for loading the capability and for each call to it
	#[serde(default)]
	pub call_timeout_ms: Option<u64>,
}

impl EngineSettings {
	pub fn call_timeout(&self) -> Option<Duration> {
		self.call_timeout_ms.map(Duration::from_millis)
	}
}

impl Default for EngineSettings {
	fn default() -> Self {
		Self {
			name: default_engine_name(),
			call_timeout_ms: None,
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CapabilitySettings {
	/// Implementation name: "rules" or "http"
	#[serde(rename = "type", default = "default_capability_type")]
	pub kind: String,
	/// Implementation-specific table
	#[serde(default = "empty_table")]
	pub config: toml::Value,
}

impl Default for CapabilitySettings {
	fn default() -> Self {
		Self {
			kind: default_capability_type(),
			config: empty_table(),
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiSettings {
	#[serde(default = "default_host")]
	pub host: String,
	#[serde(default = "default_port")]
	pub port: u16,
}

impl ApiSettings {
	pub fn bind_address(&self) -> String {
		format!("{}:{}", self.host, self.port)
	}
}

impl Default for ApiSettings {
	fn default() -> Self {
		Self {
			host: default_host(),
			port: default_port(),
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
	/// Filter directive used when `RUST_LOG` is unset
	#[serde(default = "default_log_level")]
	pub level: String,
	/// Emit JSON lines instead of human-readable output
	#[serde(default)]
	pub json: bool,
}

impl Default for LoggingSettings {
	fn default() -> Self {
		Self {
			level: default_log_level(),
			json: false,
		}
	}
}

fn default_engine_name() -> String {
	"intent-engine".to_string()
}

fn default_capability_type() -> String {
	"rules".to_string()
}

fn empty_table() -> toml::Value {
	toml::Value::Table(toml::map::Map::new())
}

fn default_host() -> String {
	"127.0.0.1".to_string()
}

fn default_port() -> u16 {
	3001
}

fn default_log_level() -> String {
	"info".to_string()
}
