//! Configuration loading from files and environment.

use crate::types::IntentConfig;
use crate::ConfigError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

static ENV_PLACEHOLDER: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static pattern compiles"));

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
	Toml,
	Json,
	Yaml,
}

impl ConfigFormat {
	/// Picks the format from a file extension.
	pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
		match path.extension().and_then(|s| s.to_str()) {
			Some("toml") => Ok(Self::Toml),
			Some("json") => Ok(Self::Json),
			Some("yaml") | Some("yml") => Ok(Self::Yaml),
			_ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
		}
	}
}

/// Configuration loader with environment variable substitution and
/// overrides.
pub struct ConfigLoader {
	file_path: Option<PathBuf>,
	env_prefix: String,
}

impl Default for ConfigLoader {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: "INTENT_".to_string(),
		}
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_path_buf());
		self
	}

	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	/// Loads the file (or defaults when none is set), applies environment
	/// overrides and validates the result.
	pub async fn load(&self) -> Result<IntentConfig, ConfigError> {
		self.load_with(&|key: &str| std::env::var(key).ok()).await
	}

	async fn load_with(
		&self,
		env: &(dyn Fn(&str) -> Option<String> + Sync),
	) -> Result<IntentConfig, ConfigError> {
		let mut config = match &self.file_path {
			Some(path) => {
				info!("Loading configuration from {:?}", path);
				let format = ConfigFormat::from_path(path)?;
				let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
					ConfigError::Io(format!("Failed to read config file {:?}: {}", path, e))
				})?;
				Self::parse_with(&contents, format, env)?
			}
			None => {
				debug!("No configuration file given, using defaults");
				IntentConfig::default()
			}
		};

		self.apply_env_overrides(&mut config, env)?;
		validate_config(&config)?;
		Ok(config)
	}

	/// Parses a document after substituting `${VAR}` placeholders from the
	/// process environment. Does not apply overrides or validate.
	pub fn parse(contents: &str, format: ConfigFormat) -> Result<IntentConfig, ConfigError> {
		Self::parse_with(contents, format, &|key: &str| std::env::var(key).ok())
	}

	fn parse_with(
		contents: &str,
		format: ConfigFormat,
		env: &dyn Fn(&str) -> Option<String>,
	) -> Result<IntentConfig, ConfigError> {
		let contents = substitute_env_vars(contents, env)?;
		match format {
			ConfigFormat::Toml => {
				toml::from_str(&contents).map_err(|e| ConfigError::Parse(format!("TOML: {}", e)))
			}
			ConfigFormat::Json => serde_json::from_str(&contents)
				.map_err(|e| ConfigError::Parse(format!("JSON: {}", e))),
			ConfigFormat::Yaml => serde_yaml::from_str(&contents)
				.map_err(|e| ConfigError::Parse(format!("YAML: {}", e))),
		}
	}

	fn apply_env_overrides(
		&self,
		config: &mut IntentConfig,
		env: &dyn Fn(&str) -> Option<String>,
	) -> Result<(), ConfigError> {
		let var = |name: &str| env(&format!("{}{}", self.env_prefix, name));

		if let Some(level) = var("LOG_LEVEL") {
			debug!("Overriding log level from environment");
			config.logging.level = level;
		}

		if let Some(port) = var("API_PORT") {
			config.api.port = port
				.parse()
				.map_err(|e| ConfigError::Validation(format!("Invalid API port: {}", e)))?;
		}

		if let Some(timeout) = var("CALL_TIMEOUT_MS") {
			let ms = timeout
				.parse()
				.map_err(|e| ConfigError::Validation(format!("Invalid call timeout: {}", e)))?;
			config.engine.call_timeout_ms = Some(ms);
		}

		if let Some(kind) = var("CAPABILITY") {
			debug!(capability = %kind, "Overriding capability type from environment");
			config.capability.kind = kind;
		}

		Ok(())
	}
}

/// Replaces every `${VAR}` with its value. A missing variable is an error.
fn substitute_env_vars(
	content: &str,
	env: &dyn Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
	let mut missing = None;
	let result = ENV_PLACEHOLDER.replace_all(content, |caps: &regex::Captures| {
		env(&caps[1]).unwrap_or_else(|| {
			missing.get_or_insert_with(|| caps[1].to_string());
			String::new()
		})
	});

	match missing {
		Some(name) => Err(ConfigError::EnvVarNotFound(name)),
		None => Ok(result.into_owned()),
	}
}

/// Checks cross-field rules and the capability's own schema.
pub fn validate_config(config: &IntentConfig) -> Result<(), ConfigError> {
	if config.engine.name.trim().is_empty() {
		return Err(ConfigError::Validation(
			"engine.name must not be empty".into(),
		));
	}

	if config.engine.call_timeout_ms == Some(0) {
		return Err(ConfigError::Validation(
			"engine.call_timeout_ms must be greater than zero".into(),
		));
	}

	if config.api.port == 0 {
		return Err(ConfigError::Validation("api.port must not be zero".into()));
	}

	if !config.capability.config.is_table() {
		return Err(ConfigError::Validation(
			"capability.config must be a table".into(),
		));
	}

	let schema = intent_capability::config_schema(&config.capability.kind).ok_or_else(|| {
		ConfigError::Validation(format!(
			"Unknown capability type '{}', expected one of {:?}",
			config.capability.kind,
			intent_capability::CAPABILITY_TYPES
		))
	})?;
	schema
		.validate(&config.capability.config)
		.map_err(|e| ConfigError::Validation(format!("capability.config: {}", e)))?;

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;
	use std::io::Write;

	fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + Sync {
		let map: HashMap<String, String> = pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		move |key: &str| map.get(key).cloned()
	}

	fn no_env(_: &str) -> Option<String> {
		None
	}

	#[test]
	fn test_default_config() {
		let config = IntentConfig::default();
		assert_eq!(config.engine.name, "intent-engine");
		assert_eq!(config.capability.kind, "rules");
		assert_eq!(config.api.bind_address(), "127.0.0.1:3001");
		assert_eq!(config.logging.level, "info");
		assert!(validate_config(&config).is_ok());
	}

	#[test]
	fn test_toml_parsing() {
		let toml = r#"
[engine]
name = "desk-engine"
call_timeout_ms = 2500

[capability]
type = "http"

[capability.config]
base_url = "http://backend:3001"
timeout_ms = 4000

[api]
port = 8088

[logging]
level = "debug"
json = true
"#;

		let config = ConfigLoader::parse_with(toml, ConfigFormat::Toml, &no_env).unwrap();
		assert_eq!(config.engine.name, "desk-engine");
		assert_eq!(config.engine.call_timeout().unwrap().as_millis(), 2500);
		assert_eq!(config.capability.kind, "http");
		assert_eq!(
			config.capability.config.get("timeout_ms").and_then(|v| v.as_integer()),
			Some(4000)
		);
		assert_eq!(config.api.host, "127.0.0.1");
		assert_eq!(config.api.port, 8088);
		assert!(config.logging.json);
		assert!(validate_config(&config).is_ok());
	}

	#[test]
	fn test_json_and_yaml_parsing() {
		let json = r#"{ "capability": { "type": "rules", "config": { "default_currency": "USD" } } }"#;
		let config = ConfigLoader::parse_with(json, ConfigFormat::Json, &no_env).unwrap();
		assert_eq!(
			config.capability.config.get("default_currency").and_then(|v| v.as_str()),
			Some("USD")
		);

		let yaml = "engine:\n  name: yaml-engine\napi:\n  port: 9000\n";
		let config = ConfigLoader::parse_with(yaml, ConfigFormat::Yaml, &no_env).unwrap();
		assert_eq!(config.engine.name, "yaml-engine");
		assert_eq!(config.api.port, 9000);
	}

	#[test]
	fn test_env_substitution() {
		let toml = "[capability.config]\nbase_url = \"${BACKEND_URL}\"\n";
		let env = env_of(&[("BACKEND_URL", "http://10.0.0.5:3001")]);
		let config = ConfigLoader::parse_with(toml, ConfigFormat::Toml, &env).unwrap();
		assert_eq!(
			config.capability.config.get("base_url").and_then(|v| v.as_str()),
			Some("http://10.0.0.5:3001")
		);

		let result = ConfigLoader::parse_with(toml, ConfigFormat::Toml, &no_env);
		assert!(matches!(result, Err(ConfigError::EnvVarNotFound(name)) if name == "BACKEND_URL"));
	}

	#[test]
	fn test_env_overrides() {
		let loader = ConfigLoader::new();
		let mut config = IntentConfig::default();
		let env = env_of(&[
			("INTENT_LOG_LEVEL", "trace"),
			("INTENT_API_PORT", "4000"),
			("INTENT_CALL_TIMEOUT_MS", "750"),
			("INTENT_CAPABILITY", "http"),
		]);
		loader.apply_env_overrides(&mut config, &env).unwrap();
		assert_eq!(config.logging.level, "trace");
		assert_eq!(config.api.port, 4000);
		assert_eq!(config.engine.call_timeout_ms, Some(750));
		assert_eq!(config.capability.kind, "http");

		let env = env_of(&[("INTENT_API_PORT", "eighty")]);
		assert!(matches!(
			loader.apply_env_overrides(&mut config, &env),
			Err(ConfigError::Validation(_))
		));
	}

	#[test]
	fn test_validation_failures() {
		let mut config = IntentConfig::default();
		config.capability.kind = "wasm".into();
		assert!(matches!(validate_config(&config), Err(ConfigError::Validation(msg)) if msg.contains("wasm")));

		let mut config = IntentConfig::default();
		config.api.port = 0;
		assert!(validate_config(&config).is_err());

		let mut config = IntentConfig::default();
		config.engine.name = "  ".into();
		assert!(validate_config(&config).is_err());

		let mut config = IntentConfig::default();
		config.capability.config = toml::from_str("slippage_limit = 250.0").unwrap();
		assert!(matches!(
			validate_config(&config),
			Err(ConfigError::Validation(msg)) if msg.contains("slippage_limit")
		));
	}

	#[tokio::test]
	async fn test_load_from_file() {
		let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
		writeln!(file, "[engine]\nname = \"file-engine\"\n\n[api]\nport = 3100").unwrap();

		let loader = ConfigLoader::new().with_file(file.path());
		let config = loader
			.load_with(&env_of(&[("INTENT_API_PORT", "3200")]))
			.await
			.unwrap();
		assert_eq!(config.engine.name, "file-engine");
		assert_eq!(config.api.port, 3200);
	}

	#[tokio::test]
	async fn test_load_errors() {
		let loader = ConfigLoader::new().with_file("/nonexistent/intent.toml");
		assert!(matches!(loader.load_with(&no_env).await, Err(ConfigError::Io(_))));

		let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
		let loader = ConfigLoader::new().with_file(file.path());
		assert!(matches!(
			loader.load_with(&no_env).await,
			Err(ConfigError::UnsupportedFormat(_))
		));
	}
}
