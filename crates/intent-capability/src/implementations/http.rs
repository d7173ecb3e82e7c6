//! HTTP capability.
//!
//! Delegates every operation to a remote intent API, such as another
//! `intentctl serve` instance. Loading checks that the backend answers its
//! health endpoint.

use async_trait::async_trait;
use intent_types::{ConfigSchema, Field, FieldType, Schema, SchemaError};
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::{CapabilityError, CapabilityLoader, IntentCapability};

const DEFAULT_BASE_URL: &str = "http://localhost:3001";
const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Configuration schema for the HTTP capability.
pub struct HttpConfigSchema;

impl ConfigSchema for HttpConfigSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), SchemaError> {
		let schema = Schema::new(
			// Required fields
			vec![],
			// Optional fields
			vec![
				Field::new("base_url", FieldType::String).with_validator(|v| {
					match v.as_str() {
						Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
							Ok(())
						}
						_ => Err("must be an http(s) URL".to_string()),
					}
				}),
				Field::new(
					"timeout_ms",
					FieldType::Integer {
						min: Some(1),
						max: None,
					},
				),
			],
		);

		schema.validate(config)
	}
}

/// Loader that connects to a remote intent API.
pub struct HttpLoader {
	base_url: String,
	timeout_ms: u64,
}

impl HttpLoader {
	pub fn new(base_url: impl Into<String>, timeout_ms: u64) -> Self {
		Self {
			base_url: base_url.into().trim_end_matches('/').to_string(),
			timeout_ms,
		}
	}
}

#[async_trait]
impl CapabilityLoader for HttpLoader {
	fn name(&self) -> &str {
		"http"
	}

	async fn load(&self) -> Result<Arc<dyn IntentCapability>, CapabilityError> {
		let client = Client::builder()
			.timeout(Duration::from_millis(self.timeout_ms))
			.build()
			.map_err(|e| {
				CapabilityError::Unavailable(format!("Failed to create HTTP client: {}", e))
			})?;

		let url = format!("{}/api/health", self.base_url);
		let response = client.get(&url).send().await.map_err(|e| {
			CapabilityError::Unavailable(format!("Health check against {} failed: {}", url, e))
		})?;
		if !response.status().is_success() {
			return Err(CapabilityError::Unavailable(format!(
				"Health check against {} returned {}",
				url,
				response.status()
			)));
		}

		info!(base_url = %self.base_url, "HTTP capability connected");
		Ok(Arc::new(HttpCapability {
			client,
			base_url: self.base_url.clone(),
			timeout_ms: self.timeout_ms,
		}))
	}
}

/// Capability backed by a remote intent API.
pub struct HttpCapability {
	client: Client,
	base_url: String,
	timeout_ms: u64,
}

impl HttpCapability {
	async fn post(&self, path: &str, body: String) -> Result<serde_json::Value, CapabilityError> {
		let url = format!("{}{}", self.base_url, path);
		debug!(%url, "posting to intent API");

		let response = self
			.client
			.post(&url)
			.header(CONTENT_TYPE, "application/json")
			.body(body)
			.send()
			.await
			.map_err(|e| {
				if e.is_timeout() {
					CapabilityError::Timeout(self.timeout_ms)
				} else {
					CapabilityError::Transport(format!("HTTP request failed: {}", e))
				}
			})?;

		let status = response.status();
		let text = response
			.text()
			.await
			.map_err(|e| CapabilityError::Transport(format!("Failed to read response: {}", e)))?;

		if status.is_client_error() {
			return Err(CapabilityError::Rejected(error_message(status, &text)));
		}
		if !status.is_success() {
			return Err(CapabilityError::Transport(error_message(status, &text)));
		}

		serde_json::from_str(&text)
			.map_err(|e| CapabilityError::Malformed(format!("Failed to parse JSON response: {}", e)))
	}
}

/// Prefers the `message` or `error` field of a JSON error body.
fn error_message(status: StatusCode, body: &str) -> String {
	serde_json::from_str::<serde_json::Value>(body)
		.ok()
		.and_then(|v| {
			v.get("message")
				.or_else(|| v.get("error"))
				.and_then(|m| m.as_str())
				.map(str::to_string)
		})
		.unwrap_or_else(|| format!("HTTP request failed with status: {}", status))
}

#[async_trait]
impl IntentCapability for HttpCapability {
	async fn parse(&self, input: &str) -> Result<serde_json::Value, CapabilityError> {
		let body = serde_json::json!({ "input": input }).to_string();
		self.post("/api/intents/parse", body).await
	}

	async fn validate(&self, intent_json: &str) -> Result<serde_json::Value, CapabilityError> {
		self.post("/api/intents/validate", intent_json.to_string())
			.await
	}

	async fn estimate_cost(
		&self,
		intent_json: &str,
	) -> Result<serde_json::Value, CapabilityError> {
		self.post("/api/intents/estimate", intent_json.to_string())
			.await
	}
}

/// Factory function to create an HTTP loader from configuration.
///
/// Configuration parameters:
/// - `base_url`: root of the intent API (default: "http://localhost:3001")
/// - `timeout_ms`: per-request timeout (default: 5000)
pub fn create_loader(config: &toml::Value) -> HttpLoader {
	let base_url = config
		.get("base_url")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_BASE_URL);
	let timeout_ms = config
		.get("timeout_ms")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_TIMEOUT_MS);

	HttpLoader::new(base_url, timeout_ms)
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::{http::StatusCode as AxumStatus, routing::get, routing::post, Json, Router};
	use serde_json::{json, Value};

	async fn spawn_backend() -> String {
		let app = Router::new()
			.route("/api/health", get(|| async { Json(json!({ "status": "healthy" })) }))
			.route(
				"/api/intents/parse",
				post(|Json(body): Json<Value>| async move {
					if body["input"] == "gibberish" {
						return (
							AxumStatus::UNPROCESSABLE_ENTITY,
							Json(json!({ "error": "parse_failed", "message": "Unrecognized intent" })),
						);
					}
					(AxumStatus::OK, Json(json!({ "echo": body["input"] })))
				}),
			)
			.route(
				"/api/intents/validate",
				post(|| async { (AxumStatus::INTERNAL_SERVER_ERROR, "boom") }),
			)
			.route("/api/intents/estimate", post(|| async { "not json" }));

		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			axum::serve(listener, app).await.unwrap();
		});
		format!("http://{}", addr)
	}

	#[tokio::test]
	async fn test_parse_round_trip() {
		let base = spawn_backend().await;
		let cap = HttpLoader::new(base, 2000).load().await.unwrap();
		let value = cap.parse("swap 1 ETH for USDC").await.unwrap();
		assert_eq!(value["echo"], "swap 1 ETH for USDC");
	}

	#[tokio::test]
	async fn test_status_mapping() {
		let base = spawn_backend().await;
		let cap = HttpLoader::new(format!("{}/", base), 2000)
			.load()
			.await
			.unwrap();

		assert_eq!(
			cap.parse("gibberish").await,
			Err(CapabilityError::Rejected("Unrecognized intent".into()))
		);
		assert!(matches!(
			cap.validate("{}").await,
			Err(CapabilityError::Transport(_))
		));
		assert!(matches!(
			cap.estimate_cost("{}").await,
			Err(CapabilityError::Malformed(_))
		));
	}

	#[tokio::test]
	async fn test_load_fails_without_backend() {
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		drop(listener);

		let result = HttpLoader::new(format!("http://{}", addr), 500).load().await;
		assert!(matches!(result, Err(CapabilityError::Unavailable(_))));
	}

	#[test]
	fn test_factory_defaults() {
		let loader = create_loader(&toml::Value::Table(Default::default()));
		assert_eq!(loader.base_url, DEFAULT_BASE_URL);
		assert_eq!(loader.timeout_ms, DEFAULT_TIMEOUT_MS);
	}
}
