//! HTTP API exposing the engine.
//!
//! The parse, validate and estimate routes speak the same protocol the HTTP
//! capability consumes, so one instance can back another.

use axum::{
	extract::State,
	http::StatusCode,
	response::{IntoResponse, Json, Response},
	routing::{get, post},
	Router,
};
use intent_engine::{EngineError, IntentEngine};
use intent_types::Intent;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::service;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	pub engine: Arc<IntentEngine>,
	pub engine_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ParseRequest {
	pub input: String,
}

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
	pub error: String,
	pub message: String,
}

/// Errors surfaced by API handlers.
pub enum ApiError {
	InvalidRequest(String),
	Engine(EngineError),
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let (status, error, message) = match self {
			Self::InvalidRequest(message) => (StatusCode::BAD_REQUEST, "invalid_request", message),
			Self::Engine(e @ EngineError::Initialization(_)) => {
				(StatusCode::SERVICE_UNAVAILABLE, "engine_unavailable", e.to_string())
			}
			Self::Engine(EngineError::ParseFailure(failure)) => (
				StatusCode::UNPROCESSABLE_ENTITY,
				"parse_failed",
				failure.to_string(),
			),
		};

		let body = ErrorResponse {
			error: error.to_string(),
			message,
		};
		(status, Json(body)).into_response()
	}
}

impl From<EngineError> for ApiError {
	fn from(e: EngineError) -> Self {
		Self::Engine(e)
	}
}

/// Builds the API router.
pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/api/health", get(health_check))
		.route("/api/intents", post(plan_intent))
		.route("/api/intents/parse", post(parse_intent))
		.route("/api/intents/validate", post(validate_intent))
		.route("/api/intents/estimate", post(estimate_cost))
		.with_state(state)
		.layer(TraceLayer::new_for_http())
		.layer(CorsLayer::permissive())
}

/// Serves the API on `bind_address` until `shutdown` completes.
pub async fn serve<F>(state: AppState, bind_address: &str, shutdown: F) -> anyhow::Result<()>
where
	F: std::future::Future<Output = ()> + Send + 'static,
{
	let listener = tokio::net::TcpListener::bind(bind_address).await?;
	info!("Intent API listening on {}", listener.local_addr()?);

	axum::serve(listener, router(state))
		.with_graceful_shutdown(shutdown)
		.await?;

	Ok(())
}

fn checked_input(request: &ParseRequest) -> Result<&str, ApiError> {
	let input = request.input.trim();
	if input.is_empty() {
		return Err(ApiError::InvalidRequest("input must not be empty".into()));
	}
	Ok(input)
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
	Json(serde_json::json!({
		"status": "healthy",
		"version": env!("CARGO_PKG_VERSION"),
		"engine": state.engine_name,
		"engine_ready": state.engine.is_ready(),
		"timestamp": chrono::Utc::now().to_rfc3339(),
	}))
}

async fn parse_intent(
	State(state): State<AppState>,
	Json(request): Json<ParseRequest>,
) -> Result<Json<Intent>, ApiError> {
	let input = checked_input(&request)?;
	match state.engine.parse(input).await {
		Ok(intent) => Ok(Json(intent)),
		Err(e) => {
			warn!("Parse request failed: {}", e);
			Err(e.into())
		}
	}
}

async fn validate_intent(
	State(state): State<AppState>,
	Json(intent): Json<Intent>,
) -> Json<intent_types::ValidationResult> {
	Json(state.engine.validate(&intent).await)
}

async fn estimate_cost(
	State(state): State<AppState>,
	Json(intent): Json<Intent>,
) -> Json<intent_types::CostEstimate> {
	Json(state.engine.estimate_cost(&intent).await)
}

async fn plan_intent(
	State(state): State<AppState>,
	Json(request): Json<ParseRequest>,
) -> Result<Json<service::Plan>, ApiError> {
	let input = checked_input(&request)?;
	match service::plan(&state.engine, input).await {
		Ok(plan) => Ok(Json(plan)),
		Err(e) => {
			warn!("Plan request failed: {}", e);
			Err(e.into())
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::body::Body;
	use axum::http::{header, Request};
	use intent_capability::implementations::http::HttpLoader;
	use intent_capability::{CapabilityError, CapabilityLoader, IntentCapability};
	use intent_config::IntentConfig;
	use serde_json::{json, Value};
	use tower::ServiceExt;

	fn app() -> Router {
		let engine = service::build_engine(&IntentConfig::default()).unwrap();
		router(AppState {
			engine: Arc::new(engine),
			engine_name: "test-engine".into(),
		})
	}

	async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
		let request = Request::builder()
			.method(method)
			.uri(uri)
			.header(header::CONTENT_TYPE, "application/json")
			.body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
			.unwrap();
		let response = app.oneshot(request).await.unwrap();
		let status = response.status();
		let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.unwrap();
		(status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
	}

	#[tokio::test]
	async fn test_health_reports_readiness() {
		let (status, body) = send(app(), "GET", "/api/health", None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["status"], "healthy");
		assert_eq!(body["engine"], "test-engine");
		assert_eq!(body["engine_ready"], false);
	}

	#[tokio::test]
	async fn test_parse_endpoint() {
		let (status, body) = send(
			app(),
			"POST",
			"/api/intents/parse",
			Some(json!({ "input": "bridge 100 USDC from ethereum to base" })),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["status"], "pending");
		assert_eq!(body["parsed"]["type"], "bridge");
		assert_eq!(body["parsed"]["routes"][0]["protocol"], "across");
	}

	#[tokio::test]
	async fn test_parse_errors() {
		let (status, body) = send(
			app(),
			"POST",
			"/api/intents/parse",
			Some(json!({ "input": "make me rich" })),
		)
		.await;
		assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
		assert_eq!(body["error"], "parse_failed");

		let (status, _) = send(
			app(),
			"POST",
			"/api/intents/parse",
			Some(json!({ "input": "   " })),
		)
		.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
	}

	#[tokio::test]
	async fn test_plan_endpoint() {
		let (status, body) = send(
			app(),
			"POST",
			"/api/intents",
			Some(json!({ "input": "swap 1 ETH for USDC" })),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["validation"]["valid"], true);
		assert_eq!(body["estimate"]["min_cost"], "0.004");
		assert_eq!(body["estimate_source"], "capability");
	}

	/// Capability that fails every call after loading.
	struct BrokenCapability;

	#[async_trait::async_trait]
	impl IntentCapability for BrokenCapability {
		async fn parse(&self, _input: &str) -> Result<Value, CapabilityError> {
			Err(CapabilityError::Transport("engine crashed".into()))
		}

		async fn validate(&self, _intent: &str) -> Result<Value, CapabilityError> {
			Err(CapabilityError::Transport("engine crashed".into()))
		}

		async fn estimate_cost(&self, _intent: &str) -> Result<Value, CapabilityError> {
			Err(CapabilityError::Transport("engine crashed".into()))
		}
	}

	struct BrokenLoader;

	#[async_trait::async_trait]
	impl CapabilityLoader for BrokenLoader {
		fn name(&self) -> &str {
			"broken"
		}

		async fn load(&self) -> Result<Arc<dyn IntentCapability>, CapabilityError> {
			Ok(Arc::new(BrokenCapability))
		}
	}

	#[tokio::test]
	async fn test_validate_and_estimate_degrade() {
		let app = router(AppState {
			engine: Arc::new(IntentEngine::new(Arc::new(BrokenLoader), None)),
			engine_name: "broken".into(),
		});
		let intent = json!({
			"id": "intent-1",
			"user_input": "swap 1 ETH for USDC",
			"parsed": {
				"type": "swap",
				"parameters": {},
				"routes": [{
					"protocol": "uniswap-v3",
					"steps": [],
					"estimated_output": "2991",
					"estimated_cost": "0.004",
					"execution_time": 15
				}]
			},
			"constraints": [],
			"status": "pending"
		});

		let (status, body) =
			send(app.clone(), "POST", "/api/intents/validate", Some(intent.clone())).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, json!({ "valid": false, "errors": ["Validation failed"] }));

		let (status, body) = send(app, "POST", "/api/intents/estimate", Some(intent)).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(
			body,
			json!({ "min_cost": "0.01", "max_cost": "0.05", "confidence": 0.5, "currency": "ETH" })
		);
	}

	/// One instance backing another through the HTTP capability.
	#[tokio::test]
	async fn test_http_capability_against_api() {
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			axum::serve(listener, app()).await.unwrap();
		});

		let loader = Arc::new(HttpLoader::new(format!("http://{}", addr), 2000));
		let remote = IntentEngine::new(loader, None);

		let intent = remote.parse("swap 1 ETH for USDC").await.unwrap();
		assert_eq!(intent.parsed.routes.len(), 3);
		assert!(remote.validate(&intent).await.valid);
		let (estimate, source) = remote.estimate_cost_detailed(&intent).await;
		assert_eq!(source, intent_engine::EstimateSource::Capability);
		assert_eq!(estimate.max_cost, "0.006");

		assert!(matches!(
			remote.parse("make me rich").await,
			Err(EngineError::ParseFailure(_))
		));
	}
}
