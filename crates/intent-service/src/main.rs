use anyhow::{Context, Result};
use clap::Parser;
use intent_config::{ConfigLoader, IntentConfig, LoggingSettings};
use intent_engine::IntentEngine;
use intent_service::{
	api::{self, AppState},
	cli::{Cli, Command},
	service,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	let mut loader = ConfigLoader::new();
	if let Some(path) = &cli.config {
		loader = loader.with_file(path);
	}
	let mut config = loader.load().await.context("Failed to load configuration")?;
	if let Some(level) = &cli.log_level {
		config.logging.level = level.clone();
	}

	setup_tracing(&config.logging)?;

	match cli.command {
		Command::Parse { text } => {
			let engine = service::build_engine(&config)?;
			let intent = engine.parse(&text.join(" ")).await?;
			print_json(&intent)
		}
		Command::Validate { text } => {
			let engine = service::build_engine(&config)?;
			let intent = engine.parse(&text.join(" ")).await?;
			print_json(&engine.validate(&intent).await)
		}
		Command::Estimate { text } => {
			let engine = service::build_engine(&config)?;
			let intent = engine.parse(&text.join(" ")).await?;
			let (estimate, source) = engine.estimate_cost_detailed(&intent).await;
			print_json(&serde_json::json!({
				"estimate": estimate,
				"source": source.to_string(),
			}))
		}
		Command::Plan { text } => {
			let engine = service::build_engine(&config)?;
			let plan = service::plan(&engine, &text.join(" ")).await?;
			print_json(&plan)
		}
		Command::Serve { port } => {
			if let Some(port) = port {
				config.api.port = port;
			}
			serve(config).await
		}
		Command::CheckConfig => check_config(&config),
	}
}

async fn serve(config: IntentConfig) -> Result<()> {
	info!("Starting intent engine '{}'", config.engine.name);

	let engine = Arc::new(service::build_engine(&config)?);
	warm_up(engine.clone());

	let state = AppState {
		engine,
		engine_name: config.engine.name.clone(),
	};
	api::serve(state, &config.api.bind_address(), shutdown_signal())
		.await
		.context("API server failed")?;

	info!("Intent engine stopped");
	Ok(())
}

/// Loads the capability in the background so the first request is fast.
/// A failure here is retried by the first request.
fn warm_up(engine: Arc<IntentEngine>) {
	tokio::spawn(async move {
		if let Err(e) = engine.ensure_ready().await {
			warn!("Capability warm-up failed, will retry on first request: {}", e);
		}
	});
}

fn check_config(config: &IntentConfig) -> Result<()> {
	info!("Configuration is valid");
	println!("engine:      {}", config.engine.name);
	println!("capability:  {}", config.capability.kind);
	match config.engine.call_timeout_ms {
		Some(ms) => println!("timeout:     {} ms", ms),
		None => println!("timeout:     none"),
	}
	println!("api:         {}", config.api.bind_address());
	println!("log level:   {}", config.logging.level);
	Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
	let out = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
	println!("{}", out);
	Ok(())
}

/// Logs go to stderr so command output on stdout stays machine-readable.
fn setup_tracing(logging: &LoggingSettings) -> Result<()> {
	let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
		Ok(filter) => filter,
		Err(_) => tracing_subscriber::EnvFilter::try_new(&logging.level)
			.with_context(|| format!("Invalid log level: {}", logging.level))?,
	};

	let registry = tracing_subscriber::registry().with(env_filter);
	if logging.json {
		registry
			.with(
				tracing_subscriber::fmt::layer()
					.json()
					.with_writer(std::io::stderr),
			)
			.init();
	} else {
		registry
			.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
			.init();
	}

	Ok(())
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = signal::ctrl_c().await {
			error!("Failed to listen for Ctrl+C: {}", e);
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut stream) => {
				stream.recv().await;
			}
			Err(e) => {
				error!("Failed to install SIGTERM handler: {}", e);
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}

	info!("Shutdown signal received");
}
