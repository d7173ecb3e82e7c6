//! Lazy, single-flight loading of the engine's capability.

use futures::future::{BoxFuture, FutureExt, Shared};
use intent_capability::{CapabilityError, CapabilityLoader, IntentCapability};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{error, info};

type LoadResult = Result<Arc<dyn IntentCapability>, CapabilityError>;
type LoadFuture = Shared<BoxFuture<'static, LoadResult>>;

enum InitState {
	Uninitialized,
	/// A load is in flight. Every caller awaits the same future.
	Loading {
		generation: u64,
		load: LoadFuture,
	},
	Ready(Arc<dyn IntentCapability>),
}

/// Owns the capability handle and the transition from uninitialized to ready.
///
/// A failed load returns the manager to uninitialized, so the next caller
/// starts a fresh attempt.
pub struct Lifecycle {
	loader: Arc<dyn CapabilityLoader>,
	load_timeout: Option<Duration>,
	state: Mutex<InitState>,
	ready: AtomicBool,
	generations: AtomicU64,
}

impl Lifecycle {
	pub fn new(loader: Arc<dyn CapabilityLoader>, load_timeout: Option<Duration>) -> Self {
		Self {
			loader,
			load_timeout,
			state: Mutex::new(InitState::Uninitialized),
			ready: AtomicBool::new(false),
			generations: AtomicU64::new(0),
		}
	}

	/// True once a working handle has been obtained. Never blocks.
	pub fn is_ready(&self) -> bool {
		self.ready.load(Ordering::Acquire)
	}

	/// Name of the underlying loader.
	pub fn capability_name(&self) -> &str {
		self.loader.name()
	}

	/// Returns the capability handle, loading it first if needed.
	pub async fn capability(&self) -> LoadResult {
		let (generation, load) = {
			let mut state = self.state.lock().await;
			match &*state {
				InitState::Ready(capability) => return Ok(capability.clone()),
				InitState::Loading { generation, load } => (*generation, load.clone()),
				InitState::Uninitialized => {
					let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
					let load = self.start_load(generation);
					*state = InitState::Loading {
						generation,
						load: load.clone(),
					};
					(generation, load)
				}
			}
		};

		let result = load.await;

		// Only the first waiter to get here for this generation moves the state on
		let mut state = self.state.lock().await;
		if matches!(&*state, InitState::Loading { generation: g, .. } if *g == generation) {
			match &result {
				Ok(capability) => {
					*state = InitState::Ready(capability.clone());
					self.ready.store(true, Ordering::Release);
				}
				Err(_) => *state = InitState::Uninitialized,
			}
		}

		result
	}

	fn start_load(&self, generation: u64) -> LoadFuture {
		let loader = self.loader.clone();
		let load_timeout = self.load_timeout;

		async move {
			let name = loader.name().to_string();
			info!(capability = %name, generation, "Loading intent capability");
			let started = Instant::now();

			let result = match load_timeout {
				Some(limit) => tokio::time::timeout(limit, loader.load())
					.await
					.unwrap_or_else(|_| Err(CapabilityError::Timeout(limit.as_millis() as u64))),
				None => loader.load().await,
			};

			match &result {
				Ok(_) => info!(
					capability = %name,
					elapsed_ms = started.elapsed().as_millis() as u64,
					"Intent capability ready"
				),
				Err(e) => error!(capability = %name, error = %e, "Intent capability failed to load"),
			}
			result
		}
		.boxed()
		.shared()
	}
}
