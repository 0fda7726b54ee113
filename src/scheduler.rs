//! Periodic trigger for `synchronize_all_domains`, with idempotent start/stop and run history.

// std
use std::{
	future::Future,
	pin::Pin,
	sync::atomic::{AtomicBool, AtomicU64, Ordering},
};
// crates.io
use tokio::{sync::Notify, task::JoinHandle};
// self
use crate::{
	_prelude::*,
	obs::{FlowKind, FlowOutcome, FlowSpan, record_flow_outcome},
};

/// The scheduled function's signature: a fallible, cloneable async thunk.
pub type ScheduledFn = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + Sync>;

/// One completed tick of the scheduler's worker loop.
#[derive(Clone, Debug)]
pub struct RunnerRecord {
	/// Monotonically increasing id, starting at 1.
	pub runner_id: u64,
	/// Instant this tick finished (ISO-8601).
	pub executed_at: OffsetDateTime,
	/// Identifier of the worker thread that ran this tick, when known.
	pub thread: Option<String>,
}

struct SchedulerState {
	handle: Option<JoinHandle<()>>,
	stop_requested: Arc<AtomicBool>,
	wake: Arc<Notify>,
}

/// Owns one background worker that calls a scheduled function on a fixed delay.
///
/// `delay` is the minimum gap between the end of one invocation and the start of the next,
/// not a strict period. Exceptions raised by the scheduled function are caught and logged;
/// they never stop the scheduler. `stop()` lets an in-flight invocation complete naturally
/// before the worker exits (join, not kill).
pub struct Scheduler {
	function: ScheduledFn,
	delay: Duration,
	state: Mutex<SchedulerState>,
	history: Mutex<Vec<RunnerRecord>>,
	next_runner_id: AtomicU64,
}
impl Scheduler {
	/// Builds a scheduler that calls `function` every `delay`, once started.
	pub fn new(function: ScheduledFn, delay: Duration) -> Self {
		Self {
			function,
			delay,
			state: Mutex::new(SchedulerState {
				handle: None,
				stop_requested: Arc::new(AtomicBool::new(false)),
				wake: Arc::new(Notify::new()),
			}),
			history: Mutex::new(Vec::new()),
			next_runner_id: AtomicU64::new(1),
		}
	}

	/// Starts the worker. A no-op if it is already running.
	pub fn start(self: &Arc<Self>) {
		let mut state = self.state.lock();

		if state.handle.is_some() {
			return;
		}

		let stop_requested = Arc::new(AtomicBool::new(false));
		let wake = Arc::new(Notify::new());

		state.stop_requested = Arc::clone(&stop_requested);
		state.wake = Arc::clone(&wake);

		let this = Arc::clone(self);

		state.handle = Some(tokio::spawn(async move { this.run_loop(stop_requested, wake).await }));
	}

	/// Signals the worker to stop and waits for its current invocation to finish.
	pub async fn stop(self: &Arc<Self>) {
		let handle = {
			let mut state = self.state.lock();

			state.stop_requested.store(true, Ordering::SeqCst);
			state.wake.notify_waiters();
			state.handle.take()
		};

		if let Some(handle) = handle {
			let _ = handle.await;
		}
	}

	/// Returns the append-only run history, oldest first.
	pub fn runners_history(&self) -> Vec<RunnerRecord> {
		self.history.lock().clone()
	}

	async fn run_loop(self: Arc<Self>, stop_requested: Arc<AtomicBool>, wake: Arc<Notify>) {
		while !stop_requested.load(Ordering::SeqCst) {
			self.tick().await;

			if stop_requested.load(Ordering::SeqCst) {
				return;
			}

			tokio::select! {
				biased;
				() = wake.notified() => {},
				_ = tokio::time::sleep(std::time::Duration::from_secs_f64(self.delay.as_seconds_f64())) => {},
			}

			self.record_tick();
		}
	}

	async fn tick(&self) {
		let span = FlowSpan::new(FlowKind::Scheduler, "tick");

		record_flow_outcome(FlowKind::Scheduler, FlowOutcome::Attempt);

		let outcome = span.instrument((self.function)()).await;

		match outcome {
			Ok(()) => record_flow_outcome(FlowKind::Scheduler, FlowOutcome::Success),
			Err(_) => record_flow_outcome(FlowKind::Scheduler, FlowOutcome::Failure),
		}
	}

	fn record_tick(&self) {
		let runner_id = self.next_runner_id.fetch_add(1, Ordering::SeqCst);
		let record = RunnerRecord {
			runner_id,
			executed_at: OffsetDateTime::now_utc(),
			thread: Some(format!("{:?}", std::thread::current().id())),
		};

		self.history.lock().push(record);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn start_is_idempotent_and_stop_joins_cleanly() {
		let calls = Arc::new(AtomicU64::new(0));
		let counted = Arc::clone(&calls);
		let function: ScheduledFn = Arc::new(move || {
			let counted = Arc::clone(&counted);

			Box::pin(async move {
				counted.fetch_add(1, Ordering::SeqCst);

				Ok(())
			})
		});
		let scheduler = Arc::new(Scheduler::new(function, Duration::milliseconds(10)));

		scheduler.start();
		scheduler.start();
		tokio::time::sleep(std::time::Duration::from_millis(50)).await;
		scheduler.stop().await;

		assert!(calls.load(Ordering::SeqCst) >= 1);
	}

	#[tokio::test]
	async fn scheduled_function_errors_are_swallowed() {
		let function: ScheduledFn = Arc::new(|| Box::pin(async { Err(crate::error::Error::DuplicateReferral) }));
		let scheduler = Arc::new(Scheduler::new(function, Duration::milliseconds(10)));

		scheduler.start();
		tokio::time::sleep(std::time::Duration::from_millis(30)).await;
		scheduler.stop().await;
	}
}
