use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use parking_lot::Condvar;
use parking_lot::Mutex;

use crate::drop::DropHandle;
use crate::error::SimError;

/// Aggregated counters of all actors of a network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkStatus {
	pub sent: u64,
	pub received: u64,
	pub active: usize,
}

impl NetworkStatus {
	/// No actor is running and every sent message has been taken out of an inbox.
	pub fn is_quiescent(&self) -> bool {
		self.sent == self.received && self.active == 0
	}
}

#[derive(Default)]
struct DetectorState {
	pending: bool,
	enabled: bool,
	stopped: bool,
	terminated: bool,
}

/// Watches a network for quiescence on a dedicated thread.
///
/// Quiescence is only declared when two consecutive snapshots are both quiet
/// and identical. A single quiet snapshot is not enough: it is assembled actor
/// by actor, and a message can be sent and consumed by actors on either side
/// of the read cursor, balancing the totals for a moment.
#[derive(Default)]
pub struct TerminationDetector {
	state: Mutex<DetectorState>,
	wake: Condvar,
	finished: Condvar,
	thread: Mutex<Option<DropHandle>>,
}

impl TerminationDetector {
	pub(crate) fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Spawns the detector thread. `sample` returns `None` once the network is gone.
	pub(crate) fn start<P>(self: &Arc<Self>, name: String, sample: P) -> Result<(), SimError>
	where
		P: Fn() -> Option<NetworkStatus> + Send + 'static,
	{
		let mut thread = self.thread.lock();
		if thread.is_some() {
			return Err(SimError::AlreadyStarted);
		}

		let detector = self.clone();
		let handle = DropHandle::spawn(name, move || detector.run(sample))
			.map_err(|e| SimError::Spawn(e.to_string()))?;
		*thread = Some(handle);
		Ok(())
	}

	/// Lets triggers through. Also schedules a first evaluation.
	pub(crate) fn enable(&self) {
		let mut state = self.state.lock();
		state.enabled = true;
		state.pending = true;
		self.wake.notify_one();
	}

	/// Requests a re-evaluation. Ignored until the detector is enabled.
	pub fn trigger_recheck(&self) {
		let mut state = self.state.lock();
		if state.enabled {
			state.pending = true;
			self.wake.notify_one();
		}
	}

	pub fn has_terminated(&self) -> bool {
		self.state.lock().terminated
	}

	/// Blocks until termination is declared or the detector is stopped.
	pub fn await_termination(&self) -> Result<(), SimError> {
		let mut state = self.state.lock();
		while !state.terminated && !state.stopped {
			self.finished.wait(&mut state);
		}
		if state.terminated {
			Ok(())
		} else {
			Err(SimError::ShutDown)
		}
	}

	/// Like [`TerminationDetector::await_termination`] but gives up after `timeout`.
	pub fn await_termination_timeout(&self, timeout: Duration) -> bool {
		let deadline = Instant::now() + timeout;
		let mut state = self.state.lock();
		while !state.terminated && !state.stopped {
			if self.finished.wait_until(&mut state, deadline).timed_out() {
				break;
			}
		}
		state.terminated
	}

	/// Stops and joins the detector thread, releasing every waiter.
	pub(crate) fn stop(&self) {
		{
			let mut state = self.state.lock();
			state.stopped = true;
			self.wake.notify_all();
			self.finished.notify_all();
		}

		let handle = self.thread.lock().take();
		if let Some(mut handle) = handle {
			handle.join();
		}
	}

	fn run<P>(&self, sample: P)
	where
		P: Fn() -> Option<NetworkStatus>,
	{
		tracing::debug!("Termination detector started");
		loop {
			{
				let mut state = self.state.lock();
				while !state.pending && !state.stopped {
					self.wake.wait(&mut state);
				}
				if state.stopped {
					break;
				}
				state.pending = false;
			}

			let Some(first) = sample() else { break };
			if !first.is_quiescent() {
				tracing::trace!(?first, "Network active");
				continue;
			}

			let Some(second) = sample() else { break };
			if second != first {
				tracing::debug!(?first, ?second, "Quiescence not stable, re-evaluating");
				self.state.lock().pending = true;
				continue;
			}

			let mut state = self.state.lock();
			if state.stopped {
				break;
			}
			state.terminated = true;
			self.finished.notify_all();
			drop(state);

			metrics::counter!("actorsim_terminations_total").increment(1);
			tracing::info!(
				sent = second.sent,
				received = second.received,
				"Termination detected"
			);
			break;
		}
		tracing::debug!("Termination detector stopped");
	}
}
