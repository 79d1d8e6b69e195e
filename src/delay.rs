use std::cmp::Ordering;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use parking_lot::Condvar;
use parking_lot::Mutex;
use parking_lot::MutexGuard;

use crate::actor::Actor;
use crate::drop::DropHandle;
use crate::envelope::Message;
use crate::error::SimError;
use crate::link::LinkId;

/// Stand-in deadline for delays that overflow `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

struct Pending {
	deliver_at: Instant,
	seq: u64,
	message: Message,
}

impl PartialEq for Pending {
	fn eq(&self, other: &Self) -> bool {
		self.cmp(other) == Ordering::Equal
	}
}

impl Eq for Pending {}

impl PartialOrd for Pending {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for Pending {
	fn cmp(&self, other: &Self) -> Ordering {
		self.deliver_at
			.cmp(&other.deliver_at)
			.then(self.seq.cmp(&other.seq))
	}
}

#[derive(Default)]
struct PumpState {
	queue: BinaryHeap<Reverse<Pending>>,
	next_seq: u64,
	in_transit: bool,
	closed: bool,
}

impl PumpState {
	fn next_deadline(&self) -> Option<Instant> {
		self.queue.peek().map(|Reverse(pending)| pending.deliver_at)
	}
}

#[derive(Default)]
struct PumpShared {
	state: Mutex<PumpState>,
	wake: Condvar,
}

/// Time-ordered delivery queue of a delayed link, drained by its own thread.
pub(crate) struct DelayedPump {
	link: LinkId,
	delay: Duration,
	shared: Arc<PumpShared>,
	thread: Mutex<Option<DropHandle>>,
}

impl DelayedPump {
	pub(crate) fn spawn(link: LinkId, destination: Actor, delay: Duration) -> Result<Self, SimError> {
		let shared = Arc::new(PumpShared::default());
		let handle = DropHandle::spawn(format!("link-{}", link.get()), {
			let shared = shared.clone();
			move || Self::run(link, &shared, &destination)
		})
		.map_err(|e| SimError::Spawn(e.to_string()))?;

		Ok(Self {
			link,
			delay,
			shared,
			thread: Mutex::new(Some(handle)),
		})
	}

	pub(crate) fn delay(&self) -> Duration {
		self.delay
	}

	/// Schedules `message` for delivery after the link delay.
	///
	/// `on_accept` runs under the queue lock once the message is scheduled.
	pub(crate) fn push(&self, message: Message, on_accept: impl FnOnce()) -> Result<(), SimError> {
		let mut state = self.shared.state.lock();
		if state.closed {
			return Err(SimError::LinkClosed(self.link));
		}
		let now = Instant::now();
		let deliver_at = now.checked_add(self.delay).unwrap_or(now + FAR_FUTURE);
		let seq = state.next_seq;
		state.next_seq += 1;
		state.queue.push(Reverse(Pending {
			deliver_at,
			seq,
			message,
		}));
		on_accept();
		drop(state);
		self.shared.wake.notify_one();
		Ok(())
	}

	pub(crate) fn is_idle(&self) -> bool {
		let state = self.shared.state.lock();
		state.queue.is_empty() && !state.in_transit
	}

	pub(crate) fn pending(&self) -> usize {
		self.shared.state.lock().queue.len()
	}

	pub(crate) fn shutdown(&self) {
		let dropped = {
			let mut state = self.shared.state.lock();
			state.closed = true;
			std::mem::take(&mut state.queue)
		};
		if !dropped.is_empty() {
			tracing::debug!(link = %self.link, count = dropped.len(), "Dropping undelivered messages");
		}
		self.shared.wake.notify_all();

		let handle = self.thread.lock().take();
		if let Some(mut handle) = handle {
			handle.join();
		}
	}

	fn run(link: LinkId, shared: &PumpShared, destination: &Actor) {
		tracing::trace!(link = %link, "Delivery pump started");
		let mut state = shared.state.lock();
		while !state.closed {
			match state.next_deadline() {
				None => shared.wake.wait(&mut state),
				Some(deadline) if deadline > Instant::now() => {
					shared.wake.wait_until(&mut state, deadline);
				}
				Some(_) => Self::deliver_next(link, &mut state, destination),
			}
		}
		tracing::trace!(link = %link, "Delivery pump stopped");
	}

	fn deliver_next(link: LinkId, state: &mut MutexGuard<'_, PumpState>, destination: &Actor) {
		let Some(Reverse(pending)) = state.queue.pop() else {
			return;
		};

		state.in_transit = true;
		MutexGuard::unlocked(state, || {
			if let Err(err) = destination.inbox().add(pending.message) {
				tracing::debug!(link = %link, destination = %destination.id(), %err, "Delivery dropped");
			}
		});
		state.in_transit = false;
	}
}

impl Drop for DelayedPump {
	fn drop(&mut self) {
		self.shutdown()
	}
}
