use std::collections::VecDeque;

use parking_lot::Condvar;
use parking_lot::Mutex;
use parking_lot::MutexGuard;

use crate::error::Quit;
use crate::error::SimError;

/// Multi-producer, single-consumer inbox.
///
/// Producers may call [`Inbox::add`] from any thread. Only the owning actor's
/// thread takes items out. Once [`Inbox::quit`] has been called the inbox is
/// poisoned: it stays empty, rejects new items and never blocks again.
pub struct Inbox<T> {
	state: Mutex<InboxState<T>>,
	ready: Condvar,
}

struct InboxState<T> {
	items: VecDeque<T>,
	waiting: bool,
	quit: bool,
	dispatched: u64,
}

impl<T> InboxState<T> {
	fn pop(&mut self) -> Option<T> {
		let item = self.items.pop_front()?;
		self.dispatched += 1;
		Some(item)
	}
}

/// Consistent view of an inbox, taken under its lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboxView {
	pub empty: bool,
	pub waiting: bool,
	pub quit: bool,
	pub dispatched: u64,
}

impl<T> Default for Inbox<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> Inbox<T> {
	pub fn new() -> Self {
		Self {
			state: Mutex::new(InboxState {
				items: VecDeque::new(),
				waiting: false,
				quit: false,
				dispatched: 0,
			}),
			ready: Condvar::new(),
		}
	}

	pub fn add(&self, item: T) -> Result<(), SimError> {
		self.add_counted(item, || {})
	}

	/// Enqueues `item` and runs `on_accept` before the consumer can see it.
	///
	/// `on_accept` runs with the inbox lock held, so it must not touch this inbox.
	pub fn add_counted(&self, item: T, on_accept: impl FnOnce()) -> Result<(), SimError> {
		let mut state = self.state.lock();
		if state.quit {
			return Err(SimError::InboxClosed);
		}
		state.items.push_back(item);
		on_accept();
		drop(state);
		self.ready.notify_one();
		Ok(())
	}

	pub fn try_take(&self) -> Option<T> {
		self.state.lock().pop()
	}

	/// Blocking dequeue.
	///
	/// `on_idle` runs once, right before the calling thread parks on an empty
	/// inbox, with the inbox lock held.
	pub fn take(&self, on_idle: impl FnOnce()) -> Result<T, Quit> {
		let mut state = self.state.lock();
		if state.quit {
			return Err(Quit);
		}
		if let Some(item) = state.pop() {
			return Ok(item);
		}

		state.waiting = true;
		on_idle();
		let result = self.park(&mut state);
		state.waiting = false;
		result?;

		state.pop().ok_or(Quit)
	}

	/// Blocks until an item is available without taking it.
	///
	/// Returns `false` once the inbox has quit.
	pub fn wait_ready(&self) -> bool {
		let mut state = self.state.lock();
		self.park(&mut state).is_ok()
	}

	fn park(&self, state: &mut MutexGuard<'_, InboxState<T>>) -> Result<(), Quit> {
		loop {
			if state.quit {
				return Err(Quit);
			}
			if !state.items.is_empty() {
				return Ok(());
			}
			self.ready.wait(state);
			if state.items.is_empty() && !state.quit {
				tracing::trace!("Inbox woke up without data");
			}
		}
	}

	/// Drains the inbox and wakes the consumer for good. Idempotent.
	pub fn quit(&self) {
		let drained = {
			let mut state = self.state.lock();
			state.quit = true;
			std::mem::take(&mut state.items)
		};
		self.ready.notify_all();
		drop(drained);
	}

	pub fn is_empty(&self) -> bool {
		let state = self.state.lock();
		state.quit || state.items.is_empty()
	}

	pub fn is_quit(&self) -> bool {
		self.state.lock().quit
	}

	pub fn is_waiting(&self) -> bool {
		self.state.lock().waiting
	}

	/// True while the consumer is running or about to run.
	pub fn is_not_empty_or_not_waiting(&self) -> bool {
		let view = self.view();
		!view.waiting || !view.empty
	}

	pub fn dispatched(&self) -> u64 {
		self.state.lock().dispatched
	}

	pub fn len(&self) -> usize {
		self.state.lock().items.len()
	}

	pub fn view(&self) -> InboxView {
		self.view_with(|view| view)
	}

	/// Runs `read` on a view of the inbox while producers and the consumer are held off.
	pub fn view_with<R>(&self, read: impl FnOnce(InboxView) -> R) -> R {
		let state = self.state.lock();
		read(InboxView {
			empty: state.quit || state.items.is_empty(),
			waiting: state.waiting,
			quit: state.quit,
			dispatched: state.dispatched,
		})
	}
}
