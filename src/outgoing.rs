use std::cell::RefCell;
use std::ops::RangeInclusive;
use std::time::Duration;

use parking_lot::ReentrantMutex;
use parking_lot::ReentrantMutexGuard;
use rand::Rng;

use crate::actor::Actor;
use crate::error::SimError;
use crate::link::Link;

/// Outgoing links of one actor.
///
/// Every operation acquires the lock with a timeout drawn at random from the
/// configured window. Running out of time is reported as
/// [`SimError::DeadlockAssumed`] and is never retried here. The lock is
/// reentrant: a callback passed to [`OutgoingLinks::visit_all`] may use the
/// same set again, including adding links to it.
pub struct OutgoingLinks {
	links: ReentrantMutex<RefCell<Vec<Link>>>,
	timeout: RangeInclusive<Duration>,
}

pub type OutgoingGuard<'a> = ReentrantMutexGuard<'a, RefCell<Vec<Link>>>;

impl OutgoingLinks {
	pub fn new(timeout: RangeInclusive<Duration>) -> Self {
		Self {
			links: ReentrantMutex::new(RefCell::new(Vec::new())),
			timeout,
		}
	}

	fn draw_timeout(&self) -> Duration {
		let min = saturating_millis(*self.timeout.start());
		let max = saturating_millis(*self.timeout.end()).max(min);
		Duration::from_millis(rand::rng().random_range(min..=max))
	}

	/// Holds the set for the calling thread.
	///
	/// Borrows of the inner cell must not outlive a call back into this set.
	pub fn lock(&self) -> Result<OutgoingGuard<'_>, SimError> {
		let waited = self.draw_timeout();
		match self.links.try_lock_for(waited) {
			Some(guard) => Ok(guard),
			None => {
				metrics::counter!("actorsim_deadlocks_total").increment(1);
				tracing::error!(?waited, "Outgoing link lock timed out, deadlock assumed");
				Err(SimError::DeadlockAssumed { waited })
			}
		}
	}

	pub fn add(&self, link: Link) -> Result<(), SimError> {
		self.lock()?.borrow_mut().push(link);
		Ok(())
	}

	/// Runs `visitor` on every link while the set stays locked.
	///
	/// Links added by the visitor itself are not visited.
	pub fn visit_all(&self, mut visitor: impl FnMut(&Link)) -> Result<(), SimError> {
		let guard = self.lock()?;
		let links = guard.borrow().clone();
		links.iter().for_each(|link| visitor(link));
		Ok(())
	}

	pub fn find_connection_to(&self, remote: &Actor) -> Result<Option<Link>, SimError> {
		let guard = self.lock()?;
		let found = Self::find_in(&guard.borrow(), remote);
		Ok(found)
	}

	pub fn get_any(&self) -> Result<Option<Link>, SimError> {
		let guard = self.lock()?;
		let first = guard.borrow().first().cloned();
		Ok(first)
	}

	/// Returns the link to `remote`, creating it with `make` if there is none.
	///
	/// The flag is `true` when the link was created by this call.
	pub fn find_or_insert_with(
		&self,
		remote: &Actor,
		make: impl FnOnce() -> Result<Link, SimError>,
	) -> Result<(Link, bool), SimError> {
		let guard = self.lock()?;
		let existing = Self::find_in(&guard.borrow(), remote);
		if let Some(existing) = existing {
			return Ok((existing, false));
		}
		let link = make()?;
		guard.borrow_mut().push(link.clone());
		Ok((link, true))
	}

	pub fn clear(&self) -> Result<Vec<Link>, SimError> {
		let guard = self.lock()?;
		let links = std::mem::take(&mut *guard.borrow_mut());
		Ok(links)
	}

	pub fn len(&self) -> Result<usize, SimError> {
		let guard = self.lock()?;
		let len = guard.borrow().len();
		Ok(len)
	}

	pub fn is_empty(&self) -> Result<bool, SimError> {
		Ok(self.len()? == 0)
	}

	fn find_in(links: &[Link], remote: &Actor) -> Option<Link> {
		links
			.iter()
			.find(|link| link.destination().id() == remote.id())
			.cloned()
	}
}

fn saturating_millis(duration: Duration) -> u64 {
	u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
	use std::thread;
	use std::time::Instant;

	use super::*;

	#[test]
	fn held_lock_raises_deadlock_within_window() {
		let window = Duration::from_millis(50)..=Duration::from_millis(80);
		let links = OutgoingLinks::new(window);
		let guard = links.lock().unwrap();

		let (result, elapsed) = thread::scope(|scope| {
			scope
				.spawn(|| {
					let started = Instant::now();
					let result = links.get_any();
					(result, started.elapsed())
				})
				.join()
				.unwrap()
		});
		drop(guard);

		match result {
			Err(SimError::DeadlockAssumed { waited }) => {
				assert!(waited >= Duration::from_millis(50));
				assert!(waited <= Duration::from_millis(80));
			}
			other => panic!("expected deadlock error, got {other:?}"),
		}
		assert!(elapsed >= Duration::from_millis(50));
		assert!(elapsed < Duration::from_millis(80) + Duration::from_millis(250));

		assert_eq!(links.get_any().unwrap().map(|l| l.id()), None);
	}

	#[test]
	fn owning_thread_can_lock_again() {
		let links = OutgoingLinks::new(Duration::from_millis(20)..=Duration::from_millis(40));
		let _guard = links.lock().unwrap();
		let _again = links.lock().unwrap();
		assert_eq!(links.len().unwrap(), 0);
		assert!(links.clear().unwrap().is_empty());
	}

	#[test]
	fn timeout_draw_saturates_huge_bounds() {
		let links = OutgoingLinks::new(Duration::MAX..=Duration::MAX);
		assert_eq!(links.draw_timeout(), Duration::from_millis(u64::MAX));
	}

	#[test]
	fn degenerate_window_uses_the_lower_bound() {
		let links = OutgoingLinks::new(Duration::from_millis(5)..=Duration::from_millis(5));
		assert_eq!(links.draw_timeout(), Duration::from_millis(5));
		assert!(links.is_empty().unwrap());
	}
}
