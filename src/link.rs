use std::fmt::Debug;
use std::fmt::Display;
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use parking_lot::Mutex;

use crate::actor::Actor;
use crate::delay::DelayedPump;
use crate::envelope::Message;
use crate::envelope::Payload;
use crate::error::SimError;
use crate::weak::WeakLink;

static NEXT_LINK_ID: AtomicU64 = AtomicU64::new(1);

/// Held across the checks and both halves of an entanglement.
static ENTANGLEMENT: Mutex<()> = Mutex::new(());

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkId(u64);

impl LinkId {
	fn next() -> Self {
		Self(NEXT_LINK_ID.fetch_add(1, Ordering::Relaxed))
	}

	pub fn get(self) -> u64 {
		self.0
	}
}

impl Display for LinkId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "Link {}", self.0)
	}
}

pub(crate) enum Transport {
	Instant,
	Delayed(DelayedPump),
}

pub(crate) struct LinkState {
	id: LinkId,
	source: Actor,
	destination: Actor,
	reverse: OnceLock<WeakLink>,
	transport: Transport,
}

pub struct Link {
	pub(crate) state: Arc<LinkState>,
}

impl Debug for Link {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Link")
			.field("id", &self.state.id)
			.field("source", &self.state.source.id())
			.field("destination", &self.state.destination.id())
			.field("delay", &self.delay())
			.finish()
	}
}

impl Display for Link {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(
			f,
			"{} ({} -> {})",
			self.state.id,
			self.state.source.id(),
			self.state.destination.id()
		)
	}
}

impl Clone for Link {
	fn clone(&self) -> Self {
		let state = self.state.clone();
		Self { state }
	}
}

impl PartialEq for Link {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.state, &other.state)
	}
}

impl Eq for Link {}

impl Link {
	/// Creates a link, spawning a delivery pump when `delay` is non-zero.
	pub(crate) fn new(source: &Actor, destination: &Actor, delay: Duration) -> Result<Self, SimError> {
		let id = LinkId::next();
		let transport = if delay.is_zero() {
			Transport::Instant
		} else {
			Transport::Delayed(DelayedPump::spawn(id, destination.clone(), delay)?)
		};

		let state = Arc::new(LinkState {
			id,
			source: source.clone(),
			destination: destination.clone(),
			reverse: OnceLock::new(),
			transport,
		});
		Ok(Self { state })
	}

	pub fn id(&self) -> LinkId {
		self.state.id
	}

	pub fn source(&self) -> &Actor {
		&self.state.source
	}

	pub fn destination(&self) -> &Actor {
		&self.state.destination
	}

	pub fn delay(&self) -> Duration {
		match &self.state.transport {
			Transport::Instant => Duration::ZERO,
			Transport::Delayed(pump) => pump.delay(),
		}
	}

	pub fn is_delayed(&self) -> bool {
		matches!(self.state.transport, Transport::Delayed(_))
	}

	/// True when no message is waiting on this link for delivery.
	pub fn is_idle(&self) -> bool {
		match &self.state.transport {
			Transport::Instant => true,
			Transport::Delayed(pump) => pump.is_idle(),
		}
	}

	pub fn pending(&self) -> usize {
		match &self.state.transport {
			Transport::Instant => 0,
			Transport::Delayed(pump) => pump.pending(),
		}
	}

	/// The link running the opposite way, once entangled.
	pub fn reverse(&self) -> Option<Link> {
		self.state.reverse.get().and_then(WeakLink::upgrade)
	}

	pub fn is_entangled(&self) -> bool {
		self.state.reverse.get().is_some()
	}

	pub fn send<P: Payload>(&self, payload: P) -> Result<(), SimError> {
		self.send_shared(Some(Arc::new(payload)))
	}

	pub fn send_empty(&self) -> Result<(), SimError> {
		self.send_shared(None)
	}

	/// Sends an already shared payload, e.g. when forwarding a received one.
	pub fn send_shared(&self, content: Option<Arc<dyn Payload>>) -> Result<(), SimError> {
		let source = &self.state.source;
		let message = Message::new(source.clone(), self.reverse(), content);
		let on_accept = || source.record_sent();

		let result = match &self.state.transport {
			Transport::Instant => self.state.destination.inbox().add_counted(message, on_accept),
			Transport::Delayed(pump) => pump.push(message, on_accept),
		};

		match &result {
			Ok(()) => tracing::trace!(link = %self.state.id, "Message sent"),
			Err(err) => tracing::debug!(link = %self.state.id, %err, "Message rejected"),
		}
		result
	}

	/// Pairs two opposite links so each reports the other as its reverse.
	///
	/// Either both links end up paired with each other or neither changes.
	pub fn entangle(&self, other: &Link) -> Result<(), SimError> {
		let _serial = ENTANGLEMENT.lock();
		if self == other {
			return Err(SimError::EntangleSelf(self.id()));
		}
		if self.source().id() != other.destination().id()
			|| self.destination().id() != other.source().id()
		{
			return Err(SimError::NotOpposite(self.id(), other.id()));
		}
		if self.is_entangled() {
			return Err(SimError::AlreadyEntangled(self.id()));
		}
		if other.is_entangled() {
			return Err(SimError::AlreadyEntangled(other.id()));
		}

		self.state
			.reverse
			.set(other.downgrade())
			.map_err(|_| SimError::AlreadyEntangled(self.id()))?;
		other
			.state
			.reverse
			.set(self.downgrade())
			.map_err(|_| SimError::AlreadyEntangled(other.id()))?;

		tracing::debug!(forward = %self.id(), backward = %other.id(), "Links entangled");
		Ok(())
	}

	/// Stops any delivery thread. Pending delayed messages are dropped.
	pub fn shutdown(&self) {
		match &self.state.transport {
			Transport::Instant => {}
			Transport::Delayed(pump) => pump.shutdown(),
		}
	}
}
