use std::any::Any;
use std::fmt::Debug;
use std::fmt::Display;
use std::panic;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::Weak;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use parking_lot::Mutex;

use crate::channel::Inbox;
use crate::config::NetworkConfig;
use crate::drop::DropHandle;
use crate::envelope::Message;
use crate::error::IsQuit as _;
use crate::error::SimError;
use crate::handler::ActorLogic;
use crate::handler::Exec;
use crate::link::Link;
use crate::network::Network;
use crate::network::NetworkId;
use crate::network::NetworkInner;
use crate::outgoing::OutgoingLinks;
use crate::termination::TerminationDetector;

static NEXT_ACTOR_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide unique actor identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActorId(u64);

impl ActorId {
	fn next() -> Self {
		Self(NEXT_ACTOR_ID.fetch_add(1, Ordering::Relaxed))
	}

	pub fn get(self) -> u64 {
		self.0
	}
}

impl Display for ActorId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "Actor {}", self.0)
	}
}

/// What an actor's thread is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadStatus {
	/// Logic is waiting inside a blocking receive on an empty inbox.
	PassiveBlocked,
	/// Logic returned and the inbox is empty.
	PassiveReturned,
	/// Logic is not running but messages are queued, so it is about to.
	MessagesPending,
	/// Logic is running.
	Active,
}

impl ThreadStatus {
	/// Whether this actor keeps the network from being quiescent.
	pub fn is_active(self) -> bool {
		matches!(self, ThreadStatus::Active | ThreadStatus::MessagesPending)
	}
}

/// Status of one actor, read in a single critical section of its inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorStatus {
	pub thread: ThreadStatus,
	pub sent: u64,
	pub received: u64,
}

pub(crate) struct ActorState {
	id: ActorId,
	network_id: NetworkId,
	network: Weak<NetworkInner>,
	detector: Arc<TerminationDetector>,
	inbox: Inbox<Message>,
	outgoing: OutgoingLinks,
	started: AtomicBool,
	executing: AtomicBool,
	sent: AtomicU64,
	failures: AtomicU64,
	logic: Mutex<Option<Box<dyn ActorLogic>>>,
	thread: Mutex<Option<DropHandle>>,
}

/// Handle to an actor.
///
/// Cheap to clone. All clones refer to the same actor, which lives in exactly
/// one [`Network`] for its whole life.
#[derive(Clone)]
pub struct Actor {
	pub(crate) state: Arc<ActorState>,
}

impl Debug for Actor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Actor")
			.field("id", &self.state.id)
			.field("network", &self.state.network_id)
			.finish()
	}
}

impl Display for Actor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		Display::fmt(&self.state.id, f)
	}
}

impl PartialEq for Actor {
	fn eq(&self, other: &Self) -> bool {
		self.state.id == other.state.id
	}
}

impl Eq for Actor {}

impl Actor {
	pub(crate) fn new(
		network: &Arc<NetworkInner>,
		config: &NetworkConfig,
		logic: Box<dyn ActorLogic>,
	) -> Self {
		let state = Arc::new(ActorState {
			id: ActorId::next(),
			network_id: network.id(),
			network: Arc::downgrade(network),
			detector: network.detector().clone(),
			inbox: Inbox::new(),
			outgoing: OutgoingLinks::new(config.lock_timeout()),
			started: AtomicBool::new(false),
			executing: AtomicBool::new(false),
			sent: AtomicU64::new(0),
			failures: AtomicU64::new(0),
			logic: Mutex::new(Some(logic)),
			thread: Mutex::new(None),
		});
		Self { state }
	}

	pub fn id(&self) -> ActorId {
		self.state.id
	}

	pub fn network_id(&self) -> NetworkId {
		self.state.network_id
	}

	/// The owning network, unless it has already been dropped.
	pub fn network(&self) -> Option<Network> {
		self.state.network.upgrade().map(Network::from_inner)
	}

	pub fn outgoing(&self) -> &OutgoingLinks {
		&self.state.outgoing
	}

	pub(crate) fn inbox(&self) -> &Inbox<Message> {
		&self.state.inbox
	}

	pub fn visit_outgoing(&self, visitor: impl FnMut(&Link)) -> Result<(), SimError> {
		self.state.outgoing.visit_all(visitor)
	}

	pub fn find_connection_to(&self, remote: &Actor) -> Result<Option<Link>, SimError> {
		self.state.outgoing.find_connection_to(remote)
	}

	/// Connects to `remote` through the owning network.
	pub fn connect_to(&self, remote: &Actor) -> Result<Link, SimError> {
		self.network().ok_or(SimError::ShutDown)?.link(self, remote)
	}

	pub fn sent_messages(&self) -> u64 {
		self.state.sent.load(Ordering::SeqCst)
	}

	pub fn received_messages(&self) -> u64 {
		self.state.inbox.dispatched()
	}

	/// Number of iterations that ended in an error or a panic.
	pub fn failures(&self) -> u64 {
		self.state.failures.load(Ordering::SeqCst)
	}

	pub fn is_started(&self) -> bool {
		self.state.started.load(Ordering::SeqCst)
	}

	pub(crate) fn record_sent(&self) {
		self.state.sent.fetch_add(1, Ordering::SeqCst);
		metrics::counter!("actorsim_messages_sent_total").increment(1);
	}

	pub(crate) fn trigger_recheck(&self) {
		self.state.detector.trigger_recheck();
	}

	pub fn status(&self) -> ActorStatus {
		self.state.inbox.view_with(|view| {
			let executing = self.state.executing.load(Ordering::SeqCst);
			let thread = if view.waiting && view.empty {
				ThreadStatus::PassiveBlocked
			} else if executing {
				ThreadStatus::Active
			} else if !view.empty {
				ThreadStatus::MessagesPending
			} else {
				ThreadStatus::PassiveReturned
			};

			ActorStatus {
				thread,
				sent: self.state.sent.load(Ordering::SeqCst),
				received: view.dispatched,
			}
		})
	}

	/// Spawns the actor thread. Succeeds at most once per actor.
	pub(crate) fn start(&self) -> Result<(), SimError> {
		let Some(logic) = self.state.logic.lock().take() else {
			return Err(SimError::AlreadyStarted);
		};

		// Counted as running before the thread exists, so the detector never
		// sees a started actor idle ahead of its first iteration.
		self.state.executing.store(true, Ordering::SeqCst);

		let actor = self.clone();
		let handle = DropHandle::spawn(format!("actor-{}", self.id().get()), move || actor.run(logic))
			.map_err(|e| {
				self.state.executing.store(false, Ordering::SeqCst);
				SimError::Spawn(e.to_string())
			})?;

		*self.state.thread.lock() = Some(handle);
		self.state.started.store(true, Ordering::SeqCst);
		tracing::debug!(actor = %self.id(), "Actor started");
		Ok(())
	}

	fn run(self, mut logic: Box<dyn ActorLogic>) {
		let span = tracing::info_span!("actor", id = %self.id());
		let _entered = span.enter();

		loop {
			let outcome = panic::catch_unwind(AssertUnwindSafe(|| logic.execute(Exec::new(&self))));
			self.state.executing.store(false, Ordering::SeqCst);

			match outcome {
				Ok(Ok(())) => {}
				Ok(Err(err)) if err.is_quit() => break,
				Ok(Err(err)) => self.record_failure(&format!("{err:#}")),
				Err(payload) => self.record_failure(&panic_message(payload.as_ref())),
			}

			self.trigger_recheck();
			if !self.state.inbox.wait_ready() {
				break;
			}
			self.state.executing.store(true, Ordering::SeqCst);
		}

		self.state.executing.store(false, Ordering::SeqCst);
		self.trigger_recheck();
		tracing::debug!("Actor thread finished");
	}

	fn record_failure(&self, error: &str) {
		self.state.failures.fetch_add(1, Ordering::SeqCst);
		metrics::counter!("actorsim_logic_errors_total").increment(1);
		tracing::error!(%error, "Actor logic failed, waiting for the next message");
	}

	/// Quits the inbox, joins the thread and releases outgoing links.
	pub(crate) fn shutdown(&self) {
		self.state.inbox.quit();

		let handle = self.state.thread.lock().take();
		if let Some(mut handle) = handle {
			handle.join();
		}

		match self.state.outgoing.clear() {
			Ok(links) => drop(links),
			Err(err) => tracing::warn!(actor = %self.id(), %err, "Outgoing links not released"),
		}
		tracing::debug!(actor = %self.id(), "Actor shut down");
	}
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(message) = payload.downcast_ref::<&str>() {
		message.to_string()
	} else if let Some(message) = payload.downcast_ref::<String>() {
		message.clone()
	} else {
		"panic with a non-string payload".to_owned()
	}
}
