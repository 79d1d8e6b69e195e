use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use parking_lot::Mutex;

use crate::actor::Actor;
use crate::config::NetworkConfig;
use crate::error::SimError;
use crate::handler::ActorLogic;
use crate::link::Link;
use crate::termination::NetworkStatus;
use crate::termination::TerminationDetector;

static NEXT_NETWORK_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkId(u64);

impl Display for NetworkId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "Network {}", self.0)
	}
}

pub(crate) struct NetworkInner {
	id: NetworkId,
	config: NetworkConfig,
	actors: Mutex<Vec<Actor>>,
	links: Mutex<Vec<Link>>,
	detector: Arc<TerminationDetector>,
	started: AtomicBool,
	shut_down: AtomicBool,
}

impl NetworkInner {
	pub(crate) fn id(&self) -> NetworkId {
		self.id
	}

	pub(crate) fn detector(&self) -> &Arc<TerminationDetector> {
		&self.detector
	}

	fn status(&self) -> NetworkStatus {
		let actors = self.actors.lock();
		actors
			.iter()
			.map(Actor::status)
			.fold(NetworkStatus::default(), |mut total, status| {
				total.sent += status.sent;
				total.received += status.received;
				if status.thread.is_active() {
					total.active += 1;
				}
				total
			})
	}

	fn shutdown(&self) {
		if self.shut_down.swap(true, Ordering::SeqCst) {
			return;
		}

		self.detector.stop();

		// Links first, so nothing is delivered into an actor being torn down.
		let links = std::mem::take(&mut *self.links.lock());
		for link in &links {
			link.shutdown();
		}

		let actors = std::mem::take(&mut *self.actors.lock());
		for actor in &actors {
			actor.shutdown();
		}

		tracing::info!(
			network = %self.id,
			actors = actors.len(),
			links = links.len(),
			"Network shut down"
		);
	}
}

impl Drop for NetworkInner {
	fn drop(&mut self) {
		self.shutdown()
	}
}

/// One simulation: a set of actors, the links between them and the
/// termination detector watching them.
///
/// Cheap to clone. The network shuts itself down when its last handle drops.
#[derive(Clone)]
pub struct Network {
	inner: Arc<NetworkInner>,
}

impl Default for Network {
	fn default() -> Self {
		Self::with_valid_config(NetworkConfig::default())
	}
}

impl std::fmt::Debug for Network {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Network")
			.field("id", &self.inner.id)
			.field("config", &self.inner.config)
			.field("started", &self.is_started())
			.field("terminated", &self.has_terminated())
			.finish()
	}
}

impl Network {
	pub fn new(config: NetworkConfig) -> Result<Self, SimError> {
		config.validate()?;
		Ok(Self::with_valid_config(config))
	}

	fn with_valid_config(config: NetworkConfig) -> Self {
		let inner = Arc::new(NetworkInner {
			id: NetworkId(NEXT_NETWORK_ID.fetch_add(1, Ordering::Relaxed)),
			config,
			actors: Mutex::new(Vec::new()),
			links: Mutex::new(Vec::new()),
			detector: TerminationDetector::new(),
			started: AtomicBool::new(false),
			shut_down: AtomicBool::new(false),
		});
		Self { inner }
	}

	pub(crate) fn from_inner(inner: Arc<NetworkInner>) -> Self {
		Self { inner }
	}

	pub fn id(&self) -> NetworkId {
		self.inner.id
	}

	pub fn config(&self) -> &NetworkConfig {
		&self.inner.config
	}

	/// Creates and registers an actor running `logic`.
	///
	/// If the network is already running the actor starts right away.
	pub fn instantiate<L: ActorLogic>(&self, logic: L) -> Result<Actor, SimError> {
		self.instantiate_boxed(Box::new(logic))
	}

	pub fn instantiate_boxed(&self, logic: Box<dyn ActorLogic>) -> Result<Actor, SimError> {
		let actor = Actor::new(&self.inner, &self.inner.config, logic);

		let mut actors = self.inner.actors.lock();
		if self.is_shut_down() {
			return Err(SimError::ShutDown);
		}
		actors.push(actor.clone());
		let started = self.is_started();
		if started {
			actor.start()?;
		}
		drop(actors);

		if started {
			self.trigger_recheck();
		}

		metrics::counter!("actorsim_actors_spawned_total").increment(1);
		tracing::debug!(network = %self.inner.id, actor = %actor.id(), "Actor instantiated");
		Ok(actor)
	}

	/// New or existing link from `source` to `destination` with the default delay.
	pub fn link(&self, source: &Actor, destination: &Actor) -> Result<Link, SimError> {
		self.link_with_delay(source, destination, self.inner.config.default_delay())
	}

	/// New or existing link from `source` to `destination`.
	///
	/// `delay` only applies when the link does not exist yet. A zero delay
	/// creates an instant link. The link is entangled with the link running
	/// the other way, if there is one and neither side is paired yet.
	pub fn link_with_delay(
		&self,
		source: &Actor,
		destination: &Actor,
		delay: Duration,
	) -> Result<Link, SimError> {
		if self.is_shut_down() {
			return Err(SimError::ShutDown);
		}
		if source.id() == destination.id() {
			return Err(SimError::SelfLink(source.id()));
		}
		for actor in [source, destination] {
			if actor.network_id() != self.inner.id {
				return Err(SimError::ForeignActor(actor.id()));
			}
		}

		let (link, created) = source
			.outgoing()
			.find_or_insert_with(destination, || Link::new(source, destination, delay))?;

		let mut links = self.inner.links.lock();
		if created {
			if self.is_shut_down() {
				drop(links);
				link.shutdown();
				return Err(SimError::ShutDown);
			}
			links.push(link.clone());
			metrics::counter!("actorsim_links_created_total").increment(1);
			tracing::info!(link = %link, ?delay, "Connection established");
		}

		// Retried on every request, so a lookup that timed out earlier is repaired.
		if !link.is_entangled() {
			if let Some(reverse) = destination.find_connection_to(source)? {
				if !reverse.is_entangled() {
					link.entangle(&reverse)?;
					tracing::info!(forward = %link.id(), backward = %reverse.id(), "Connection entangled");
				}
			}
		}
		drop(links);
		Ok(link)
	}

	/// Starts every registered actor and the termination detector. Call once.
	pub fn start(&self) -> Result<(), SimError> {
		if self.is_shut_down() {
			return Err(SimError::ShutDown);
		}

		{
			let actors = self.inner.actors.lock();
			if self.inner.started.swap(true, Ordering::SeqCst) {
				return Err(SimError::AlreadyStarted);
			}
			for actor in actors.iter() {
				actor.start()?;
			}
		}

		let network = Arc::downgrade(&self.inner);
		self.inner.detector.start(
			format!("termination-{}", self.inner.id.0),
			move || network.upgrade().map(|inner| inner.status()),
		)?;
		self.inner.detector.enable();

		tracing::info!(network = %self.inner.id, "Network started");
		Ok(())
	}

	pub fn is_started(&self) -> bool {
		self.inner.started.load(Ordering::SeqCst)
	}

	pub fn is_shut_down(&self) -> bool {
		self.inner.shut_down.load(Ordering::SeqCst)
	}

	pub fn has_terminated(&self) -> bool {
		self.inner.detector.has_terminated()
	}

	/// Blocks until quiescence is detected.
	///
	/// Fails with [`SimError::ShutDown`] if the network is shut down first.
	pub fn await_termination(&self) -> Result<(), SimError> {
		self.inner.detector.await_termination()
	}

	/// Returns whether termination was detected within `timeout`.
	pub fn await_termination_timeout(&self, timeout: Duration) -> bool {
		self.inner.detector.await_termination_timeout(timeout)
	}

	/// Asks the detector to re-evaluate quiescence.
	pub fn trigger_recheck(&self) {
		self.inner.detector.trigger_recheck()
	}

	pub fn status(&self) -> NetworkStatus {
		self.inner.status()
	}

	pub fn actors(&self) -> Vec<Actor> {
		self.inner.actors.lock().clone()
	}

	pub fn links(&self) -> Vec<Link> {
		self.inner.links.lock().clone()
	}

	/// Stops the detector, then every link, then every actor. Idempotent.
	pub fn shutdown(&self) {
		self.inner.shutdown()
	}
}
