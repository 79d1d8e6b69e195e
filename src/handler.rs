use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use crate::actor::Actor;
use crate::envelope::Message;
use crate::envelope::Payload;
use crate::error::Quit;
use crate::error::SimError;
use crate::link::Link;
use crate::log::Significance;
use crate::network::Network;

/// Sequential logic hosted by an actor.
///
/// `execute` is called once when the actor starts and again whenever a
/// message arrives after the previous call returned. While it runs, and is
/// not parked in [`Exec::next_message`], the whole network counts as busy.
///
/// Returning an error ends the current iteration only; the error is logged
/// and the actor waits for its next message. [`Quit`] propagated with `?`
/// from [`Exec::next_message`] stops the actor.
pub trait ActorLogic: Send + 'static {
	fn execute(&mut self, ctx: Exec<'_>) -> anyhow::Result<()>;
}

impl<F> ActorLogic for F
where
	F: FnMut(Exec<'_>) -> anyhow::Result<()> + Send + 'static,
{
	fn execute(&mut self, ctx: Exec<'_>) -> anyhow::Result<()> {
		self(ctx)
	}
}

/// Pins the signature of a closure so it can be used as [`ActorLogic`].
pub fn from_fn<F>(logic: F) -> F
where
	F: FnMut(Exec<'_>) -> anyhow::Result<()> + Send + 'static,
{
	logic
}

/// Control handle passed to [`ActorLogic::execute`].
#[derive(Clone, Copy)]
pub struct Exec<'a> {
	actor: &'a Actor,
}

impl<'a> Exec<'a> {
	pub(crate) fn new(actor: &'a Actor) -> Self {
		Self { actor }
	}

	pub fn local_actor(&self) -> &'a Actor {
		self.actor
	}

	pub fn network(&self) -> Result<Network, SimError> {
		self.actor.network().ok_or(SimError::ShutDown)
	}

	/// Next queued message, if any. Never blocks.
	pub fn try_next_message(&self) -> Option<Message> {
		let message = self.actor.inbox().try_take()?;
		metrics::counter!("actorsim_messages_received_total").increment(1);
		Some(message)
	}

	/// Next message, parking the actor until one arrives.
	///
	/// The actor counts as passive while parked here.
	pub fn next_message(&self) -> Result<Message, Quit> {
		let message = self.actor.inbox().take(|| self.actor.trigger_recheck())?;
		metrics::counter!("actorsim_messages_received_total").increment(1);
		Ok(message)
	}

	pub fn visit_outgoing(&self, visitor: impl FnMut(&Link)) -> Result<(), SimError> {
		self.actor.visit_outgoing(visitor)
	}

	pub fn any_outgoing(&self) -> Result<Option<Link>, SimError> {
		self.actor.outgoing().get_any()
	}

	/// Sends `payload` over every outgoing link.
	///
	/// Every link is attempted; the first failure is returned.
	pub fn broadcast<P: Payload>(&self, payload: P) -> Result<(), SimError> {
		let shared: Arc<dyn Payload> = Arc::new(payload);
		let mut first_error = None;
		self.visit_outgoing(|link| {
			if let Err(err) = link.send_shared(Some(shared.clone())) {
				first_error.get_or_insert(err);
			}
		})?;
		first_error.map_or(Ok(()), Err)
	}

	/// Spawns a new actor running `logic` and links to it.
	pub fn instantiate<L: ActorLogic>(&self, logic: L) -> Result<Link, SimError> {
		let network = self.network()?;
		let child = network.instantiate(logic)?;
		network.link(self.actor, &child)
	}

	/// New or existing link to `remote`, with the network default delay.
	pub fn connect_to(&self, remote: &Actor) -> Result<Link, SimError> {
		self.network()?.link(self.actor, remote)
	}

	pub fn connect_to_with_delay(&self, remote: &Actor, delay: Duration) -> Result<Link, SimError> {
		self.network()?.link_with_delay(self.actor, remote, delay)
	}

	pub fn find_connection_to(&self, remote: &Actor) -> Result<Option<Link>, SimError> {
		self.actor.find_connection_to(remote)
	}

	pub fn log(&self, message: impl Display) {
		self.log_at(Significance::ActorMessage, message)
	}

	pub fn log_at(&self, significance: Significance, message: impl Display) {
		significance.emit(self.actor.id(), message)
	}
}
