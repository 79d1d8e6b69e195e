use std::time::Duration;

use crate::actor::ActorId;
use crate::link::LinkId;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
	#[error("{0} cannot be linked to itself")]
	SelfLink(ActorId),

	#[error("{0} belongs to a different network")]
	ForeignActor(ActorId),

	#[error("link {0} is already entangled")]
	AlreadyEntangled(LinkId),

	#[error("link {0} cannot be entangled with itself")]
	EntangleSelf(LinkId),

	#[error("links {0} and {1} do not connect the same actors in opposite directions")]
	NotOpposite(LinkId, LinkId),

	#[error("already started")]
	AlreadyStarted,

	#[error("network has been shut down")]
	ShutDown,

	#[error("failed to acquire outgoing link lock in {waited:?}, deadlock assumed")]
	DeadlockAssumed { waited: Duration },

	#[error("inbox has quit")]
	InboxClosed,

	#[error("link {0} has been shut down")]
	LinkClosed(LinkId),

	#[error("invalid blueprint: {0}")]
	Blueprint(String),

	#[error("invalid configuration: {0}")]
	Config(String),

	#[error("failed to spawn runtime thread: {0}")]
	Spawn(String),
}

/// Raised by a blocking receive once the inbox has quit.
///
/// Not a failure: the actor run loop treats it as the signal to stop.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("inbox quit")]
pub struct Quit;

pub trait IsQuit {
	fn is_quit(&self) -> bool;
}

impl IsQuit for anyhow::Error {
	fn is_quit(&self) -> bool {
		self.downcast_ref::<Quit>().is_some()
	}
}

