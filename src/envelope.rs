use std::fmt::Debug;
use std::sync::Arc;

use downcast_rs::DowncastSync;
use downcast_rs::impl_downcast;

use crate::actor::Actor;
use crate::link::Link;

/// Anything that can travel inside a [`Message`].
pub trait Payload: DowncastSync + Debug {}

impl_downcast!(sync Payload);

impl<T: Send + Sync + Debug + 'static> Payload for T {}

/// Immutable message as seen by the receiving actor.
#[derive(Clone)]
pub struct Message {
	sender: Actor,
	link_to_sender: Option<Link>,
	content: Option<Arc<dyn Payload>>,
}

impl Debug for Message {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Message")
			.field("sender", &self.sender.id())
			.field("reply", &self.link_to_sender.as_ref().map(Link::id))
			.field("content", &self.content)
			.finish()
	}
}

impl Message {
	pub(crate) fn new(
		sender: Actor,
		link_to_sender: Option<Link>,
		content: Option<Arc<dyn Payload>>,
	) -> Self {
		Self {
			sender,
			link_to_sender,
			content,
		}
	}

	pub fn sender(&self) -> &Actor {
		&self.sender
	}

	/// Link back to the sender, present when the carrying link was entangled.
	pub fn link_to_sender(&self) -> Option<&Link> {
		self.link_to_sender.as_ref()
	}

	pub fn content(&self) -> Option<&Arc<dyn Payload>> {
		self.content.as_ref()
	}

	pub fn content_as<T: Payload>(&self) -> Option<&T> {
		self.content.as_deref()?.downcast_ref::<T>()
	}

	pub fn is_empty(&self) -> bool {
		self.content.is_none()
	}
}
