use std::sync::Arc;

use crate::link::Link;
use crate::link::LinkState;

/// Non-owning reference to a link.
///
/// Entangled links point at each other through this, so the pair never keeps
/// itself alive; the network owns both sides.
pub struct WeakLink {
	state: std::sync::Weak<LinkState>,
}

impl Clone for WeakLink {
	fn clone(&self) -> Self {
		Self {
			state: self.state.clone(),
		}
	}
}

impl std::fmt::Debug for WeakLink {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self.upgrade() {
			Some(link) => f.debug_tuple("WeakLink").field(&link.id()).finish(),
			None => f.write_str("WeakLink(<dropped>)"),
		}
	}
}

impl WeakLink {
	pub fn upgrade(&self) -> Option<Link> {
		self.state.upgrade().map(|state| Link { state })
	}
}

impl Link {
	pub fn downgrade(&self) -> WeakLink {
		WeakLink {
			state: Arc::downgrade(&self.state),
		}
	}
}
