use std::fmt::Display;

/// Severity scale of simulation diagnostics.
///
/// Kept apart from `tracing::Level` so actor logic can say what an event
/// means rather than how loud it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Significance {
	MinorNetworkEvent,
	MajorNetworkEvent,
	ActorMessage,
	Error,
}

impl Significance {
	pub fn emit(self, source: impl Display, message: impl Display) {
		match self {
			Significance::MinorNetworkEvent => {
				tracing::debug!(source = %source, "{message}")
			}
			Significance::MajorNetworkEvent => {
				tracing::info!(source = %source, "{message}")
			}
			Significance::ActorMessage => {
				tracing::trace!(source = %source, "{message}")
			}
			Significance::Error => {
				tracing::error!(source = %source, "{message}")
			}
		}
	}
}
