mod actor;
mod blueprint;
mod channel;
mod config;
mod delay;
mod drop;
mod envelope;
mod error;
mod handler;
mod link;
mod log;
mod network;
mod outgoing;
mod termination;
mod weak;

pub mod prelude {
	pub use super::actor::Actor;
	pub use super::envelope::Message;
	pub use super::error::IsQuit as _;
	pub use super::handler::ActorLogic;
	pub use super::handler::Exec;
	pub use super::handler::from_fn;
	pub use super::link::Link;
	pub use super::network::Network;
}

pub use actor::Actor;
pub use actor::ActorId;
pub use actor::ActorStatus;
pub use actor::ThreadStatus;
pub use blueprint::Blueprint;
pub use blueprint::BlueprintLink;
pub use channel::Inbox;
pub use channel::InboxView;
pub use config::NetworkConfig;
pub use drop::DropHandle;
pub use envelope::Message;
pub use envelope::Payload;
pub use error::IsQuit;
pub use error::Quit;
pub use error::SimError;
pub use handler::ActorLogic;
pub use handler::Exec;
pub use handler::from_fn;
pub use link::Link;
pub use link::LinkId;
pub use log::Significance;
pub use network::Network;
pub use network::NetworkId;
pub use outgoing::OutgoingGuard;
pub use outgoing::OutgoingLinks;
pub use termination::NetworkStatus;
pub use termination::TerminationDetector;
pub use weak::WeakLink;
