use std::time::Duration;

use crate::actor::Actor;
use crate::error::SimError;
use crate::handler::ActorLogic;
use crate::network::Network;

/// Link between two actors of a [`Blueprint`], by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlueprintLink {
	pub source: usize,
	pub sink: usize,
	/// `None` uses the network default delay.
	pub delay: Option<Duration>,
	pub bidirectional: bool,
}

impl BlueprintLink {
	pub fn new(source: usize, sink: usize) -> Self {
		Self {
			source,
			sink,
			delay: None,
			bidirectional: false,
		}
	}

	pub fn with_delay(mut self, delay: Duration) -> Self {
		self.delay = Some(delay);
		self
	}

	pub fn bidirectional(mut self) -> Self {
		self.bidirectional = true;
		self
	}
}

type LogicFactory = Box<dyn FnMut(usize) -> Box<dyn ActorLogic>>;

/// Declarative network shape: how many actors, what each runs, how they connect.
pub struct Blueprint {
	actor_count: usize,
	factory: LogicFactory,
	links: Vec<BlueprintLink>,
}

impl Blueprint {
	pub fn new<F, L>(actor_count: usize, mut factory: F, links: Vec<BlueprintLink>) -> Self
	where
		F: FnMut(usize) -> L + 'static,
		L: ActorLogic,
	{
		Self {
			actor_count,
			factory: Box::new(move |index| Box::new(factory(index)) as Box<dyn ActorLogic>),
			links,
		}
	}

	/// Actor `i` links to actor `i + 1`, the last one back to the first.
	pub fn ring<F, L>(actor_count: usize, bidirectional: bool, factory: F) -> Self
	where
		F: FnMut(usize) -> L + 'static,
		L: ActorLogic,
	{
		let links = if actor_count < 2 {
			Vec::new()
		} else {
			(0..actor_count)
				.map(|i| BlueprintLink {
					bidirectional,
					..BlueprintLink::new(i, (i + 1) % actor_count)
				})
				.collect()
		};
		Self::new(actor_count, factory, links)
	}

	/// Every actor linked to every other actor in both directions.
	pub fn full_mesh<F, L>(actor_count: usize, factory: F) -> Self
	where
		F: FnMut(usize) -> L + 'static,
		L: ActorLogic,
	{
		let links = (0..actor_count)
			.flat_map(|i| (i + 1..actor_count).map(move |j| BlueprintLink::new(i, j).bidirectional()))
			.collect();
		Self::new(actor_count, factory, links)
	}

	pub fn actor_count(&self) -> usize {
		self.actor_count
	}

	pub fn links(&self) -> &[BlueprintLink] {
		&self.links
	}

	fn validate(&self) -> Result<(), SimError> {
		for link in &self.links {
			if link.source >= self.actor_count || link.sink >= self.actor_count {
				return Err(SimError::Blueprint(format!(
					"link {} -> {} is out of range for {} actors",
					link.source, link.sink, self.actor_count
				)));
			}
		}
		Ok(())
	}

	/// Instantiates the actors and links in `network`.
	///
	/// Works before and after the network was started. Returns the actors in
	/// index order.
	pub fn implement_in(&mut self, network: &Network) -> Result<Vec<Actor>, SimError> {
		self.validate()?;

		let actors = (0..self.actor_count)
			.map(|index| network.instantiate_boxed((self.factory)(index)))
			.collect::<Result<Vec<_>, _>>()?;

		for link in &self.links {
			let (source, sink) = (&actors[link.source], &actors[link.sink]);
			connect(network, source, sink, link.delay)?;
			if link.bidirectional {
				connect(network, sink, source, link.delay)?;
			}
		}

		tracing::debug!(actors = actors.len(), links = self.links.len(), "Blueprint implemented");
		Ok(actors)
	}
}

fn connect(network: &Network, source: &Actor, sink: &Actor, delay: Option<Duration>) -> Result<(), SimError> {
	match delay {
		Some(delay) => network.link_with_delay(source, sink, delay)?,
		None => network.link(source, sink)?,
	};
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::handler::from_fn;

	fn idle(_: usize) -> impl ActorLogic {
		from_fn(|_| Ok(()))
	}

	fn pairs(blueprint: &Blueprint) -> Vec<(usize, usize, bool)> {
		blueprint
			.links()
			.iter()
			.map(|link| (link.source, link.sink, link.bidirectional))
			.collect()
	}

	#[test]
	fn ring_closes_the_loop() {
		let ring = Blueprint::ring(3, false, idle);
		assert_eq!(pairs(&ring), vec![(0, 1, false), (1, 2, false), (2, 0, false)]);
		assert!(Blueprint::ring(1, true, idle).links().is_empty());
	}

	#[test]
	fn full_mesh_links_each_pair_once() {
		let mesh = Blueprint::full_mesh(4, idle);
		assert_eq!(mesh.links().len(), 6);
		assert!(mesh.links().iter().all(|link| link.bidirectional && link.source < link.sink));
	}

	#[test]
	fn out_of_range_links_are_rejected_before_instantiation() {
		let network = Network::default();
		let mut blueprint = Blueprint::new(2, idle, vec![BlueprintLink::new(0, 2)]);
		assert!(matches!(blueprint.implement_in(&network), Err(SimError::Blueprint(_))));
		assert!(network.actors().is_empty());
	}

	#[test]
	fn implementing_a_mesh_entangles_every_pair() {
		let network = Network::default();
		let actors = Blueprint::full_mesh(3, idle).implement_in(&network).unwrap();

		assert_eq!(actors.len(), 3);
		assert_eq!(network.links().len(), 6);
		assert!(network.links().iter().all(|link| link.reverse().is_some()));
		network.shutdown();
	}
}
