use std::time::Duration;

use actorsim::Blueprint;
use actorsim::BlueprintLink;
use actorsim::prelude::*;
use anyhow::Context as _;
use tracing_subscriber::EnvFilter;

/// A ring where every actor parks inside its logic between messages.
fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env())
		.init();

	let network = Network::default();
	let links = (0..4)
		.map(|i| BlueprintLink::new(i, (i + 1) % 4).with_delay(Duration::from_millis(50 * (i as u64 + 1))))
		.collect();

	let ring = Blueprint::new(
		4,
		|index| {
			from_fn(move |ctx| {
				loop {
					let message = ctx.next_message()?;
					let remaining = *message.content_as::<u32>().context("expected a counter")?;
					println!("actor #{index} got {remaining}");
					if remaining > 0 {
						ctx.any_outgoing()?
							.context("ring is broken")?
							.send(remaining - 1)?;
					}
				}
			})
		},
		links,
	)
	.implement_in(&network)?;

	ring[0]
		.find_connection_to(&ring[1])?
		.context("ring is broken")?
		.send(12u32)?;

	network.start()?;
	network.await_termination()?;
	for actor in &ring {
		println!("{actor}: {:?}", actor.status());
	}
	network.shutdown();
	Ok(())
}
