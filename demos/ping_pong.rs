use std::time::Duration;

use actorsim::NetworkConfig;
use actorsim::prelude::*;
use anyhow::Context as _;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct Ping(u32);

#[derive(Debug)]
struct Pong(u32);

/// Answers every ping with a pong over the link it came in on.
struct Ponger;

impl ActorLogic for Ponger {
	fn execute(&mut self, ctx: Exec<'_>) -> anyhow::Result<()> {
		while let Some(message) = ctx.try_next_message() {
			let Some(Ping(n)) = message.content_as::<Ping>() else {
				continue;
			};
			ctx.log(format!("pong #{n}"));
			message
				.link_to_sender()
				.context("ping arrived without a way back")?
				.send(Pong(*n))?;
		}
		Ok(())
	}
}

/// Serves the first ping, then one more per pong until `rounds` is reached.
struct Pinger {
	rounds: u32,
}

impl ActorLogic for Pinger {
	fn execute(&mut self, ctx: Exec<'_>) -> anyhow::Result<()> {
		let Some(message) = ctx.try_next_message() else {
			let link = ctx.any_outgoing()?.context("pinger is not connected")?;
			return Ok(link.send(Ping(1))?);
		};

		let Pong(n) = message.content_as::<Pong>().context("unexpected message")?;
		println!("round {n} done");
		if *n < self.rounds {
			message
				.link_to_sender()
				.context("pong arrived without a way back")?
				.send(Ping(n + 1))?;
		}
		Ok(())
	}
}

fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env())
		.init();

	let config = NetworkConfig::default().with_default_delay(Duration::from_millis(100));
	let network = Network::new(config)?;

	let pinger = network.instantiate(Pinger { rounds: 5 })?;
	let ponger = network.instantiate(Ponger)?;
	network.link(&pinger, &ponger)?;
	network.link(&ponger, &pinger)?;

	network.start()?;
	network.await_termination()?;

	let status = network.status();
	println!("terminated after {} messages", status.sent);
	network.shutdown();
	Ok(())
}
