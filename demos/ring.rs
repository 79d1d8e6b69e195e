use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use actorsim::Blueprint;
use actorsim::NetworkConfig;
use actorsim::Significance;
use actorsim::prelude::*;
use tracing_subscriber::EnvFilter;

const ACTORS: usize = 10;
const HOPS: u32 = 100;

#[derive(Debug)]
struct Token {
	remaining: u32,
}

fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env())
		.init();

	let config = NetworkConfig::default().with_default_delay(Duration::from_millis(5));
	let network = Network::new(config)?;
	let hops = Arc::new(AtomicU64::new(0));

	let ring = Blueprint::ring(ACTORS, false, {
		let hops = hops.clone();
		move |index| {
			let hops = hops.clone();
			let mut seeded = index != 0;
			from_fn(move |ctx| {
				if !seeded {
					seeded = true;
					if let Some(link) = ctx.any_outgoing()? {
						link.send(Token { remaining: HOPS })?;
					}
				}
				while let Some(message) = ctx.try_next_message() {
					let Some(token) = message.content_as::<Token>() else {
						continue;
					};
					hops.fetch_add(1, Ordering::SeqCst);
					if token.remaining == 0 {
						ctx.log_at(Significance::MajorNetworkEvent, "token retired");
					} else if let Some(link) = ctx.any_outgoing()? {
						link.send(Token {
							remaining: token.remaining - 1,
						})?;
					}
				}
				Ok(())
			})
		}
	})
	.implement_in(&network)?;

	let started = Instant::now();
	network.start()?;
	network.await_termination()?;

	println!(
		"{} hops around {} actors in {:?}",
		hops.load(Ordering::SeqCst),
		ring.len(),
		started.elapsed()
	);
	network.shutdown();
	Ok(())
}
