mod common;

use std::sync::Arc;
use std::sync::Barrier;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use actorsim::Network;
use actorsim::NetworkConfig;
use actorsim::SimError;
use actorsim::ThreadStatus;
use actorsim::from_fn;
use anyhow::Context as _;
use common::PATIENCE;
use parking_lot::Mutex;

fn idle() -> impl actorsim::ActorLogic {
	from_fn(|_| Ok(()))
}

/// Drains the inbox on every iteration, adding up `u64` payloads.
fn summing(total: Arc<AtomicU64>) -> impl actorsim::ActorLogic {
	from_fn(move |ctx| {
		while let Some(message) = ctx.try_next_message() {
			if let Some(value) = message.content_as::<u64>() {
				total.fetch_add(*value, Ordering::SeqCst);
			}
		}
		Ok(())
	})
}

#[test]
fn connect_is_idempotent_and_entangles_opposite_links() {
	common::init_tracing();
	let network = Network::default();
	let a = network.instantiate(idle()).unwrap();
	let b = network.instantiate(idle()).unwrap();

	let forward = network.link(&a, &b).unwrap();
	assert_eq!(network.link(&a, &b).unwrap(), forward);
	assert!(forward.reverse().is_none());

	let backward = b.connect_to(&a).unwrap();
	assert_eq!(forward.reverse(), Some(backward.clone()));
	assert_eq!(backward.reverse(), Some(forward.clone()));
	assert_eq!(network.links().len(), 2);

	assert_eq!(
		forward.entangle(&backward),
		Err(SimError::AlreadyEntangled(forward.id()))
	);
	assert_eq!(a.find_connection_to(&b).unwrap(), Some(forward));
	assert_eq!(a.find_connection_to(&a).unwrap(), None);
}

#[test]
fn invalid_links_are_rejected() {
	common::init_tracing();
	let network = Network::default();
	let other = Network::default();
	let a = network.instantiate(idle()).unwrap();
	let b = network.instantiate(idle()).unwrap();
	let c = network.instantiate(idle()).unwrap();
	let stranger = other.instantiate(idle()).unwrap();

	assert_eq!(network.link(&a, &a), Err(SimError::SelfLink(a.id())));
	assert_eq!(
		network.link(&a, &stranger),
		Err(SimError::ForeignActor(stranger.id()))
	);

	let ab = network.link(&a, &b).unwrap();
	let ac = network.link(&a, &c).unwrap();
	assert_eq!(ab.entangle(&ab), Err(SimError::EntangleSelf(ab.id())));
	assert_eq!(ab.entangle(&ac), Err(SimError::NotOpposite(ab.id(), ac.id())));
}

#[test]
fn start_twice_fails() {
	common::init_tracing();
	let network = Network::default();
	network.instantiate(idle()).unwrap();
	network.start().unwrap();
	assert_eq!(network.start(), Err(SimError::AlreadyStarted));
	assert!(network.await_termination_timeout(PATIENCE));
}

#[test]
fn actors_without_links_terminate() {
	common::init_tracing();
	let network = Network::default();
	let runs = Arc::new(AtomicU64::new(0));
	for _ in 0..8 {
		let runs = runs.clone();
		network
			.instantiate(from_fn(move |_| {
				runs.fetch_add(1, Ordering::SeqCst);
				Ok(())
			}))
			.unwrap();
	}

	network.start().unwrap();
	assert!(network.await_termination_timeout(PATIENCE));
	assert_eq!(runs.load(Ordering::SeqCst), 8);

	let status = network.status();
	assert!(status.is_quiescent());
	assert_eq!((status.sent, status.received), (0, 0));
	for actor in network.actors() {
		assert_eq!(actor.status().thread, ThreadStatus::PassiveReturned);
	}
}

#[test]
fn termination_waits_for_delayed_messages() {
	common::init_tracing();
	let delay = Duration::from_millis(200);
	let network = Network::default();
	let total = Arc::new(AtomicU64::new(0));

	let sink = network.instantiate(summing(total.clone())).unwrap();
	let source = network
		.instantiate(from_fn(|ctx| {
			if let Some(link) = ctx.any_outgoing()? {
				link.send(7u64)?;
			}
			Ok(())
		}))
		.unwrap();
	let link = network.link_with_delay(&source, &sink, delay).unwrap();
	assert!(link.is_delayed());

	let started = Instant::now();
	network.start().unwrap();
	network.await_termination().unwrap();

	assert!(started.elapsed() >= delay);
	assert_eq!(total.load(Ordering::SeqCst), 7);
	assert_eq!(source.sent_messages(), 1);
	assert_eq!(sink.received_messages(), 1);
	assert!(link.is_idle());
}

#[test]
fn failing_logic_keeps_the_actor_alive() {
	common::init_tracing();
	let network = Network::default();
	let failing = network
		.instantiate(from_fn(|ctx| {
			let Some(message) = ctx.try_next_message() else {
				return Ok(());
			};
			let value = message.content_as::<u64>().context("expected a number")?;
			if *value == 2 {
				panic!("cannot handle two");
			}
			anyhow::bail!("cannot handle {value}")
		}))
		.unwrap();
	let source = network.instantiate(idle()).unwrap();
	let link = network.link(&source, &failing).unwrap();
	for value in 1..=3u64 {
		link.send(value).unwrap();
	}

	network.start().unwrap();
	assert!(network.await_termination_timeout(PATIENCE));
	assert_eq!(failing.failures(), 3);
	assert_eq!(failing.received_messages(), 3);
}

#[test]
fn actors_spawned_at_runtime_are_tracked() {
	common::init_tracing();
	let network = Network::default();
	let total = Arc::new(AtomicU64::new(0));

	network
		.instantiate(from_fn({
			let total = total.clone();
			move |ctx| {
				for value in 1..=3u64 {
					let link = ctx.instantiate(summing(total.clone()))?;
					link.send(value)?;
				}
				Ok(())
			}
		}))
		.unwrap();

	network.start().unwrap();
	assert!(network.await_termination_timeout(PATIENCE));
	assert_eq!(network.actors().len(), 4);
	assert_eq!(network.links().len(), 3);
	assert_eq!(total.load(Ordering::SeqCst), 6);
	assert_eq!(network.status().sent, 3);
}

#[test]
fn replies_travel_over_the_entangled_link() {
	common::init_tracing();
	let network = Network::default();
	let seen = Arc::new(Mutex::new(Vec::new()));
	let limit = 20u32;

	let bouncer = move |seen: Arc<Mutex<Vec<u32>>>| {
		from_fn(move |ctx| {
			loop {
				let message = ctx.next_message()?;
				let hop = *message.content_as::<u32>().context("expected a hop count")?;
				seen.lock().push(hop);
				if hop < limit {
					message
						.link_to_sender()
						.context("no link back to the sender")?
						.send(hop + 1)?;
				}
			}
		})
	};

	let ping = network.instantiate(bouncer(seen.clone())).unwrap();
	let pong = network.instantiate(bouncer(seen.clone())).unwrap();
	let serve = network.link(&ping, &pong).unwrap();
	network.link(&pong, &ping).unwrap();
	serve.send(0u32).unwrap();

	network.start().unwrap();
	assert!(network.await_termination_timeout(PATIENCE));
	assert_eq!(*seen.lock(), (0..=limit).collect::<Vec<_>>());
	for actor in [&ping, &pong] {
		assert_eq!(actor.status().thread, ThreadStatus::PassiveBlocked);
	}
	assert_eq!(network.status().sent, u64::from(limit) + 1);
}

#[test]
fn visiting_links_can_reenter_the_link_set() {
	common::init_tracing();
	let config = NetworkConfig::default()
		.with_lock_timeout(Duration::from_millis(20), Duration::from_millis(40));
	let network = Network::new(config).unwrap();
	let outcome = Arc::new(Mutex::new(None));

	let b = network.instantiate(idle()).unwrap();
	let c = network.instantiate(idle()).unwrap();
	let a = network
		.instantiate(from_fn({
			let outcome = outcome.clone();
			let (b, c) = (b.clone(), c.clone());
			move |ctx| {
				ctx.visit_outgoing(|_| {
					let found = ctx.find_connection_to(&b);
					let any = ctx.any_outgoing();
					let connected = ctx.connect_to(&c);
					*outcome.lock() = Some((found, any, connected));
				})?;
				Ok(())
			}
		}))
		.unwrap();
	let ab = network.link(&a, &b).unwrap();

	network.start().unwrap();
	assert!(network.await_termination_timeout(PATIENCE));

	let (found, any, connected) = outcome.lock().take().unwrap();
	assert_eq!(found, Ok(Some(ab.clone())));
	assert_eq!(any, Ok(Some(ab)));
	assert_eq!(connected.unwrap().destination(), &c);
	assert_eq!(a.outgoing().len().unwrap(), 2);
}

#[test]
fn link_set_held_by_another_thread_times_out() {
	common::init_tracing();
	let config = NetworkConfig::default()
		.with_lock_timeout(Duration::from_millis(20), Duration::from_millis(40));
	let network = Network::new(config).unwrap();
	let a = network.instantiate(idle()).unwrap();
	let b = network.instantiate(idle()).unwrap();
	let backward = network.link(&b, &a).unwrap();

	let first = {
		let _held = b.outgoing().lock().unwrap();
		thread::scope(|scope| scope.spawn(|| network.link(&a, &b)).join().unwrap())
	};
	assert!(matches!(first, Err(SimError::DeadlockAssumed { .. })));
	assert!(backward.reverse().is_none());

	// The forward link exists already; asking again pairs it.
	let forward = network.link(&a, &b).unwrap();
	assert_eq!(forward.reverse(), Some(backward.clone()));
	assert_eq!(backward.reverse(), Some(forward));
	assert_eq!(network.links().len(), 2);
}

#[test]
fn actor_status_follows_the_run_loop() {
	common::init_tracing();
	let network = Network::default();
	let entered = Arc::new(Barrier::new(2));
	let release = Arc::new(Barrier::new(2));

	let busy = network
		.instantiate(from_fn({
			let (entered, release) = (entered.clone(), release.clone());
			let mut first = true;
			move |_| {
				if first {
					first = false;
					entered.wait();
					release.wait();
				}
				Ok(())
			}
		}))
		.unwrap();
	let parked = network
		.instantiate(from_fn(|ctx| {
			loop {
				ctx.next_message()?;
			}
		}))
		.unwrap();
	let source = network.instantiate(idle()).unwrap();
	network.link(&source, &parked).unwrap().send(1u32).unwrap();

	assert_eq!(parked.status().thread, ThreadStatus::MessagesPending);
	assert!(parked.status().thread.is_active());
	assert_eq!(busy.status().thread, ThreadStatus::PassiveReturned);

	network.start().unwrap();
	entered.wait();
	assert_eq!(busy.status().thread, ThreadStatus::Active);

	let deadline = Instant::now() + PATIENCE;
	while parked.status().thread != ThreadStatus::PassiveBlocked {
		assert!(Instant::now() < deadline, "actor never parked");
		thread::sleep(Duration::from_millis(1));
	}
	assert_eq!(parked.received_messages(), 1);
	assert!(network.status().active >= 1);
	assert!(!network.has_terminated());

	release.wait();
	assert!(network.await_termination_timeout(PATIENCE));
	assert_eq!(busy.status().thread, ThreadStatus::PassiveReturned);
	assert_eq!(parked.status().thread, ThreadStatus::PassiveBlocked);
}

#[test]
fn shutdown_is_final() {
	common::init_tracing();
	let network = Network::default();
	let a = network.instantiate(idle()).unwrap();
	let b = network.instantiate(idle()).unwrap();

	network.shutdown();
	network.shutdown();

	assert!(network.is_shut_down());
	assert_eq!(network.await_termination(), Err(SimError::ShutDown));
	assert!(matches!(network.instantiate(idle()), Err(SimError::ShutDown)));
	assert_eq!(network.link(&a, &b), Err(SimError::ShutDown));
	assert_eq!(network.start(), Err(SimError::ShutDown));
	assert!(!network.has_terminated());
}

#[test]
fn config_rejects_an_empty_timeout_window() {
	let config = NetworkConfig::default()
		.with_lock_timeout(Duration::from_millis(100), Duration::from_millis(10));
	assert!(matches!(Network::new(config), Err(SimError::Config(_))));
}
