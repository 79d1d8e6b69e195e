#![allow(dead_code)]

use std::time::Duration;

use tracing_subscriber::EnvFilter;

/// Upper bound for anything a test waits on. Generous, so slow CI does not flake.
pub const PATIENCE: Duration = Duration::from_secs(10);

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}
