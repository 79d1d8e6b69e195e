use std::ops::RangeInclusive;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::error::SimError;

/// Settings of one simulation network.
///
/// Missing fields fall back to their defaults, so a TOML document only needs
/// the values it overrides:
///
/// ```toml
/// default_delay_ms = 300
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
	/// Delay applied to links created without an explicit one. 0 means instant.
	pub default_delay_ms: u64,
	/// Lower bound of the outgoing link lock timeout.
	pub lock_timeout_min_ms: u64,
	/// Upper bound (inclusive) of the outgoing link lock timeout.
	pub lock_timeout_max_ms: u64,
}

impl Default for NetworkConfig {
	fn default() -> Self {
		Self {
			default_delay_ms: 0,
			lock_timeout_min_ms: 500,
			lock_timeout_max_ms: 1000,
		}
	}
}

impl NetworkConfig {
	pub fn with_default_delay(mut self, delay: Duration) -> Self {
		self.default_delay_ms = saturating_millis(delay);
		self
	}

	pub fn with_lock_timeout(mut self, min: Duration, max: Duration) -> Self {
		self.lock_timeout_min_ms = saturating_millis(min);
		self.lock_timeout_max_ms = saturating_millis(max);
		self
	}

	pub fn from_toml_str(source: &str) -> Result<Self, SimError> {
		let config: Self = toml::from_str(source).map_err(|e| SimError::Config(e.to_string()))?;
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<(), SimError> {
		if self.lock_timeout_min_ms == 0 {
			return Err(SimError::Config(
				"lock_timeout_min_ms must be positive".to_owned(),
			));
		}
		if self.lock_timeout_min_ms > self.lock_timeout_max_ms {
			return Err(SimError::Config(format!(
				"lock timeout window {}..={} ms is empty",
				self.lock_timeout_min_ms, self.lock_timeout_max_ms
			)));
		}
		Ok(())
	}

	pub fn default_delay(&self) -> Duration {
		Duration::from_millis(self.default_delay_ms)
	}

	pub fn lock_timeout(&self) -> RangeInclusive<Duration> {
		Duration::from_millis(self.lock_timeout_min_ms)..=Duration::from_millis(self.lock_timeout_max_ms)
	}
}

fn saturating_millis(duration: Duration) -> u64 {
	u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn partial_toml_keeps_defaults() {
		let config = NetworkConfig::from_toml_str("default_delay_ms = 300").unwrap();
		assert_eq!(config.default_delay(), Duration::from_millis(300));
		assert_eq!(
			config.lock_timeout(),
			Duration::from_millis(500)..=Duration::from_millis(1000)
		);
	}

	#[test]
	fn empty_timeout_window_is_rejected() {
		let err = NetworkConfig::from_toml_str(
			"lock_timeout_min_ms = 900\nlock_timeout_max_ms = 100",
		)
		.unwrap_err();
		assert!(matches!(err, SimError::Config(_)));
	}

	#[test]
	fn malformed_toml_is_a_config_error() {
		let err = NetworkConfig::from_toml_str("default_delay_ms = \"soon\"").unwrap_err();
		assert!(matches!(err, SimError::Config(_)));
	}

	#[test]
	fn oversized_durations_saturate() {
		let config = NetworkConfig::default()
			.with_default_delay(Duration::MAX)
			.with_lock_timeout(Duration::from_millis(10), Duration::MAX);
		assert_eq!(config.default_delay_ms, u64::MAX);
		assert_eq!(config.lock_timeout_max_ms, u64::MAX);
		assert!(config.validate().is_ok());
	}
}
