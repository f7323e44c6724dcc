//! Engine configuration
//!
//! Read once before the trackers start and never changed afterwards.
//! Every field has a default, so an empty YAML document is a valid config.

use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{DurationSeconds, serde_as};

use crate::extract::ServerMode;
use crate::prelude::*;

const fn nz(v: u64) -> NonZeroU64 {
	match NonZeroU64::new(v) {
		Some(v) => v,
		None => NonZeroU64::MIN,
	}
}

/// Sampling period per tracked response code: a notice is emitted whenever
/// the running count is an exact multiple of it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyThresholds {
	pub ok: NonZeroU64,
	pub forbidden: NonZeroU64,
	pub not_found: NonZeroU64,
	pub method_not_allowed: NonZeroU64,
	pub internal_error: NonZeroU64,
}

impl NotifyThresholds {
	pub fn for_code(&self, code: TrackedCode) -> NonZeroU64 {
		match code {
			TrackedCode::Ok => self.ok,
			TrackedCode::Forbidden => self.forbidden,
			TrackedCode::NotFound => self.not_found,
			TrackedCode::MethodNotAllowed => self.method_not_allowed,
			TrackedCode::InternalError => self.internal_error,
		}
	}

	/// Same period for every code
	pub fn uniform(every: NonZeroU64) -> Self {
		Self {
			ok: every,
			forbidden: every,
			not_found: every,
			method_not_allowed: every,
			internal_error: every,
		}
	}
}

impl Default for NotifyThresholds {
	fn default() -> Self {
		Self {
			ok: nz(1000),
			forbidden: nz(100),
			not_found: nz(100),
			method_not_allowed: nz(5),
			internal_error: nz(1), // every 500 is reported
		}
	}
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
	/// Clients always allowed by the membership check
	pub whitelist: Vec<ClientId>,
	/// Clients blocked from startup
	pub blacklist: Vec<ClientId>,
	pub thresholds: NotifyThresholds,
	/// Strikes a client accumulates before the next one blacklists it
	pub strike_threshold: u32,
	/// Pause before a rejection is returned
	#[serde_as(as = "DurationSeconds<u64>")]
	pub reject_delay: Duration,
	/// Lifetime of a blacklist entry; `None` keeps it until the process exits
	#[serde_as(as = "Option<DurationSeconds<u64>>")]
	pub blacklist_ttl: Option<Duration>,
	/// Bounded mailbox size of each tracker
	pub mailbox_capacity: usize,
	/// ANSI highlighting in notifications
	pub color: bool,
	/// Append notifications to this file instead of stdout
	pub notify_file: Option<PathBuf>,
	pub mode: ServerMode,
}

impl Default for WardenConfig {
	fn default() -> Self {
		Self {
			whitelist: Vec::new(),
			blacklist: Vec::new(),
			thresholds: NotifyThresholds::default(),
			strike_threshold: 3,
			reject_delay: Duration::from_secs(3),
			blacklist_ttl: None,
			mailbox_capacity: 1024,
			color: false,
			notify_file: None,
			mode: ServerMode::Standalone,
		}
	}
}

impl WardenConfig {
	pub fn from_yaml(src: &str) -> ClResult<Self> {
		let config: WardenConfig = serde_yaml::from_str(src)?;
		config.validate()?;
		Ok(config)
	}

	pub async fn load(path: impl AsRef<Path>) -> ClResult<Self> {
		let src = tokio::fs::read_to_string(path.as_ref()).await?;
		Self::from_yaml(&src)
	}

	pub fn validate(&self) -> ClResult<()> {
		if self.strike_threshold == 0 {
			return Err(Error::ConfigError("strike_threshold must be at least 1".into()));
		}
		if self.mailbox_capacity == 0 {
			return Err(Error::ConfigError("mailbox_capacity must be at least 1".into()));
		}
		if self.blacklist_ttl.is_some_and(|ttl| ttl.is_zero()) {
			return Err(Error::ConfigError("blacklist_ttl must be positive when set".into()));
		}
		Ok(())
	}
}


// vim: ts=4
