//! Engine lifecycle
//!
//! Owns both trackers for the lifetime of the process. Build it once at
//! startup, hand out [`Gate`]s or an [`AdmissionLayer`], and stop it on
//! shutdown. Dropping the engine also stops the trackers.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{NotifyThresholds, WardenConfig};
use crate::extract::ServerMode;
use crate::gate::Gate;
use crate::membership::{MembershipHandle, MembershipTracker};
use crate::middleware::AdmissionLayer;
use crate::notifier::{ConsoleSink, FileSink, Notifier, Sink};
use crate::prelude::*;
use crate::stats::{StatsHandle, StatsTracker};

pub struct EngineBuilder {
	config: WardenConfig,
	sink: Option<Arc<dyn Sink>>,
}

impl EngineBuilder {
	pub fn new() -> Self {
		Self::from_config(WardenConfig::default())
	}

	pub fn from_config(config: WardenConfig) -> Self {
		Self { config, sink: None }
	}

	pub fn whitelist(&mut self, ids: impl IntoIterator<Item = impl Into<ClientId>>) -> &mut Self {
		self.config.whitelist = ids.into_iter().map(Into::into).collect();
		self
	}
	pub fn blacklist(&mut self, ids: impl IntoIterator<Item = impl Into<ClientId>>) -> &mut Self {
		self.config.blacklist = ids.into_iter().map(Into::into).collect();
		self
	}
	pub fn thresholds(&mut self, thresholds: NotifyThresholds) -> &mut Self {
		self.config.thresholds = thresholds;
		self
	}
	pub fn strike_threshold(&mut self, strikes: u32) -> &mut Self {
		self.config.strike_threshold = strikes;
		self
	}
	pub fn reject_delay(&mut self, delay: Duration) -> &mut Self {
		self.config.reject_delay = delay;
		self
	}
	pub fn blacklist_ttl(&mut self, ttl: Duration) -> &mut Self {
		self.config.blacklist_ttl = Some(ttl);
		self
	}
	pub fn mailbox_capacity(&mut self, capacity: usize) -> &mut Self {
		self.config.mailbox_capacity = capacity;
		self
	}
	pub fn color(&mut self, color: bool) -> &mut Self {
		self.config.color = color;
		self
	}
	pub fn mode(&mut self, mode: ServerMode) -> &mut Self {
		self.config.mode = mode;
		self
	}
	/// Use a custom notification sink instead of the configured one
	pub fn sink(&mut self, sink: Arc<dyn Sink>) -> &mut Self {
		self.sink = Some(sink);
		self
	}

	fn build_sink(&self) -> ClResult<Arc<dyn Sink>> {
		if let Some(sink) = &self.sink {
			return Ok(sink.clone());
		}
		match &self.config.notify_file {
			Some(path) => Ok(Arc::new(FileSink::open(path)?)),
			None => Ok(Arc::new(ConsoleSink)),
		}
	}

	/// Seed the trackers and start their loops. Must run inside a tokio runtime.
	pub fn start(&self) -> ClResult<Engine> {
		let config = &self.config;
		config.validate()?;

		let notifier = Arc::new(Notifier::new(self.build_sink()?));
		if config.color {
			notifier.color_on();
		}

		let cancel = CancellationToken::new();
		let (membership, membership_task) = MembershipTracker::new(config, notifier.clone())
			.spawn(config.mailbox_capacity, cancel.clone());
		let (stats, stats_task) =
			StatsTracker::new(config.thresholds, membership.clone(), notifier.clone())
				.spawn(config.mailbox_capacity, cancel.clone());

		info!(
			"Warden started: {} whitelisted, {} blacklisted, {} strikes allowed",
			config.whitelist.len(),
			config.blacklist.len(),
			config.strike_threshold
		);

		Ok(Engine {
			membership,
			stats,
			notifier,
			reject_delay: config.reject_delay,
			mode: config.mode,
			cancel,
			tasks: vec![membership_task, stats_task],
		})
	}
}

impl Default for EngineBuilder {
	fn default() -> Self {
		Self::new()
	}
}

pub struct Engine {
	membership: MembershipHandle,
	stats: StatsHandle,
	notifier: Arc<Notifier>,
	reject_delay: Duration,
	mode: ServerMode,
	cancel: CancellationToken,
	tasks: Vec<JoinHandle<()>>,
}

impl Engine {
	pub fn builder() -> EngineBuilder {
		EngineBuilder::new()
	}

	pub fn gate(&self) -> Gate {
		Gate::new(
			self.membership.clone(),
			self.stats.clone(),
			self.notifier.clone(),
			self.reject_delay,
		)
	}

	/// Tower layer admitting requests of an axum router
	pub fn layer(&self) -> AdmissionLayer {
		AdmissionLayer::new(self.gate(), self.mode)
	}

	pub fn membership(&self) -> &MembershipHandle {
		&self.membership
	}

	pub fn stats(&self) -> &StatsHandle {
		&self.stats
	}

	pub fn notifier(&self) -> &Arc<Notifier> {
		&self.notifier
	}

	pub fn mode(&self) -> ServerMode {
		self.mode
	}

	/// Stop both trackers and wait for their loops to exit
	pub async fn stop(mut self) {
		self.cancel.cancel();
		for task in std::mem::take(&mut self.tasks) {
			if let Err(err) = task.await {
				warn!("Tracker task ended abnormally: {}", err);
			}
		}
		info!("Warden stopped");
	}
}

impl Drop for Engine {
	fn drop(&mut self) {
		self.cancel.cancel();
	}
}

impl std::fmt::Debug for Engine {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Engine")
			.field("reject_delay", &self.reject_delay)
			.field("mode", &self.mode)
			.field("running", &!self.cancel.is_cancelled())
			.finish_non_exhaustive()
	}
}

// vim: ts=4
