//! Response statistics tracker
//!
//! Single-owner actor counting final response codes. Notices are sampled: a
//! code's count is reported only when it hits a multiple of that code's
//! threshold. Outcomes that suggest scanning (404, 405, 500) are escalated to
//! the membership tracker as strikes.

use std::sync::Arc;

use flume::{Receiver, Sender};
use futures::channel::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::NotifyThresholds;
use crate::membership::{MembershipHandle, StrikeOutcome};
use crate::notifier::Notifier;
use crate::prelude::*;

const ACTOR: &str = "stats";

/// Running response counts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
	pub ok: u64,
	pub forbidden: u64,
	pub not_found: u64,
	pub method_not_allowed: u64,
	pub internal_error: u64,
}

impl StatsSnapshot {
	pub fn count(&self, code: TrackedCode) -> u64 {
		match code {
			TrackedCode::Ok => self.ok,
			TrackedCode::Forbidden => self.forbidden,
			TrackedCode::NotFound => self.not_found,
			TrackedCode::MethodNotAllowed => self.method_not_allowed,
			TrackedCode::InternalError => self.internal_error,
		}
	}

	fn bump(&mut self, code: TrackedCode) -> u64 {
		let counter = match code {
			TrackedCode::Ok => &mut self.ok,
			TrackedCode::Forbidden => &mut self.forbidden,
			TrackedCode::NotFound => &mut self.not_found,
			TrackedCode::MethodNotAllowed => &mut self.method_not_allowed,
			TrackedCode::InternalError => &mut self.internal_error,
		};
		*counter = counter.saturating_add(1);
		*counter
	}
}

pub(crate) enum StatsMsg {
	Record(OutcomeRecord),
	Snapshot { reply: oneshot::Sender<StatsSnapshot> },
}

impl std::fmt::Debug for StatsMsg {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			StatsMsg::Record(rec) => write!(f, "Record({:?})", rec),
			StatsMsg::Snapshot { .. } => write!(f, "Snapshot"),
		}
	}
}

/// State owned by the statistics actor
pub struct StatsTracker {
	counters: StatsSnapshot,
	thresholds: NotifyThresholds,
	membership: MembershipHandle,
	notifier: Arc<Notifier>,
}

impl StatsTracker {
	pub fn new(
		thresholds: NotifyThresholds,
		membership: MembershipHandle,
		notifier: Arc<Notifier>,
	) -> Self {
		Self { counters: StatsSnapshot::default(), thresholds, membership, notifier }
	}

	async fn record(&mut self, rec: OutcomeRecord) {
		let Some(code) = TrackedCode::from_status(rec.code) else {
			// Not interesting: redirects, websocket upgrades, ...
			return;
		};

		let count = self.counters.bump(code);
		if count % self.thresholds.for_code(code).get() == 0 {
			self.sample(code, count, &rec);
		}

		if code.escalates() {
			self.escalate(&rec, code).await;
		}
	}

	fn sample(&self, code: TrackedCode, count: u64, rec: &OutcomeRecord) {
		let line = if code == TrackedCode::Forbidden {
			// Also names the latest offender
			let when = chrono::Local::now().format("%d %b %y %H:%M %z");
			format!(
				"[{}] {} count is {}. Last blocked was {} requesting \"{}\"",
				when,
				code.label(),
				self.notifier.mark(count),
				rec.client,
				rec.uri
			)
		} else {
			format!("{} count is {}", code.label(), self.notifier.mark(count))
		};
		self.notifier.emit(&line);
	}

	async fn escalate(&self, rec: &OutcomeRecord, code: TrackedCode) {
		let reason = code.strike_reason().unwrap_or(code.label());
		match self.membership.strike(&rec.client).await {
			Ok(StrikeOutcome::Counted(n)) => {
				debug!("Strike {} for {} ({})", n, rec.client, rec.code);
				self.notifier.emit(&format!(
					"IP address {} received a strike: {} for URI \"{}\"",
					self.notifier.mark(&rec.client),
					reason,
					rec.uri
				));
			}
			// The membership tracker already announced the ban
			Ok(StrikeOutcome::Blacklisted { .. }) => {}
			Err(err) => warn!("Could not record strike for {}: {}", rec.client, err),
		}
	}

	async fn run(mut self, rx: Receiver<StatsMsg>, cancel: CancellationToken) {
		debug!("stats tracker started");
		loop {
			let msg = tokio::select! {
				biased;
				() = cancel.cancelled() => break,
				msg = rx.recv_async() => match msg {
					Ok(msg) => msg,
					Err(_) => break,
				},
			};
			match msg {
				StatsMsg::Record(rec) => self.record(rec).await,
				StatsMsg::Snapshot { reply } => {
					let _ = reply.send(self.counters);
				}
			}
		}
		debug!("stats tracker stopped");
	}

	/// Start the actor loop on the current runtime
	pub(crate) fn spawn(
		self,
		capacity: usize,
		cancel: CancellationToken,
	) -> (StatsHandle, JoinHandle<()>) {
		let (tx, rx) = flume::bounded(capacity);
		let task = tokio::spawn(self.run(rx, cancel));
		(StatsHandle { tx }, task)
	}
}

/// Cloneable sender side of the statistics actor
#[derive(Clone, Debug)]
pub struct StatsHandle {
	tx: Sender<StatsMsg>,
}

impl StatsHandle {
	/// Queue an outcome. Waits only while the mailbox is full.
	pub async fn record(&self, rec: OutcomeRecord) -> ClResult<()> {
		self.tx.send_async(StatsMsg::Record(rec)).await.map_err(|_| Error::ActorStopped(ACTOR))
	}

	/// Counters after every previously queued outcome has been processed
	pub async fn snapshot(&self) -> ClResult<StatsSnapshot> {
		let (reply, rx) = oneshot::channel();
		self.tx
			.send_async(StatsMsg::Snapshot { reply })
			.await
			.map_err(|_| Error::ActorStopped(ACTOR))?;
		rx.await.map_err(|_| Error::ActorStopped(ACTOR))
	}
}


// vim: ts=4
