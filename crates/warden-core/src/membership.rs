//! Membership tracker
//!
//! Single-owner actor holding the whitelist, the blacklist and the per-client
//! strike counters. All reads and writes go through its mailbox and are
//! handled one at a time in arrival order, so no lock guards the maps.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use flume::{Receiver, Sender};
use futures::channel::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::WardenConfig;
use crate::notifier::Notifier;
use crate::prelude::*;

const ACTOR: &str = "membership";

/// Result of recording a strike
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrikeOutcome {
	/// Strike counted; holds the counter after this write
	Counted(u32),
	/// The client is at the threshold and on the blacklist; holds the blacklist size
	Blacklisted { total: usize },
}

/// Membership details of a single client
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClientStatus {
	pub strikes: u32,
	pub blacklisted: bool,
	pub whitelisted: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MembershipStats {
	pub whitelisted: usize,
	pub blacklisted: usize,
	/// Clients with a strike counter
	pub tracked: usize,
}

#[derive(Debug, Clone, Copy)]
struct BanEntry {
	created_at: Instant,
	/// None = permanent
	expires_at: Option<Instant>,
}

impl BanEntry {
	fn is_expired(&self, now: Instant) -> bool {
		self.expires_at.is_some_and(|exp| now >= exp)
	}
}

pub(crate) enum MembershipMsg {
	Check { id: ClientId, reply: oneshot::Sender<bool> },
	Strike { id: ClientId, reply: oneshot::Sender<StrikeOutcome> },
	Inspect { id: ClientId, reply: oneshot::Sender<ClientStatus> },
	Stats { reply: oneshot::Sender<MembershipStats> },
}

/// State owned by the membership actor
pub struct MembershipTracker {
	whitelist: HashSet<ClientId>,
	blacklist: HashMap<ClientId, BanEntry>,
	strikes: HashMap<ClientId, u32>,
	strike_threshold: u32,
	blacklist_ttl: Option<Duration>,
	notifier: Arc<Notifier>,
}

impl MembershipTracker {
	/// Seed the whitelist and the initial blacklist from the config
	pub fn new(config: &WardenConfig, notifier: Arc<Notifier>) -> Self {
		let now = Instant::now();
		let whitelist = config.whitelist.iter().cloned().collect();
		let blacklist = config
			.blacklist
			.iter()
			.map(|id| (id.clone(), BanEntry { created_at: now, expires_at: None }))
			.collect();

		Self {
			whitelist,
			blacklist,
			strikes: HashMap::new(),
			strike_threshold: config.strike_threshold,
			blacklist_ttl: config.blacklist_ttl,
			notifier,
		}
	}

	/// Whitelisted clients are always allowed, blacklisted ones never
	pub fn read_check(&mut self, id: &ClientId) -> bool {
		if self.whitelist.contains(id) {
			return true;
		}
		self.purge_expired(id);
		!self.blacklist.contains_key(id)
	}

	/// Record one strike against a client.
	///
	/// The first strike only creates the counter, so with a threshold of N
	/// the client is blacklisted by strike N + 1. Every strike past that
	/// re-adds the client and announces the ban again.
	pub fn strike(&mut self, id: &ClientId) -> StrikeOutcome {
		self.purge_expired(id);

		let Some(&count) = self.strikes.get(id) else {
			self.strikes.insert(id.clone(), 1);
			return StrikeOutcome::Counted(1);
		};

		if count >= self.strike_threshold {
			let now = Instant::now();
			let expires_at = self.blacklist_ttl.map(|ttl| now + ttl);
			// An existing ban keeps its original expiry
			self.blacklist.entry(id.clone()).or_insert(BanEntry { created_at: now, expires_at });
			let total = self.blacklist.len();
			info!("Blacklisted {} after {} strikes", id, count);
			self.notifier.emit(&format!(
				"IP address {} was blacklisted: too many previous response code errors; {} address(es) on the blacklist",
				self.notifier.alert(id),
				total
			));
			return StrikeOutcome::Blacklisted { total };
		}

		let count = count.saturating_add(1);
		self.strikes.insert(id.clone(), count);
		StrikeOutcome::Counted(count)
	}

	pub fn inspect(&mut self, id: &ClientId) -> ClientStatus {
		self.purge_expired(id);
		ClientStatus {
			strikes: self.strikes.get(id).copied().unwrap_or(0),
			blacklisted: self.blacklist.contains_key(id),
			whitelisted: self.whitelist.contains(id),
		}
	}

	pub fn stats(&self) -> MembershipStats {
		MembershipStats {
			whitelisted: self.whitelist.len(),
			blacklisted: self.blacklist.len(),
			tracked: self.strikes.len(),
		}
	}

	/// Drop an expired ban together with the strikes that led to it
	fn purge_expired(&mut self, id: &ClientId) {
		let now = Instant::now();
		if self.blacklist.get(id).is_some_and(|ban| ban.is_expired(now)) {
			if let Some(ban) = self.blacklist.remove(id) {
				debug!("Ban on {} expired after {:?}", id, now.duration_since(ban.created_at));
			}
			self.strikes.remove(id);
		}
	}

	fn handle(&mut self, msg: MembershipMsg) {
		// A dropped reply receiver only means the caller went away
		match msg {
			MembershipMsg::Check { id, reply } => {
				let _ = reply.send(self.read_check(&id));
			}
			MembershipMsg::Strike { id, reply } => {
				let _ = reply.send(self.strike(&id));
			}
			MembershipMsg::Inspect { id, reply } => {
				let _ = reply.send(self.inspect(&id));
			}
			MembershipMsg::Stats { reply } => {
				let _ = reply.send(self.stats());
			}
		}
	}

	async fn run(mut self, rx: Receiver<MembershipMsg>, cancel: CancellationToken) {
		debug!("membership tracker started");
		loop {
			let msg = tokio::select! {
				biased;
				() = cancel.cancelled() => break,
				msg = rx.recv_async() => match msg {
					Ok(msg) => msg,
					Err(_) => break,
				},
			};
			self.handle(msg);
		}
		debug!("membership tracker stopped");
	}

	/// Start the actor loop on the current runtime
	pub(crate) fn spawn(
		self,
		capacity: usize,
		cancel: CancellationToken,
	) -> (MembershipHandle, JoinHandle<()>) {
		let (tx, rx) = flume::bounded(capacity);
		let task = tokio::spawn(self.run(rx, cancel));
		(MembershipHandle { tx }, task)
	}
}

/// Cloneable sender side of the membership actor
#[derive(Clone, Debug)]
pub struct MembershipHandle {
	tx: Sender<MembershipMsg>,
}

impl std::fmt::Debug for MembershipMsg {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			MembershipMsg::Check { id, .. } => write!(f, "Check({})", id),
			MembershipMsg::Strike { id, .. } => write!(f, "Strike({})", id),
			MembershipMsg::Inspect { id, .. } => write!(f, "Inspect({})", id),
			MembershipMsg::Stats { .. } => write!(f, "Stats"),
		}
	}
}

impl MembershipHandle {
	async fn request<T>(
		&self,
		make: impl FnOnce(oneshot::Sender<T>) -> MembershipMsg,
	) -> ClResult<T> {
		let (reply, rx) = oneshot::channel();
		self.tx.send_async(make(reply)).await.map_err(|_| Error::ActorStopped(ACTOR))?;
		rx.await.map_err(|_| Error::ActorStopped(ACTOR))
	}

	/// Is this client allowed?
	pub async fn check(&self, id: &ClientId) -> ClResult<bool> {
		self.request(|reply| MembershipMsg::Check { id: id.clone(), reply }).await
	}

	pub async fn strike(&self, id: &ClientId) -> ClResult<StrikeOutcome> {
		self.request(|reply| MembershipMsg::Strike { id: id.clone(), reply }).await
	}

	pub async fn inspect(&self, id: &ClientId) -> ClResult<ClientStatus> {
		self.request(|reply| MembershipMsg::Inspect { id: id.clone(), reply }).await
	}

	pub async fn stats(&self) -> ClResult<MembershipStats> {
		self.request(|reply| MembershipMsg::Stats { reply }).await
	}
}


// vim: ts=4
