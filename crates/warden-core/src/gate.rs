//! Request gate
//!
//! Per-request entry point: asks the membership tracker whether the client
//! may pass, forwards or rejects, and reports exactly one outcome per request
//! to the statistics tracker.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::http::{Response, StatusCode};
use axum::response::IntoResponse;

use crate::membership::{MembershipHandle, StrikeOutcome};
use crate::notifier::Notifier;
use crate::prelude::*;
use crate::stats::StatsHandle;

/// Absolute-URI request targets are a known scanner signature
const HOSTILE_PREFIXES: [&str; 2] = ["http:", "https:"];

pub fn is_hostile_target(target: &str) -> bool {
	HOSTILE_PREFIXES.iter().any(|prefix| target.starts_with(prefix))
}

/// Anything the downstream handler produces that carries a status code
pub trait Outcome {
	fn status(&self) -> u16;
}

impl Outcome for StatusCode {
	fn status(&self) -> u16 {
		self.as_u16()
	}
}

impl Outcome for u16 {
	fn status(&self) -> u16 {
		*self
	}
}

impl<B> Outcome for Response<B> {
	fn status(&self) -> u16 {
		Response::status(self).as_u16()
	}
}

/// A failed handler counts as an internal error
impl<T: Outcome, E> Outcome for Result<T, E> {
	fn status(&self) -> u16 {
		match self {
			Ok(outcome) => outcome.status(),
			Err(_) => StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
		}
	}
}

/// A request turned away by the gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
	pub client: ClientId,
	pub message: String,
}

impl Rejection {
	pub fn new(client: ClientId) -> Self {
		let message =
			format!("IP address {} was blacklisted: too many previous response code errors", client);
		Self { client, message }
	}

	pub fn status(&self) -> StatusCode {
		StatusCode::FORBIDDEN
	}
}

impl std::fmt::Display for Rejection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.message)
	}
}

impl IntoResponse for Rejection {
	fn into_response(self) -> axum::response::Response {
		let body = serde_json::json!({
			"error": {
				"code": "E-WARDEN-BLOCKED",
				"message": self.message,
				"details": {
					"client": self.client
				}
			}
		});
		(StatusCode::FORBIDDEN, Json(body)).into_response()
	}
}

#[derive(Clone, Debug)]
pub struct Gate {
	membership: MembershipHandle,
	stats: StatsHandle,
	notifier: Arc<Notifier>,
	reject_delay: Duration,
}

impl Gate {
	pub(crate) fn new(
		membership: MembershipHandle,
		stats: StatsHandle,
		notifier: Arc<Notifier>,
		reject_delay: Duration,
	) -> Self {
		Self { membership, stats, notifier, reject_delay }
	}

	/// Admit or reject one request.
	///
	/// `next` runs the downstream handler and is only called for admitted
	/// requests; its outcome is returned unchanged.
	pub async fn intercept<F, Fut, T>(
		&self,
		client: &ClientId,
		target: &str,
		next: F,
	) -> Result<T, Rejection>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = T>,
		T: Outcome,
	{
		// Presumed guilty until the handler says otherwise
		let mut record = OutcomeRecord::forbidden(client.clone(), target);

		let mut allowed = match self.membership.check(client).await {
			Ok(allowed) => allowed,
			Err(err) => {
				error!("Membership check failed for {}: {}", client, err);
				false
			}
		};

		// Strikes even whitelisted clients; the whitelist only covers the check above
		if is_hostile_target(target) {
			allowed = false;
			match self.membership.strike(client).await {
				Ok(StrikeOutcome::Counted(_)) => self.notifier.emit(&format!(
					"IP address {} received a strike: invalid request prefix in URI \"{}\"",
					self.notifier.mark(client),
					target
				)),
				Ok(StrikeOutcome::Blacklisted { .. }) => {}
				Err(err) => error!("Could not record strike for {}: {}", client, err),
			}
		}

		if !allowed {
			debug!("Rejecting {} requesting {}", client, target);
			self.submit(record).await;
			if !self.reject_delay.is_zero() {
				tokio::time::sleep(self.reject_delay).await;
			}
			return Err(Rejection::new(client.clone()));
		}

		let outcome = next().await;
		record.code = outcome.status();
		self.submit(record).await;
		Ok(outcome)
	}

	async fn submit(&self, record: OutcomeRecord) {
		if let Err(err) = self.stats.record(record).await {
			error!("Could not report request outcome: {}", err);
		}
	}
}


// vim: ts=4
