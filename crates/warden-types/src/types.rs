//! Client identity, tracked response codes and outcome records

use std::borrow::Borrow;
use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Observed client address, used as an opaque key
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(Box<str>);

impl ClientId {
	/// Id used when the host cannot determine a client address
	pub fn unknown() -> Self {
		Self("unknown".into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for ClientId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl AsRef<str> for ClientId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl Borrow<str> for ClientId {
	fn borrow(&self) -> &str {
		&self.0
	}
}

impl From<&str> for ClientId {
	fn from(id: &str) -> Self {
		Self(id.into())
	}
}

impl From<String> for ClientId {
	fn from(id: String) -> Self {
		Self(id.into_boxed_str())
	}
}

impl From<IpAddr> for ClientId {
	fn from(addr: IpAddr) -> Self {
		Self(addr.to_string().into_boxed_str())
	}
}

/// Response codes the statistics tracker counts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TrackedCode {
	Ok,
	Forbidden,
	NotFound,
	MethodNotAllowed,
	InternalError,
}

impl TrackedCode {
	pub const ALL: [TrackedCode; 5] = [
		TrackedCode::Ok,
		TrackedCode::Forbidden,
		TrackedCode::NotFound,
		TrackedCode::MethodNotAllowed,
		TrackedCode::InternalError,
	];

	/// Map an HTTP status to a tracked code. Anything else (101, 302, ...) is ignored.
	pub fn from_status(status: u16) -> Option<Self> {
		match status {
			200 => Some(TrackedCode::Ok),
			403 => Some(TrackedCode::Forbidden),
			404 => Some(TrackedCode::NotFound),
			405 => Some(TrackedCode::MethodNotAllowed),
			500 => Some(TrackedCode::InternalError),
			_ => None,
		}
	}

	pub fn status(self) -> u16 {
		match self {
			TrackedCode::Ok => 200,
			TrackedCode::Forbidden => 403,
			TrackedCode::NotFound => 404,
			TrackedCode::MethodNotAllowed => 405,
			TrackedCode::InternalError => 500,
		}
	}

	/// Whether an outcome with this code earns the client a strike
	pub fn escalates(self) -> bool {
		matches!(
			self,
			TrackedCode::NotFound | TrackedCode::MethodNotAllowed | TrackedCode::InternalError
		)
	}

	/// Name used in notification lines
	pub fn label(self) -> &'static str {
		match self {
			TrackedCode::Ok => "StatusOK",
			TrackedCode::Forbidden => "StatusForbidden",
			TrackedCode::NotFound => "StatusNotFound",
			TrackedCode::MethodNotAllowed => "MethodNotAllowed",
			TrackedCode::InternalError => "StatusInternalServerError",
		}
	}

	/// Strike reason for escalating codes
	pub fn strike_reason(self) -> Option<&'static str> {
		match self {
			TrackedCode::NotFound => Some("StatusNotFound error"),
			TrackedCode::MethodNotAllowed => Some("MethodNotAllowed"),
			TrackedCode::InternalError => Some("StatusInternalServerError"),
			TrackedCode::Ok | TrackedCode::Forbidden => None,
		}
	}
}

/// Final outcome of one request, consumed once by the statistics tracker
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutcomeRecord {
	pub code: u16,
	pub client: ClientId,
	pub uri: Box<str>,
}

impl OutcomeRecord {
	/// A record presumed to be a rejection until the request proves otherwise
	pub fn forbidden(client: ClientId, uri: impl Into<Box<str>>) -> Self {
		Self { code: 403, client, uri: uri.into() }
	}
}


// vim: ts=4
