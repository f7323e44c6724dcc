//! Error types
//!
//! Policy rejections are not errors: a denied client is an ordinary result of
//! the gate. The variants here cover configuration problems, sink I/O and
//! talking to an actor that is no longer running.

use axum::{Json, http::StatusCode, response::IntoResponse};

pub type ClResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	/// The named actor's mailbox or reply channel is closed
	ActorStopped(&'static str),
	/// Invalid configuration value
	ConfigError(String),

	// externals
	Io(std::io::Error),
	Yaml(serde_yaml::Error),
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Self::Io(err)
	}
}

impl From<serde_yaml::Error> for Error {
	fn from(err: serde_yaml::Error) -> Self {
		Self::Yaml(err)
	}
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Error::ActorStopped(name) => write!(f, "{} actor is not running", name),
			Error::ConfigError(msg) => write!(f, "configuration error: {}", msg),
			Error::Io(err) => write!(f, "I/O error: {}", err),
			Error::Yaml(err) => write!(f, "config parse error: {}", err),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Error::Io(err) => Some(err),
			Error::Yaml(err) => Some(err),
			_ => None,
		}
	}
}

impl IntoResponse for Error {
	fn into_response(self) -> axum::response::Response {
		tracing::error!("internal error: {}", self);
		let body = serde_json::json!({
			"error": {
				"code": "E-INTERNAL",
				"message": "Internal server error"
			}
		});
		(StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
	}
}


// vim: ts=4
