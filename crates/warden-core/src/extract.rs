//! Client identification
//!
//! Derives the [`ClientId`] and request target the gate works with from an
//! incoming HTTP request.

use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::Request;
use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// How the server is reached by clients
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerMode {
	/// Clients connect directly; the peer address is the client
	#[default]
	Standalone,
	/// Behind a reverse proxy; forwarding headers name the client
	Proxy,
}

/// Extract the client id of a request.
///
/// - Standalone mode: peer IP from `ConnectInfo`
/// - Proxy mode: forwarding headers first, then the peer IP
///
/// Falls back to [`ClientId::unknown`] when no address is available.
pub fn client_id<B>(req: &Request<B>, mode: ServerMode) -> ClientId {
	let addr = match mode {
		ServerMode::Standalone => peer_ip(req),
		ServerMode::Proxy => from_xff(req)
			.or_else(|| from_x_real_ip(req))
			.or_else(|| from_forwarded(req))
			.or_else(|| peer_ip(req)),
	};
	addr.map_or_else(ClientId::unknown, ClientId::from)
}

/// The request target as received: `/path?query`, or the full URI for
/// absolute-form requests such as `GET http://example.com/ HTTP/1.1`
pub fn request_target<B>(req: &Request<B>) -> String {
	req.uri().to_string()
}

fn peer_ip<B>(req: &Request<B>) -> Option<IpAddr> {
	req.extensions().get::<ConnectInfo<SocketAddr>>().map(|ci| ci.0.ip())
}

/// Leftmost entry of X-Forwarded-For ("client, proxy1, proxy2")
fn from_xff<B>(req: &Request<B>) -> Option<IpAddr> {
	req.headers()
		.get("x-forwarded-for")
		.and_then(|h| h.to_str().ok())
		.and_then(|s| s.split(',').next())
		.and_then(|ip| ip.trim().parse().ok())
}

fn from_x_real_ip<B>(req: &Request<B>) -> Option<IpAddr> {
	req.headers()
		.get("x-real-ip")
		.and_then(|h| h.to_str().ok())
		.and_then(|s| s.trim().parse().ok())
}

/// RFC 7239: `for=192.0.2.60;proto=http` or `for="[2001:db8::1]"`
fn from_forwarded<B>(req: &Request<B>) -> Option<IpAddr> {
	let header = req.headers().get("forwarded")?.to_str().ok()?;
	header
		.split([';', ','])
		.map(str::trim)
		.find_map(|part| {
			let (key, value) = part.split_once('=')?;
			key.eq_ignore_ascii_case("for").then_some(value)
		})
		.map(|value| value.trim_matches('"').trim_start_matches('[').trim_end_matches(']'))
		.and_then(|ip| ip.parse().ok())
}


// vim: ts=4
