//! Minimal host for the Warden engine: a small axum app behind the admission layer.
//!
//! Environment:
//! - `WARDEN_CONFIG`: YAML config file (defaults are used when unset)
//! - `WARDEN_LISTEN`: listen address, default `127.0.0.1:8080`
//! - `RUST_LOG`: tracing filter

use std::env;
use std::io::IsTerminal;
use std::net::SocketAddr;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tracing::info;
use warden_core::{EngineBuilder, WardenConfig};
use warden_types::error::ClResult;

#[tokio::main]
async fn main() -> ClResult<()> {
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_target(false)
		.init();

	let config = match env::var("WARDEN_CONFIG") {
		Ok(path) => {
			info!("Loading config from {}", path);
			WardenConfig::load(path).await?
		}
		Err(_) => WardenConfig::default(),
	};
	let listen = env::var("WARDEN_LISTEN").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

	let engine = EngineBuilder::from_config(config).start()?;
	if !std::io::stdout().is_terminal() {
		// Keep escape codes out of redirected output
		engine.notifier().color_off();
	}

	let app = Router::new()
		.route("/", get(|| async { "Hello from behind the warden\n" }))
		.route("/health", get(|| async { StatusCode::OK }))
		.route("/fail", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
		.fallback(|| async { StatusCode::NOT_FOUND })
		.layer(engine.layer());

	let listener = tokio::net::TcpListener::bind(&listen).await?;
	info!("Listening on {} ({:?} mode)", listen, engine.mode());
	axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
		.with_graceful_shutdown(async {
			let _ = tokio::signal::ctrl_c().await;
		})
		.await?;

	engine.stop().await;
	Ok(())
}

// vim: ts=4
