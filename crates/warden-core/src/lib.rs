//! Warden admission-control engine.
//!
//! Observes the outcome of every served request, counts strikes against
//! clients that produce scanner-like responses, and blacklists repeat
//! offenders. State lives in two actors, the membership tracker and the
//! statistics tracker, each owning its maps and serving one message at a
//! time. The [`gate::Gate`] is the per-request entry point; the
//! [`middleware::AdmissionLayer`] plugs it into an axum router.
//!
//! ```no_run
//! # async fn demo() -> warden_types::error::ClResult<()> {
//! use std::time::Duration;
//!
//! let engine = warden_core::Engine::builder()
//! 	.whitelist(["127.0.0.1"])
//! 	.reject_delay(Duration::from_secs(3))
//! 	.start()?;
//! let app: axum::Router = axum::Router::new()
//! 	.route("/", axum::routing::get(|| async { "hello" }))
//! 	.layer(engine.layer());
//! # let _ = app;
//! # Ok(())
//! # }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
pub mod extract;
pub mod gate;
pub mod membership;
pub mod middleware;
pub mod notifier;
pub mod prelude;
pub mod stats;

pub use config::{NotifyThresholds, WardenConfig};
pub use engine::{Engine, EngineBuilder};
pub use extract::ServerMode;
pub use gate::{Gate, Outcome, Rejection};
pub use membership::{ClientStatus, MembershipHandle, MembershipStats, StrikeOutcome};
pub use middleware::AdmissionLayer;
pub use notifier::{ConsoleSink, FileSink, Notifier, Sink};
pub use stats::{StatsHandle, StatsSnapshot};

// vim: ts=4
