//! Common test utilities and helpers
//!
//! Engine builders with a capturing notification sink.

#![allow(dead_code)]

use std::io;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use warden_core::{Engine, EngineBuilder};

pub type Lines = Arc<Mutex<Vec<String>>>;

/// Builder with zero reject delay and a sink collecting every notice
pub fn builder() -> (EngineBuilder, Lines) {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();

	let lines: Lines = Arc::new(Mutex::new(Vec::new()));
	let sink_lines = lines.clone();
	let mut builder = Engine::builder();
	builder.reject_delay(Duration::ZERO).sink(Arc::new(move |line: &str| -> io::Result<()> {
		sink_lines.lock().push(line.to_string());
		Ok(())
	}));
	(builder, lines)
}

pub fn engine() -> (Engine, Lines) {
	let (builder, lines) = builder();
	(builder.start().unwrap(), lines)
}

// vim: ts=4
