//! Diagnostic notifier
//!
//! Formats and emits one-line notices through a pluggable sink. Sink writes
//! are synchronous: they run inside whichever actor emits, so a slow sink
//! stalls that actor's loop.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::prelude::*;

const RED: &str = "\x1b[38;5;160m"; // Red3
const YEL: &str = "\x1b[38;5;143m"; // DarkKhaki
const RST: &str = "\x1b[0m";

/// Name written into every file sink line
const SINK_TAG: &str = "warden";

/// Destination of notification lines
pub trait Sink: Send + Sync {
	fn write_line(&self, line: &str) -> io::Result<()>;
}

impl<F> Sink for F
where
	F: Fn(&str) -> io::Result<()> + Send + Sync,
{
	fn write_line(&self, line: &str) -> io::Result<()> {
		self(line)
	}
}

/// Writes each line to stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl Sink for ConsoleSink {
	fn write_line(&self, line: &str) -> io::Result<()> {
		let mut out = io::stdout().lock();
		writeln!(out, "{}", line)
	}
}

/// Appends timestamped lines to a file
#[derive(Debug)]
pub struct FileSink {
	file: Mutex<File>,
}

impl FileSink {
	pub fn open(path: impl AsRef<Path>) -> ClResult<Self> {
		let mut opts = OpenOptions::new();
		opts.append(true).create(true);
		#[cfg(unix)]
		{
			use std::os::unix::fs::OpenOptionsExt;
			opts.mode(0o600);
		}
		let file = opts.open(path.as_ref())?;
		Ok(Self { file: Mutex::new(file) })
	}
}

impl Sink for FileSink {
	fn write_line(&self, line: &str) -> io::Result<()> {
		let ts = chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
		let msg = format!("[{}] [{}] {}\n", ts, SINK_TAG, line);
		self.file.lock().write_all(msg.as_bytes())
	}
}

/// Emits diagnostic lines, optionally with ANSI highlighting
pub struct Notifier {
	sink: Arc<dyn Sink>,
	color: AtomicBool,
}

impl Notifier {
	pub fn new(sink: Arc<dyn Sink>) -> Self {
		Self { sink, color: AtomicBool::new(false) }
	}

	pub fn console() -> Self {
		Self::new(Arc::new(ConsoleSink))
	}

	pub fn color_on(&self) {
		self.color.store(true, Ordering::Relaxed);
	}

	pub fn color_off(&self) {
		self.color.store(false, Ordering::Relaxed);
	}

	pub fn is_color(&self) -> bool {
		self.color.load(Ordering::Relaxed)
	}

	/// Highlight for a freshly blacklisted client
	pub fn alert(&self, value: impl std::fmt::Display) -> String {
		self.wrap(RED, value)
	}

	/// Highlight for a client that received a strike, or a running count
	pub fn mark(&self, value: impl std::fmt::Display) -> String {
		self.wrap(YEL, value)
	}

	fn wrap(&self, color: &str, value: impl std::fmt::Display) -> String {
		if self.is_color() { format!("{}{}{}", color, value, RST) } else { value.to_string() }
	}

	/// Write one line to the sink. A sink failure aborts the process.
	pub fn emit(&self, line: &str) {
		tracing::debug!(target: "warden::notify", "{}", line);
		if let Err(err) = self.sink.write_line(line) {
			error!("notification sink failed, aborting: {}", err);
			std::process::abort();
		}
	}
}

impl Default for Notifier {
	fn default() -> Self {
		Self::console()
	}
}

impl std::fmt::Debug for Notifier {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Notifier").field("color", &self.is_color()).finish_non_exhaustive()
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;

	/// Notifier writing into a shared buffer
	pub(crate) fn capture() -> (Arc<Notifier>, Arc<Mutex<Vec<String>>>) {
		let lines = Arc::new(Mutex::new(Vec::new()));
		let sink_lines = lines.clone();
		let sink = move |line: &str| -> io::Result<()> {
			sink_lines.lock().push(line.to_string());
			Ok(())
		};
		(Arc::new(Notifier::new(Arc::new(sink))), lines)
	}

	#[test]
	fn test_emit_reaches_sink() {
		let (notifier, lines) = capture();
		notifier.emit("StatusOK count is 1000");
		assert_eq!(*lines.lock(), vec!["StatusOK count is 1000".to_string()]);
	}

	#[test]
	fn test_color_toggle() {
		let (notifier, _) = capture();
		assert_eq!(notifier.alert("1.2.3.4"), "1.2.3.4");
		assert_eq!(notifier.mark(7), "7");

		notifier.color_on();
		assert_eq!(notifier.alert("1.2.3.4"), "\x1b[38;5;160m1.2.3.4\x1b[0m");
		assert_eq!(notifier.mark(7), "\x1b[38;5;143m7\x1b[0m");

		notifier.color_off();
		assert_eq!(notifier.mark("x"), "x");
	}

	#[test]
	fn test_file_sink_appends() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("warden-log.txt");
		let notifier = Notifier::new(Arc::new(FileSink::open(&path).unwrap()));
		notifier.emit("first");
		notifier.emit("second");

		let content = std::fs::read_to_string(&path).unwrap();
		let lines: Vec<&str> = content.lines().collect();
		assert_eq!(lines.len(), 2);
		assert!(lines[0].starts_with('['));
		assert!(lines[0].ends_with("] [warden] first"));
		assert!(lines[1].ends_with("] [warden] second"));
	}

	#[cfg(unix)]
	#[test]
	fn test_file_sink_mode() {
		use std::os::unix::fs::PermissionsExt;

		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("private.txt");
		let _sink = FileSink::open(&path).unwrap();
		let mode = std::fs::metadata(&path).unwrap().permissions().mode();
		assert_eq!(mode & 0o777, 0o600);
	}
}

// vim: ts=4
