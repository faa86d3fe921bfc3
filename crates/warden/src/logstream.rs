use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::types::TailRead;

/// Size of the suffix returned by log retrieval commands.
pub const TAIL_WINDOW: u64 = 8192;

const LINE_TERMINATOR: &[u8] = b"\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
	Stdout,
	Stderr,
}

impl StreamKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			StreamKind::Stdout => "stdout",
			StreamKind::Stderr => "stderr",
		}
	}
}

/// Append-only log file for one output stream of a managed process.
///
/// The file handle sits in a single slot behind a mutex. Capture tasks write
/// through it and `clear` swaps it, so a writer never sees a handle mid-swap.
/// A `None` slot means capture is disabled after an I/O failure.
#[derive(Clone)]
pub struct LogStream {
	path: PathBuf,
	process: String,
	kind: StreamKind,
	slot: Arc<Mutex<Option<File>>>,
}

impl LogStream {
	pub fn open(path: PathBuf, process: &str, kind: StreamKind) -> Self {
		let file = match open_append(&path) {
			Ok(f) => Some(f),
			Err(e) => {
				tracing::warn!(
					process = %process,
					stream = kind.as_str(),
					"failed to open {}: {}, capture disabled",
					path.display(),
					e
				);
				None
			}
		};

		Self {
			path,
			process: process.to_string(),
			kind,
			slot: Arc::new(Mutex::new(file)),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn kind(&self) -> StreamKind {
		self.kind
	}

	pub async fn is_open(&self) -> bool {
		self.slot.lock().await.is_some()
	}

	/// Append one line plus CRLF and flush. On failure the stream stops capturing.
	pub async fn write_line(&self, line: &[u8]) {
		let mut slot = self.slot.lock().await;
		let Some(file) = slot.as_mut() else {
			return;
		};

		let result = file
			.write_all(line)
			.and_then(|_| file.write_all(LINE_TERMINATOR))
			.and_then(|_| file.flush());

		if let Err(e) = result {
			tracing::warn!(
				process = %self.process,
				stream = self.kind.as_str(),
				"write to {} failed: {}, capture disabled",
				self.path.display(),
				e
			);
			*slot = None;
		}
	}

	/// Truncate the file to zero length and reopen it for append.
	///
	/// If truncation fails the old handle is kept. If the reopen fails the slot
	/// is left empty; a later successful clear re-enables capture.
	pub async fn clear(&self) -> io::Result<()> {
		let mut slot = self.slot.lock().await;

		if let Some(file) = slot.as_mut() {
			let _ = file.flush();
		}

		OpenOptions::new()
			.write(true)
			.create(true)
			.truncate(true)
			.open(&self.path)?;

		// Drop the old handle first so a failed reopen leaves capture disabled.
		*slot = None;
		*slot = Some(open_append(&self.path)?);
		Ok(())
	}

	pub fn tail(&self) -> TailRead {
		match read_tail(&self.path, TAIL_WINDOW) {
			Ok(text) => TailRead::Text(text),
			Err(e) => {
				tracing::warn!(
					process = %self.process,
					stream = self.kind.as_str(),
					"failed to read {}: {}",
					self.path.display(),
					e
				);
				TailRead::Unreadable
			}
		}
	}

	pub async fn close(&self) {
		let mut slot = self.slot.lock().await;
		if let Some(mut file) = slot.take() {
			let _ = file.flush();
			tracing::debug!(process = %self.process, stream = self.kind.as_str(), "log closed");
		}
	}
}

fn open_append(path: &Path) -> io::Result<File> {
	if let Some(parent) = path.parent() {
		if !parent.as_os_str().is_empty() {
			std::fs::create_dir_all(parent)?;
		}
	}
	OpenOptions::new().create(true).append(true).open(path)
}

/// Return the last `window` bytes of the file as text.
///
/// The cut can land inside a multi-byte character; those bytes decode lossily.
pub fn read_tail(path: &Path, window: u64) -> io::Result<String> {
	let mut file = File::open(path)?;
	let len = file.metadata()?.len();

	if len == 0 {
		return Ok(String::new());
	}

	let (offset, size) = if len >= window { (len - window, window) } else { (0, len) };
	file.seek(SeekFrom::Start(offset))?;

	let mut buf = vec![0u8; size as usize];
	file.read_exact(&mut buf)?;
	Ok(String::from_utf8_lossy(&buf).into_owned())
}
