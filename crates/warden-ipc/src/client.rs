use std::io::{self, BufRead, BufReader, Write};
use std::marker::PhantomData;
use std::os::unix::net::UnixStream;
use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};

use crate::paths::RuntimePaths;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
	#[error("daemon not running")]
	NotRunning,
	#[error("connection closed by daemon")]
	Closed,
	#[error("io error: {0}")]
	Io(#[from] io::Error),
	#[error("serialize error: {0}")]
	Serialize(String),
	#[error("deserialize error: {0}")]
	Deserialize(String),
}

/// Blocking client for a line-delimited JSON daemon.
///
/// Unlike a strict request/response client, `recv` can be called any number of
/// times: the daemon may push several events for one request, or events
/// nobody asked for once subscribed.
pub struct DaemonClient<Req, Ev> {
	writer: UnixStream,
	reader: BufReader<UnixStream>,
	_phantom: PhantomData<(Req, Ev)>,
}

impl<Req, Ev> DaemonClient<Req, Ev>
where
	Req: Serialize,
	Ev: DeserializeOwned,
{
	/// Returns `Err(ClientError::NotRunning)` if nothing is listening.
	pub fn connect(paths: &RuntimePaths) -> Result<Self, ClientError> {
		let stream = UnixStream::connect(paths.socket_path()).map_err(|_| ClientError::NotRunning)?;
		let reader = BufReader::new(stream.try_clone()?);
		Ok(Self {
			writer: stream,
			reader,
			_phantom: PhantomData,
		})
	}

	pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<(), ClientError> {
		self.writer.set_read_timeout(timeout)?;
		Ok(())
	}

	pub fn send(&mut self, request: &Req) -> Result<(), ClientError> {
		let mut data =
			serde_json::to_vec(request).map_err(|e| ClientError::Serialize(e.to_string()))?;
		data.push(b'\n');
		self.writer.write_all(&data)?;
		Ok(())
	}

	/// Block for the next event.
	pub fn recv(&mut self) -> Result<Ev, ClientError> {
		let mut line = String::new();
		if self.reader.read_line(&mut line)? == 0 {
			return Err(ClientError::Closed);
		}
		serde_json::from_str(&line).map_err(|e| ClientError::Deserialize(e.to_string()))
	}

	/// Send a request and return the first event that comes back.
	pub fn request(&mut self, request: &Req) -> Result<Ev, ClientError> {
		self.send(request)?;
		self.recv()
	}
}

/// Check if a daemon is running (socket is connectable).
pub fn is_running(paths: &RuntimePaths) -> bool {
	UnixStream::connect(paths.socket_path()).is_ok()
}

/// Read the PID of a running daemon from its PID file.
pub fn read_pid(paths: &RuntimePaths) -> Option<u32> {
	std::fs::read_to_string(paths.pid_path())
		.ok()
		.and_then(|s| s.trim().parse().ok())
}
