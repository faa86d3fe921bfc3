use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};

use crate::config::ProcessConfig;
use crate::error::SupervisorError;
use crate::logstream::{LogStream, StreamKind};
use crate::types::{CommandKind, CommandOutcome, StatusSnapshot};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Owns the lifecycle of one configured process.
///
/// The tracked child is only trusted after `resolve()` has polled it, since
/// the process can exit (or be killed from outside) between ticks.
pub struct ProcessExecutor {
	config: ProcessConfig,
	working_dir: PathBuf,
	stop_timeout: Duration,
	stdout: Option<LogStream>,
	stderr: Option<LogStream>,
	child: Option<Child>,
	pid: u32,
	started_at: Option<Instant>,
	manual_stop: bool,
	autostart_pending: bool,
	launches: u64,
}

impl ProcessExecutor {
	pub fn new(config: ProcessConfig, base_dir: &Path, stop_timeout: Duration) -> Self {
		let stdout = config
			.stdout_path(base_dir)
			.map(|path| LogStream::open(path, &config.name, StreamKind::Stdout));
		let stderr = config
			.stderr_path(base_dir)
			.map(|path| LogStream::open(path, &config.name, StreamKind::Stderr));

		Self {
			working_dir: config.working_dir(base_dir),
			manual_stop: !config.autostart,
			autostart_pending: config.autostart,
			config,
			stop_timeout,
			stdout,
			stderr,
			child: None,
			pid: 0,
			started_at: None,
			launches: 0,
		}
	}

	pub fn name(&self) -> &str {
		&self.config.name
	}

	pub fn is_manual_stop(&self) -> bool {
		self.manual_stop
	}

	/// Last known pid, 0 when nothing is tracked.
	pub fn tracked_pid(&self) -> u32 {
		self.pid
	}

	/// Number of successful launches since construction.
	pub fn launch_count(&self) -> u64 {
		self.launches
	}

	pub fn stdout_log(&self) -> Option<&LogStream> {
		self.stdout.as_ref()
	}

	pub fn stderr_log(&self) -> Option<&LogStream> {
		self.stderr.as_ref()
	}

	/// Poll tick: relaunch or park the process depending on policy.
	pub async fn execute(&mut self) -> StatusSnapshot {
		if self.manual_stop {
			return self.snapshot();
		}

		if self.resolve().is_some() {
			return self.snapshot();
		}

		if self.autostart_pending || self.config.autorestart {
			return self.start().await;
		}

		tracing::info!(
			process = %self.config.name,
			"not running and autorestart is off, waiting for an explicit start"
		);
		self.manual_stop = true;
		self.snapshot()
	}

	pub async fn execute_command(&mut self, kind: CommandKind, _content: Option<&str>) -> CommandOutcome {
		match kind {
			CommandKind::Start => {
				self.manual_stop = false;
				CommandOutcome::Status(self.start().await)
			}
			CommandKind::Stop => {
				self.manual_stop = true;
				CommandOutcome::Status(self.stop().await)
			}
			CommandKind::Restart => {
				self.manual_stop = false;
				self.stop().await;
				CommandOutcome::Status(self.start().await)
			}
			CommandKind::Status => {
				self.resolve();
				CommandOutcome::Status(self.snapshot())
			}
			CommandKind::LastLogs => match &self.stdout {
				Some(stream) => CommandOutcome::Logs(stream.tail()),
				None => CommandOutcome::Nothing,
			},
			CommandKind::LastErrorLogs => match &self.stderr {
				Some(stream) => CommandOutcome::Logs(stream.tail()),
				None => CommandOutcome::Nothing,
			},
			CommandKind::ClearLogs => {
				self.clear_logs().await;
				CommandOutcome::Nothing
			}
		}
	}

	/// Launch unless a live process is already tracked.
	pub async fn start(&mut self) -> StatusSnapshot {
		self.autostart_pending = false;

		if let Some(pid) = self.resolve() {
			tracing::debug!(process = %self.config.name, pid, "already running");
			return self.snapshot();
		}

		tracing::info!(process = %self.config.name, "starting {}", self.config.command.display());
		match self.launch().await {
			Ok(pid) => tracing::info!(process = %self.config.name, pid, "started"),
			Err(e) => {
				tracing::error!(process = %self.config.name, "{}", e);
				self.forget();
			}
		}
		self.snapshot()
	}

	/// Kill the tracked process tree and wait (bounded) for it to exit.
	pub async fn stop(&mut self) -> StatusSnapshot {
		let Some(pid) = self.resolve() else {
			tracing::info!(process = %self.config.name, "already stopped");
			return self.snapshot();
		};

		tracing::info!(process = %self.config.name, pid, "stopping");
		if let Err(e) = self.terminate(pid).await {
			tracing::error!(process = %self.config.name, "{}", e);
		}

		self.resolve();
		self.snapshot()
	}

	/// Snapshot of the tracked state, without polling the OS.
	pub fn snapshot(&self) -> StatusSnapshot {
		match (&self.child, self.started_at) {
			(Some(_), Some(started_at)) if self.pid != 0 => {
				StatusSnapshot::running(&self.config.name, self.pid, started_at.elapsed())
			}
			_ => StatusSnapshot::stopped(&self.config.name),
		}
	}

	/// Flush and close the log streams. The child, if any, is left running.
	pub async fn dispose(&mut self) {
		for stream in [&self.stdout, &self.stderr].into_iter().flatten() {
			stream.close().await;
		}
	}

	/// Re-check the tracked child. Exited and unknown both count as not running.
	fn resolve(&mut self) -> Option<u32> {
		let child = self.child.as_mut()?;

		match child.try_wait() {
			Ok(None) => Some(self.pid),
			Ok(Some(status)) => {
				tracing::info!(process = %self.config.name, pid = self.pid, "exited ({})", status);
				self.forget();
				None
			}
			Err(e) => {
				tracing::warn!(process = %self.config.name, pid = self.pid, "failed to poll: {}", e);
				self.forget();
				None
			}
		}
	}

	fn forget(&mut self) {
		self.child = None;
		self.pid = 0;
		self.started_at = None;
	}

	async fn launch(&mut self) -> Result<u32, SupervisorError> {
		let capture_stdout = capturing(&self.stdout).await;
		let capture_stderr = capturing(&self.stderr).await;

		let mut cmd = Command::new(&self.config.command);
		cmd.args(&self.config.args)
			.current_dir(&self.working_dir)
			.env_clear()
			.envs(resolve_environment(std::env::vars_os(), &self.config.env))
			.stdin(Stdio::null())
			.stdout(if capture_stdout { Stdio::piped() } else { Stdio::inherit() })
			.stderr(if capture_stderr { Stdio::piped() } else { Stdio::inherit() });

		// Own process group, so stop can take down the whole tree.
		#[cfg(unix)]
		cmd.process_group(0);
		#[cfg(windows)]
		cmd.creation_flags(CREATE_NO_WINDOW);

		let mut child = cmd.spawn().map_err(|source| SupervisorError::Launch {
			name: self.config.name.clone(),
			command: self.config.command.clone(),
			source,
		})?;

		if let (Some(out), Some(stream)) = (child.stdout.take(), self.stdout.clone()) {
			tokio::spawn(capture_lines(out, stream));
		}
		if let (Some(err), Some(stream)) = (child.stderr.take(), self.stderr.clone()) {
			tokio::spawn(capture_lines(err, stream));
		}

		let pid = child.id().unwrap_or(0);
		self.pid = pid;
		self.child = Some(child);
		self.started_at = Some(Instant::now());
		self.launches += 1;
		Ok(pid)
	}

	async fn terminate(&mut self, pid: u32) -> Result<(), SupervisorError> {
		let timeout = self.stop_timeout;
		let name = self.config.name.clone();

		let Some(child) = self.child.as_mut() else {
			return Ok(());
		};

		if let Err(e) = kill_process_tree(pid) {
			tracing::warn!(process = %name, pid, "failed to signal process tree: {}", e);
			let _ = child.start_kill();
		}

		match tokio::time::timeout(timeout, child.wait()).await {
			Ok(Ok(status)) => {
				tracing::info!(process = %name, pid, "stopped ({})", status);
				self.forget();
				Ok(())
			}
			Ok(Err(e)) => Err(SupervisorError::Termination {
				name,
				pid,
				reason: e.to_string(),
			}),
			Err(_) => Err(SupervisorError::Termination {
				name,
				pid,
				reason: format!("still running after {}ms", timeout.as_millis()),
			}),
		}
	}

	async fn clear_logs(&self) {
		for stream in [&self.stdout, &self.stderr].into_iter().flatten() {
			match stream.clear().await {
				Ok(()) => tracing::info!(
					process = %self.config.name,
					stream = stream.kind().as_str(),
					"cleared {}",
					stream.path().display()
				),
				Err(source) => {
					let err = SupervisorError::LogIo {
						path: stream.path().to_path_buf(),
						source,
					};
					tracing::warn!(process = %self.config.name, "clear failed: {}", err);
				}
			}
		}
	}
}

async fn capturing(stream: &Option<LogStream>) -> bool {
	match stream {
		Some(stream) => stream.is_open().await,
		None => false,
	}
}

async fn capture_lines<R: AsyncRead + Unpin>(reader: R, stream: LogStream) {
	let mut reader = BufReader::new(reader);
	let mut line = Vec::new();

	loop {
		line.clear();
		match reader.read_until(b'\n', &mut line).await {
			Ok(0) => break,
			Ok(_) => {
				while matches!(line.last(), Some(b'\n' | b'\r')) {
					line.pop();
				}
				stream.write_line(&line).await;
			}
			Err(e) => {
				tracing::debug!(stream = stream.kind().as_str(), "capture ended: {}", e);
				break;
			}
		}
	}
}

/// Apply an overlay to an inherited environment: `Some` sets, `None` removes.
pub fn resolve_environment<I>(
	inherited: I,
	overlay: &BTreeMap<String, Option<String>>,
) -> BTreeMap<OsString, OsString>
where
	I: IntoIterator<Item = (OsString, OsString)>,
{
	let mut env: BTreeMap<OsString, OsString> = inherited.into_iter().collect();
	for (key, value) in overlay {
		match value {
			Some(value) => {
				env.insert(OsString::from(key), OsString::from(value));
			}
			None => {
				env.remove(OsStr::new(key));
			}
		}
	}
	env
}

#[cfg(unix)]
fn kill_process_tree(pid: u32) -> std::io::Result<()> {
	use nix::sys::signal::{killpg, Signal};
	use nix::unistd::Pid;
	killpg(Pid::from_raw(pid as i32), Signal::SIGKILL).map_err(std::io::Error::from)
}

#[cfg(windows)]
fn kill_process_tree(pid: u32) -> std::io::Result<()> {
	let status = std::process::Command::new("taskkill")
		.args(["/PID", &pid.to_string(), "/T", "/F"])
		.stdout(Stdio::null())
		.stderr(Stdio::null())
		.status()?;
	if status.success() {
		Ok(())
	} else {
		Err(std::io::Error::new(
			std::io::ErrorKind::Other,
			format!("taskkill exited with {}", status),
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn os(pairs: &[(&str, &str)]) -> Vec<(OsString, OsString)> {
		pairs.iter().map(|(k, v)| (OsString::from(k), OsString::from(v))).collect()
	}

	#[test]
	fn overlay_sets_overrides_and_removes() {
		let base = os(&[("A", "1"), ("B", "2")]);
		let mut overlay = BTreeMap::new();
		overlay.insert("A".to_string(), Some("3".to_string()));
		overlay.insert("B".to_string(), None);
		overlay.insert("C".to_string(), Some("4".to_string()));

		let env = resolve_environment(base, &overlay);
		assert_eq!(env.get(OsStr::new("A")), Some(&OsString::from("3")));
		assert_eq!(env.get(OsStr::new("C")), Some(&OsString::from("4")));
		assert!(!env.contains_key(OsStr::new("B")));
		assert_eq!(env.len(), 2);
	}

	#[test]
	fn removing_absent_variable_is_harmless() {
		let mut overlay = BTreeMap::new();
		overlay.insert("MISSING".to_string(), None);
		let env = resolve_environment(os(&[("KEEP", "yes")]), &overlay);
		assert_eq!(env.len(), 1);
		assert!(env.contains_key(OsStr::new("KEEP")));
	}

	#[test]
	fn autostart_off_starts_latched() {
		let mut config = ProcessConfig::new("idle", "/bin/true");
		config.autostart = false;
		let exec = ProcessExecutor::new(config, Path::new("/tmp"), Duration::from_secs(1));
		assert!(exec.is_manual_stop());
		assert_eq!(exec.tracked_pid(), 0);
		assert!(!exec.snapshot().running);
	}

	#[test]
	fn no_log_paths_means_no_streams() {
		let exec = ProcessExecutor::new(
			ProcessConfig::new("quiet", "/bin/true"),
			Path::new("/tmp"),
			Duration::from_secs(1),
		);
		assert!(exec.stdout_log().is_none());
		assert!(exec.stderr_log().is_none());
	}
}
