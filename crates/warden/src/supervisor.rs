use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use crate::config::Config;
use crate::dispatch;
use crate::executor::ProcessExecutor;
use crate::notify::Notifier;
use crate::types::{Command, StatusSnapshot};

/// Capacity of the inbound command queue.
pub const COMMAND_QUEUE_SIZE: usize = 256;

/// The single loop that polls every managed process and drains commands.
///
/// Executors are owned exclusively by the loop, so liveness checks and
/// termination of one process can never interleave.
pub struct Supervisor {
	executors: Vec<ProcessExecutor>,
	interval: Duration,
	commands: mpsc::Receiver<Command>,
	notifier: Arc<dyn Notifier>,
}

impl Supervisor {
	pub fn new(
		config: &Config,
		notifier: Arc<dyn Notifier>,
	) -> (Self, mpsc::Sender<Command>) {
		let base_dir = config.supervisor.base_dir();
		let stop_timeout = config.supervisor.stop_timeout();
		let executors = config
			.processes
			.iter()
			.cloned()
			.map(|process| ProcessExecutor::new(process, &base_dir, stop_timeout))
			.collect();
		Self::with_executors(executors, config.supervisor.check_interval(), notifier)
	}

	pub fn with_executors(
		executors: Vec<ProcessExecutor>,
		interval: Duration,
		notifier: Arc<dyn Notifier>,
	) -> (Self, mpsc::Sender<Command>) {
		let (tx, rx) = mpsc::channel(COMMAND_QUEUE_SIZE);
		let supervisor = Self {
			executors,
			interval,
			commands: rx,
			notifier,
		};
		(supervisor, tx)
	}

	pub fn interval(&self) -> Duration {
		self.interval
	}

	pub fn executors(&self) -> &[ProcessExecutor] {
		&self.executors
	}

	/// Poll every executor in configured order, stopping early on shutdown.
	pub async fn tick(&mut self, shutdown: &watch::Receiver<bool>) -> Vec<StatusSnapshot> {
		let mut snapshots = Vec::with_capacity(self.executors.len());
		for executor in self.executors.iter_mut() {
			snapshots.push(executor.execute().await);
			if *shutdown.borrow() {
				break;
			}
		}
		snapshots
	}

	pub async fn handle(&mut self, command: Command) {
		tracing::debug!(kind = %command.kind, target = %command.target, "dispatching");
		if let Err(e) = dispatch::dispatch(&mut self.executors, &command, self.notifier.as_ref()).await {
			tracing::warn!(kind = %command.kind, "{}", e);
		}
	}

	/// Run until `shutdown` flips to true (or its sender is dropped), then
	/// dispose every executor.
	pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
		tracing::info!(
			processes = self.executors.len(),
			interval_ms = self.interval.as_millis() as u64,
			"supervision loop started"
		);

		let mut queue_open = true;
		loop {
			if *shutdown.borrow() {
				break;
			}

			self.tick(&shutdown).await;
			if *shutdown.borrow() {
				break;
			}

			if queue_open {
				match self.commands.try_recv() {
					Ok(command) => {
						self.handle(command).await;
						continue;
					}
					Err(mpsc::error::TryRecvError::Empty) => {}
					Err(mpsc::error::TryRecvError::Disconnected) => {
						tracing::debug!("command queue closed");
						queue_open = false;
					}
				}
			}

			tokio::select! {
				_ = tokio::time::sleep(self.interval) => {}
				command = self.commands.recv(), if queue_open => match command {
					Some(command) => self.handle(command).await,
					None => queue_open = false,
				},
				changed = shutdown.changed() => {
					if changed.is_err() {
						break;
					}
				}
			}
		}

		tracing::info!("supervision loop stopping");
		for executor in self.executors.iter_mut() {
			executor.dispose().await;
		}
	}
}
