//! # warden
//!
//! Process supervision engine.
//!
//! Keeps a fixed set of configured programs alive, restarts them on exit when
//! policy allows, appends their output to log files, and answers commands
//! (start, stop, restart, status, log tail, log clear) arriving on a queue.
//! Results leave through a [`Notifier`]: status snapshots are broadcast,
//! log tails and errors go back to the requester only.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use warden::{ChannelNotifier, Command, CommandKind, Config, ProcessConfig, Supervisor};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let mut config = Config::default();
//! let mut web = ProcessConfig::new("web", "/usr/bin/python3");
//! web.args = vec!["-m".into(), "http.server".into()];
//! web.stdout_file = Some("/tmp/web.out.log".into());
//! config.processes.push(web);
//!
//! let (notifier, mut events) = ChannelNotifier::new();
//! let (supervisor, commands) = Supervisor::new(&config, Arc::new(notifier));
//! let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let handle = tokio::spawn(supervisor.run(shutdown_rx));
//!
//! commands.send(Command::new(CommandKind::Status, "web", 1)).await.unwrap();
//! println!("{:?}", events.recv().await);
//!
//! let _ = shutdown_tx.send(true);
//! handle.await.unwrap();
//! # }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod logstream;
pub mod notify;
pub mod supervisor;
pub mod types;

pub use config::{load_config, Config, ProcessConfig};
pub use error::{ConfigError, SupervisorError};
pub use executor::ProcessExecutor;
pub use logstream::LogStream;
pub use notify::{ChannelNotifier, Notifier};
pub use supervisor::Supervisor;
pub use types::*;
