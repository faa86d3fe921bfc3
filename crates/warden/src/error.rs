use std::path::PathBuf;

/// Failures raised while supervising a single managed process.
///
/// None of these abort the supervision loop: the executor logs them and
/// reports a snapshot, the dispatcher turns `UnknownTarget` into a reply.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
	#[error("failed to launch {name} ({command}): {source}")]
	Launch {
		name: String,
		command: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to terminate {name} (pid {pid}): {reason}")]
	Termination { name: String, pid: u32, reason: String },

	#[error("log file {path}: {source}")]
	LogIo {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("unknown target: {0}")]
	UnknownTarget(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("failed to read {path}: {source}")]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse {path}: {source}")]
	Parse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("invalid configuration: {0}")]
	Invalid(String),
}
