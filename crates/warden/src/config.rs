use crate::error::ConfigError;
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::ALL_TARGET;

/// Floor for the poll interval, so a typo in the config can't turn the loop into a busy spin.
pub const MIN_CHECK_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
	#[serde(default)]
	pub supervisor: SupervisorConfig,
	#[serde(default)]
	pub logging: LoggingConfig,
	#[serde(default, rename = "process")]
	pub processes: Vec<ProcessConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorConfig {
	#[serde(default = "default_check_interval")]
	pub check_interval_ms: u64,
	#[serde(default = "default_stop_timeout")]
	pub stop_timeout_ms: u64,
	#[serde(default, deserialize_with = "optional_path")]
	pub base_dir: Option<PathBuf>,
}

impl Default for SupervisorConfig {
	fn default() -> Self {
		Self {
			check_interval_ms: default_check_interval(),
			stop_timeout_ms: default_stop_timeout(),
			base_dir: None,
		}
	}
}

fn default_check_interval() -> u64 {
	1000
}
fn default_stop_timeout() -> u64 {
	10_000
}

impl SupervisorConfig {
	pub fn check_interval(&self) -> Duration {
		Duration::from_millis(self.check_interval_ms).max(MIN_CHECK_INTERVAL)
	}

	pub fn stop_timeout(&self) -> Duration {
		Duration::from_millis(self.stop_timeout_ms)
	}

	/// Directory that relative paths resolve against and that processes without
	/// a `directory` run in. Falls back to the directory holding the executable.
	pub fn base_dir(&self) -> PathBuf {
		if let Some(dir) = &self.base_dir {
			return dir.clone();
		}
		std::env::current_exe()
			.ok()
			.and_then(|exe| exe.parent().map(Path::to_path_buf))
			.unwrap_or_else(|| PathBuf::from("."))
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
	#[serde(default = "default_level")]
	pub level: String,
}

impl Default for LoggingConfig {
	fn default() -> Self {
		Self { level: default_level() }
	}
}

fn default_level() -> String {
	"info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessConfig {
	pub name: String,
	pub command: PathBuf,
	#[serde(default)]
	pub args: Vec<String>,
	#[serde(default, deserialize_with = "optional_path")]
	pub directory: Option<PathBuf>,
	/// `None` removes the inherited variable, `Some` sets or overrides it.
	#[serde(default, deserialize_with = "env_overlay")]
	pub env: BTreeMap<String, Option<String>>,
	#[serde(default, deserialize_with = "optional_path")]
	pub stdout_file: Option<PathBuf>,
	#[serde(default, deserialize_with = "optional_path")]
	pub stderr_file: Option<PathBuf>,
	#[serde(default = "default_true")]
	pub autostart: bool,
	#[serde(default = "default_true")]
	pub autorestart: bool,
}

fn default_true() -> bool {
	true
}

impl ProcessConfig {
	pub fn new(name: impl Into<String>, command: impl Into<PathBuf>) -> Self {
		Self {
			name: name.into(),
			command: command.into(),
			args: Vec::new(),
			directory: None,
			env: BTreeMap::new(),
			stdout_file: None,
			stderr_file: None,
			autostart: true,
			autorestart: true,
		}
	}

	pub fn working_dir(&self, base_dir: &Path) -> PathBuf {
		match &self.directory {
			Some(dir) => resolve(base_dir, dir),
			None => base_dir.to_path_buf(),
		}
	}

	pub fn stdout_path(&self, base_dir: &Path) -> Option<PathBuf> {
		self.stdout_file.as_deref().map(|p| resolve(base_dir, p))
	}

	pub fn stderr_path(&self, base_dir: &Path) -> Option<PathBuf> {
		self.stderr_file.as_deref().map(|p| resolve(base_dir, p))
	}
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
	if path.is_absolute() {
		path.to_path_buf()
	} else {
		base_dir.join(path)
	}
}

fn optional_path<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<PathBuf>, D::Error> {
	let raw = Option::<String>::deserialize(deserializer)?;
	Ok(raw.filter(|s| !s.trim().is_empty()).map(PathBuf::from))
}

fn env_overlay<'de, D: Deserializer<'de>>(
	deserializer: D,
) -> Result<BTreeMap<String, Option<String>>, D::Error> {
	let raw = BTreeMap::<String, Option<String>>::deserialize(deserializer)?;
	Ok(raw
		.into_iter()
		.map(|(key, value)| (key, value.filter(|v| !v.is_empty())))
		.collect())
}

impl Config {
	/// Structural checks only. Whether `command` exists is discovered at launch time.
	pub fn validate(&self) -> Result<(), ConfigError> {
		let mut seen = HashSet::new();
		for process in &self.processes {
			let name = process.name.trim();
			if name.is_empty() {
				return Err(ConfigError::Invalid("process with empty name".into()));
			}
			if name == ALL_TARGET {
				return Err(ConfigError::Invalid(format!("{} is reserved", ALL_TARGET)));
			}
			if !seen.insert(process.name.as_str()) {
				return Err(ConfigError::Invalid(format!("duplicate process name: {}", process.name)));
			}
			if process.command.as_os_str().is_empty() {
				return Err(ConfigError::Invalid(format!("{}: empty command", process.name)));
			}
		}
		Ok(())
	}
}

pub fn parse_config(content: &str, origin: &Path) -> Result<Config, ConfigError> {
	let config: Config = toml::from_str(content).map_err(|source| ConfigError::Parse {
		path: origin.to_path_buf(),
		source,
	})?;
	config.validate()?;
	Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
	let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
		path: path.to_path_buf(),
		source,
	})?;
	parse_config(&content, path)
}

#[cfg(test)]
mod tests {
	use super::*;

	const SAMPLE: &str = r#"
[supervisor]
check_interval_ms = 200
base_dir = "/srv/warden"

[[process]]
name = "api"
command = "/usr/local/bin/api"
args = ["--port", "8080"]
stdout_file = "logs/api.out.log"
stderr_file = ""

[process.env]
RUST_LOG = "debug"
HTTP_PROXY = ""

[[process]]
name = "worker"
command = "worker"
directory = "/var/lib/worker"
autorestart = false
"#;

	fn parse(content: &str) -> Result<Config, ConfigError> {
		parse_config(content, Path::new("test.toml"))
	}

	#[test]
	fn parses_processes_in_order() {
		let config = parse(SAMPLE).unwrap();
		let names: Vec<&str> = config.processes.iter().map(|p| p.name.as_str()).collect();
		assert_eq!(names, vec!["api", "worker"]);
		assert_eq!(config.processes[0].args, vec!["--port", "8080"]);
		assert!(config.processes[0].autostart);
		assert!(config.processes[0].autorestart);
		assert!(!config.processes[1].autorestart);
	}

	#[test]
	fn empty_env_value_means_remove() {
		let config = parse(SAMPLE).unwrap();
		let env = &config.processes[0].env;
		assert_eq!(env.get("RUST_LOG"), Some(&Some("debug".to_string())));
		assert_eq!(env.get("HTTP_PROXY"), Some(&None));
	}

	#[test]
	fn empty_log_path_disables_capture() {
		let config = parse(SAMPLE).unwrap();
		let api = &config.processes[0];
		let base = Path::new("/srv/warden");
		assert_eq!(api.stdout_path(base), Some(base.join("logs/api.out.log")));
		assert_eq!(api.stderr_path(base), None);
	}

	#[test]
	fn working_dir_defaults_to_base_dir() {
		let config = parse(SAMPLE).unwrap();
		let base = config.supervisor.base_dir();
		assert_eq!(base, PathBuf::from("/srv/warden"));
		assert_eq!(config.processes[0].working_dir(&base), base);
		assert_eq!(config.processes[1].working_dir(&base), PathBuf::from("/var/lib/worker"));
	}

	#[test]
	fn check_interval_is_clamped() {
		let mut supervisor = SupervisorConfig::default();
		supervisor.check_interval_ms = 10;
		assert_eq!(supervisor.check_interval(), Duration::from_millis(50));
		supervisor.check_interval_ms = 200;
		assert_eq!(supervisor.check_interval(), Duration::from_millis(200));
		supervisor.check_interval_ms = 0;
		assert_eq!(supervisor.check_interval(), MIN_CHECK_INTERVAL);
	}

	#[test]
	fn defaults_when_sections_missing() {
		let config = parse("").unwrap();
		assert!(config.processes.is_empty());
		assert_eq!(config.supervisor.check_interval_ms, 1000);
		assert_eq!(config.supervisor.stop_timeout(), Duration::from_secs(10));
		assert_eq!(config.logging.level, "info");
	}

	#[test]
	fn rejects_duplicate_names() {
		let content = r#"
[[process]]
name = "a"
command = "/bin/true"

[[process]]
name = "a"
command = "/bin/false"
"#;
		let err = parse(content).unwrap_err();
		assert!(err.to_string().contains("duplicate process name: a"), "{}", err);
	}

	#[test]
	fn rejects_reserved_and_empty_names() {
		let reserved = "[[process]]\nname = \"[all]\"\ncommand = \"/bin/true\"\n";
		assert!(matches!(parse(reserved), Err(ConfigError::Invalid(_))));

		let empty = "[[process]]\nname = \" \"\ncommand = \"/bin/true\"\n";
		assert!(matches!(parse(empty), Err(ConfigError::Invalid(_))));
	}

	#[test]
	fn parse_error_carries_path() {
		let err = parse("[[process]]\nname = 3\n").unwrap_err();
		assert!(matches!(err, ConfigError::Parse { .. }));
		assert!(err.to_string().contains("test.toml"));
	}

	#[test]
	fn missing_file_is_read_error() {
		let err = load_config(Path::new("/nonexistent/warden.toml")).unwrap_err();
		assert!(matches!(err, ConfigError::Read { .. }));
	}
}
