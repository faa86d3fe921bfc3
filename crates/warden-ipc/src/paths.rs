use std::path::{Path, PathBuf};

/// Where a daemon keeps its socket and pid file.
#[derive(Debug, Clone)]
pub struct RuntimePaths {
	state_dir: PathBuf,
}

impl RuntimePaths {
	/// `$XDG_STATE_HOME/<app>`, else `~/.local/state/<app>`, else `/tmp/<app>`.
	pub fn for_app(app_name: &str) -> Self {
		let state_dir = if let Ok(dir) = std::env::var("XDG_STATE_HOME") {
			PathBuf::from(dir).join(app_name)
		} else if let Some(home) = home_dir() {
			home.join(".local").join("state").join(app_name)
		} else {
			PathBuf::from("/tmp").join(app_name)
		};
		Self { state_dir }
	}

	pub fn at(state_dir: impl Into<PathBuf>) -> Self {
		Self {
			state_dir: state_dir.into(),
		}
	}

	pub fn state_dir(&self) -> &Path {
		&self.state_dir
	}

	pub fn socket_path(&self) -> PathBuf {
		self.state_dir.join("daemon.sock")
	}

	pub fn pid_path(&self) -> PathBuf {
		self.state_dir.join("daemon.pid")
	}

	/// Create the state dir, record our pid and clear a stale socket.
	pub fn prepare(&self) -> std::io::Result<()> {
		std::fs::create_dir_all(&self.state_dir)?;
		std::fs::write(self.pid_path(), std::process::id().to_string())?;
		let socket_path = self.socket_path();
		if socket_path.exists() {
			std::fs::remove_file(&socket_path)?;
		}
		Ok(())
	}

	pub fn cleanup(&self) {
		let _ = std::fs::remove_file(self.socket_path());
		let _ = std::fs::remove_file(self.pid_path());
	}
}

fn home_dir() -> Option<PathBuf> {
	std::env::var("HOME").ok().map(PathBuf::from)
}
