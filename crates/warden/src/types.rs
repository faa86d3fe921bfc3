use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Target name that addresses every managed process. An empty target means the same.
pub const ALL_TARGET: &str = "[all]";

/// Identifies the requester a targeted reply goes back to.
pub type ReplyToken = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
	Start,
	Stop,
	Restart,
	Status,
	LastLogs,
	LastErrorLogs,
	ClearLogs,
}

impl CommandKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			CommandKind::Start => "start",
			CommandKind::Stop => "stop",
			CommandKind::Restart => "restart",
			CommandKind::Status => "status",
			CommandKind::LastLogs => "last_logs",
			CommandKind::LastErrorLogs => "last_error_logs",
			CommandKind::ClearLogs => "clear_logs",
		}
	}
}

impl std::fmt::Display for CommandKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
	pub kind: CommandKind,
	#[serde(default)]
	pub target: String,
	/// Opaque payload, carried through but not interpreted.
	#[serde(default)]
	pub content: Option<String>,
	pub reply_to: ReplyToken,
}

impl Command {
	pub fn new(kind: CommandKind, target: impl Into<String>, reply_to: ReplyToken) -> Self {
		Self {
			kind,
			target: target.into(),
			content: None,
			reply_to,
		}
	}

	pub fn targets_all(&self) -> bool {
		self.target.is_empty() || self.target == ALL_TARGET
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
	pub process_name: String,
	pub running: bool,
	pub pid: Option<u32>,
	pub uptime_secs: Option<u64>,
	pub display_text: String,
}

impl StatusSnapshot {
	pub fn running(name: &str, pid: u32, uptime: Duration) -> Self {
		Self {
			process_name: name.to_string(),
			running: true,
			pid: Some(pid),
			uptime_secs: Some(uptime.as_secs()),
			display_text: "Running".to_string(),
		}
	}

	pub fn stopped(name: &str) -> Self {
		Self {
			process_name: name.to_string(),
			running: false,
			pid: None,
			uptime_secs: None,
			display_text: "Stopped".to_string(),
		}
	}

	pub fn uptime(&self) -> Option<Duration> {
		self.uptime_secs.map(Duration::from_secs)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ReplyContent {
	Logs { text: String },
	/// The log file exists in config but could not be read.
	Unreadable,
	/// No log file is configured for the requested stream.
	NotCaptured,
	UnknownTarget,
	Completed { handled: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
	pub reply_to: ReplyToken,
	pub kind: CommandKind,
	pub process_name: String,
	pub content: ReplyContent,
}

/// Everything the engine emits. `Status` goes to every observer, `Reply` only
/// to the requester named by its token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
	Status(StatusSnapshot),
	Reply(Reply),
}

/// Result of a tail read on a log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailRead {
	Text(String),
	Unreadable,
}

/// What `ProcessExecutor::execute_command` hands back to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
	Status(StatusSnapshot),
	Logs(TailRead),
	Nothing,
}

pub fn format_uptime(secs: u64) -> String {
	if secs < 60 {
		format!("{}s", secs)
	} else if secs < 3600 {
		let m = secs / 60;
		let s = secs % 60;
		if s == 0 { format!("{}m", m) } else { format!("{}m{}s", m, s) }
	} else if secs < 86400 {
		let h = secs / 3600;
		let m = (secs % 3600) / 60;
		if m == 0 { format!("{}h", h) } else { format!("{}h{}m", h, m) }
	} else {
		let d = secs / 86400;
		let h = (secs % 86400) / 3600;
		if h == 0 { format!("{}d", d) } else { format!("{}d{}h", d, h) }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_and_all_targets_match_everything() {
		assert!(Command::new(CommandKind::Status, "", 1).targets_all());
		assert!(Command::new(CommandKind::Status, ALL_TARGET, 1).targets_all());
		assert!(!Command::new(CommandKind::Status, "api", 1).targets_all());
	}

	#[test]
	fn status_event_wire_shape() {
		let event = Event::Status(StatusSnapshot::running("api", 42, Duration::from_secs(90)));
		let json = serde_json::to_value(&event).unwrap();
		assert_eq!(json["type"], "status");
		assert_eq!(json["process_name"], "api");
		assert_eq!(json["pid"], 42);
		assert_eq!(json["uptime_secs"], 90);
		assert_eq!(json["display_text"], "Running");
	}

	#[test]
	fn reply_event_wire_shape() {
		let event = Event::Reply(Reply {
			reply_to: 7,
			kind: CommandKind::LastErrorLogs,
			process_name: "api".into(),
			content: ReplyContent::Unreadable,
		});
		let json = serde_json::to_value(&event).unwrap();
		assert_eq!(json["type"], "reply");
		assert_eq!(json["kind"], "last_error_logs");
		assert_eq!(json["content"]["result"], "unreadable");
	}

	#[test]
	fn stopped_snapshot_has_no_pid() {
		let snap = StatusSnapshot::stopped("api");
		assert!(!snap.running);
		assert_eq!(snap.pid, None);
		assert_eq!(snap.uptime(), None);
	}

	#[test]
	fn uptime_formatting() {
		assert_eq!(format_uptime(5), "5s");
		assert_eq!(format_uptime(120), "2m");
		assert_eq!(format_uptime(125), "2m5s");
		assert_eq!(format_uptime(3600), "1h");
		assert_eq!(format_uptime(3720), "1h2m");
		assert_eq!(format_uptime(90000), "1d1h");
	}
}
