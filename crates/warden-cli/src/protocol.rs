use serde::{Deserialize, Serialize};
use warden::{CommandKind, Event, Reply, StatusSnapshot};

pub const APP_NAME: &str = "warden";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Request {
	Command {
		kind: CommandKind,
		#[serde(default)]
		target: String,
		#[serde(default)]
		content: Option<String>,
	},
	Subscribe,
	Ping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
	Status(StatusSnapshot),
	Reply(Reply),
	Subscribed,
	Pong,
	Error { message: String },
}

impl From<Event> for Response {
	fn from(event: Event) -> Self {
		match event {
			Event::Status(status) => Response::Status(status),
			Event::Reply(reply) => Response::Reply(reply),
		}
	}
}
