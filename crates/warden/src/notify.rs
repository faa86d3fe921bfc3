use tokio::sync::mpsc;

use crate::types::{Event, Reply, StatusSnapshot};

/// Outbound seam of the engine. Implementations deliver `broadcast` to every
/// observer and `reply` only to the requester named by `reply.reply_to`.
pub trait Notifier: Send + Sync {
	fn broadcast(&self, status: StatusSnapshot);
	fn reply(&self, reply: Reply);
}

/// Forwards both channels into one ordered event stream for a transport to fan out.
#[derive(Clone)]
pub struct ChannelNotifier {
	tx: mpsc::UnboundedSender<Event>,
}

impl ChannelNotifier {
	pub fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
		let (tx, rx) = mpsc::unbounded_channel();
		(Self { tx }, rx)
	}

	fn send(&self, event: Event) {
		if self.tx.send(event).is_err() {
			tracing::debug!("event dropped, no receiver");
		}
	}
}

impl Notifier for ChannelNotifier {
	fn broadcast(&self, status: StatusSnapshot) {
		self.send(Event::Status(status));
	}

	fn reply(&self, reply: Reply) {
		self.send(Event::Reply(reply));
	}
}
