use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;

pub type ConnectionId = u64;

struct Peer<Ev> {
	outbox: mpsc::UnboundedSender<Ev>,
	subscribed: bool,
}

/// Registry of live connections and their outboxes.
///
/// `send_to` reaches one peer, `broadcast` reaches every subscribed peer.
/// Sending to a peer that has gone away is a no-op.
pub struct Hub<Ev> {
	next_id: AtomicU64,
	peers: Mutex<HashMap<ConnectionId, Peer<Ev>>>,
}

impl<Ev: Clone> Hub<Ev> {
	pub fn new() -> Self {
		Self {
			next_id: AtomicU64::new(1),
			peers: Mutex::new(HashMap::new()),
		}
	}

	pub fn register(&self) -> (ConnectionId, mpsc::UnboundedReceiver<Ev>) {
		let id = self.next_id.fetch_add(1, Ordering::SeqCst);
		let (outbox, rx) = mpsc::unbounded_channel();
		self.peers().insert(
			id,
			Peer {
				outbox,
				subscribed: false,
			},
		);
		(id, rx)
	}

	pub fn unregister(&self, id: ConnectionId) {
		self.peers().remove(&id);
	}

	/// Opt a connection into broadcasts. False if the connection is gone.
	pub fn subscribe(&self, id: ConnectionId) -> bool {
		match self.peers().get_mut(&id) {
			Some(peer) => {
				peer.subscribed = true;
				true
			}
			None => false,
		}
	}

	pub fn send_to(&self, id: ConnectionId, event: Ev) -> bool {
		match self.peers().get(&id) {
			Some(peer) => peer.outbox.send(event).is_ok(),
			None => {
				tracing::debug!(connection = id, "dropping event for closed connection");
				false
			}
		}
	}

	/// Returns how many subscribers the event was queued for.
	pub fn broadcast(&self, event: Ev) -> usize {
		let peers = self.peers();
		peers
			.values()
			.filter(|peer| peer.subscribed)
			.filter(|peer| peer.outbox.send(event.clone()).is_ok())
			.count()
	}

	pub fn len(&self) -> usize {
		self.peers().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn peers(&self) -> MutexGuard<'_, HashMap<ConnectionId, Peer<Ev>>> {
		self.peers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}
}

impl<Ev: Clone> Default for Hub<Ev> {
	fn default() -> Self {
		Self::new()
	}
}
