use std::future::Future;
use std::sync::Arc;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

use crate::hub::{ConnectionId, Hub};

/// Accept connections until the listener fails for good.
///
/// Each line a peer sends is parsed as `Req` and passed to `handler` with the
/// peer's id. A `Some` result goes straight back to that peer; anything else
/// the daemon wants to say goes through `hub`. Lines that fail to parse are
/// answered with `on_invalid(message)`.
pub async fn run_socket_server<Req, Ev, F, Fut, E>(
	listener: UnixListener,
	hub: Arc<Hub<Ev>>,
	handler: F,
	on_invalid: E,
) where
	Req: DeserializeOwned + Send + 'static,
	Ev: Serialize + Clone + Send + 'static,
	F: Fn(ConnectionId, Req) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Option<Ev>> + Send,
	E: Fn(String) -> Ev + Send + Sync + 'static,
{
	let handler = Arc::new(handler);
	let on_invalid = Arc::new(on_invalid);

	loop {
		let (stream, _) = match listener.accept().await {
			Ok(s) => s,
			Err(e) => {
				tracing::error!("accept error: {}", e);
				continue;
			}
		};

		let hub = Arc::clone(&hub);
		let handler = Arc::clone(&handler);
		let on_invalid = Arc::clone(&on_invalid);
		tokio::spawn(async move {
			handle_connection::<Req, Ev, _, _, _>(stream, hub, handler, on_invalid).await;
		});
	}
}

async fn handle_connection<Req, Ev, F, Fut, E>(
	stream: UnixStream,
	hub: Arc<Hub<Ev>>,
	handler: Arc<F>,
	on_invalid: Arc<E>,
) where
	Req: DeserializeOwned + Send + 'static,
	Ev: Serialize + Clone + Send + 'static,
	F: Fn(ConnectionId, Req) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Option<Ev>> + Send,
	E: Fn(String) -> Ev + Send + Sync + 'static,
{
	let (id, mut outbox) = hub.register();
	tracing::debug!(connection = id, "client connected");

	let (reader, mut writer) = stream.into_split();
	let writer_task = tokio::spawn(async move {
		while let Some(event) = outbox.recv().await {
			let mut data = match serde_json::to_vec(&event) {
				Ok(d) => d,
				Err(e) => {
					tracing::error!("failed to serialize event: {}", e);
					continue;
				}
			};
			data.push(b'\n');

			if writer.write_all(&data).await.is_err() {
				break;
			}
		}
	});

	let mut lines = BufReader::new(reader).lines();
	while let Ok(Some(line)) = lines.next_line().await {
		if line.trim().is_empty() {
			continue;
		}

		let response = match serde_json::from_str::<Req>(&line) {
			Ok(request) => handler(id, request).await,
			Err(e) => {
				tracing::warn!(connection = id, "invalid request: {}", e);
				Some(on_invalid(format!("invalid request: {}", e)))
			}
		};

		if let Some(response) = response {
			hub.send_to(id, response);
		}
	}

	// Dropping the outbox sender lets the writer drain what is queued and exit.
	hub.unregister(id);
	let _ = writer_task.await;
	tracing::debug!(connection = id, "client disconnected");
}
