use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::UnixListener;
use tokio::sync::{mpsc, watch};
use warden::{ChannelNotifier, Command, Config, Event, Supervisor};
use warden_ipc::{ConnectionId, Hub, RuntimePaths};

use crate::protocol::{Request, Response};

/// Run the supervisor in the foreground with the socket transport attached.
pub async fn run(config: Config, paths: &RuntimePaths) -> anyhow::Result<()> {
	paths
		.prepare()
		.with_context(|| format!("failed to prepare {}", paths.state_dir().display()))?;

	let socket_path = paths.socket_path();
	let listener = match UnixListener::bind(&socket_path) {
		Ok(l) => l,
		Err(e) => {
			paths.cleanup();
			return Err(e).with_context(|| format!("failed to bind socket {}", socket_path.display()));
		}
	};

	let hub: Arc<Hub<Response>> = Arc::new(Hub::new());
	let (notifier, events) = ChannelNotifier::new();
	let (supervisor, commands) = Supervisor::new(&config, Arc::new(notifier));

	let router = tokio::spawn(route_events(events, Arc::clone(&hub)));

	let handler_hub = Arc::clone(&hub);
	let server = tokio::spawn(warden_ipc::run_socket_server(
		listener,
		Arc::clone(&hub),
		move |id: ConnectionId, request: Request| {
			let hub = Arc::clone(&handler_hub);
			let commands = commands.clone();
			async move { handle_request(id, request, &hub, &commands).await }
		},
		|message: String| Response::Error { message },
	));

	let (shutdown_tx, shutdown_rx) = watch::channel(false);
	let supervision = tokio::spawn(supervisor.run(shutdown_rx));

	tracing::info!(
		pid = std::process::id(),
		processes = config.processes.len(),
		"daemon listening on {}",
		socket_path.display()
	);

	wait_for_shutdown_signal().await;
	tracing::info!("shutting down");

	server.abort();
	let _ = shutdown_tx.send(true);
	if let Err(e) = supervision.await {
		tracing::error!("supervision loop failed: {}", e);
	}
	router.abort();
	paths.cleanup();
	Ok(())
}

async fn handle_request(
	id: ConnectionId,
	request: Request,
	hub: &Hub<Response>,
	commands: &mpsc::Sender<Command>,
) -> Option<Response> {
	match request {
		Request::Ping => Some(Response::Pong),
		Request::Subscribe => {
			hub.subscribe(id);
			Some(Response::Subscribed)
		}
		Request::Command { kind, target, content } => {
			let mut command = Command::new(kind, target, id);
			command.content = content;
			match commands.send(command).await {
				Ok(()) => None,
				Err(_) => Some(Response::Error {
					message: "supervisor is shutting down".to_string(),
				}),
			}
		}
	}
}

/// Status goes to every subscriber, replies only to the connection that asked.
async fn route_events(mut events: mpsc::UnboundedReceiver<Event>, hub: Arc<Hub<Response>>) {
	while let Some(event) = events.recv().await {
		match event {
			Event::Status(_) => {
				hub.broadcast(Response::from(event));
			}
			Event::Reply(ref reply) => {
				let to = reply.reply_to;
				hub.send_to(to, Response::from(event));
			}
		}
	}
}

async fn wait_for_shutdown_signal() {
	use tokio::signal::unix::{signal, SignalKind};

	let mut terminate = match signal(SignalKind::terminate()) {
		Ok(s) => s,
		Err(e) => {
			tracing::warn!("cannot listen for SIGTERM: {}", e);
			let _ = tokio::signal::ctrl_c().await;
			return;
		}
	};

	tokio::select! {
		_ = tokio::signal::ctrl_c() => {},
		_ = terminate.recv() => {},
	}
}

/// Install the fmt subscriber at `level`, falling back to info.
pub fn init_tracing(level: &str) {
	let parsed = match level.parse::<tracing::Level>() {
		Ok(l) => l,
		Err(_) => {
			eprintln!("unknown log level '{}', using info", level);
			tracing::Level::INFO
		}
	};
	tracing_subscriber::fmt()
		.with_max_level(parsed)
		.with_target(false)
		.init();
}

pub fn config_summary(path: &Path, config: &Config) -> String {
	format!(
		"{}: {} process{}, check every {}ms",
		path.display(),
		config.processes.len(),
		if config.processes.len() == 1 { "" } else { "es" },
		config.supervisor.check_interval().as_millis()
	)
}
