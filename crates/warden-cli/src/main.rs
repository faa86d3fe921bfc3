mod daemon;
mod protocol;
mod render;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use owo_colors::OwoColorize;
use warden::{CommandKind, ReplyContent, ALL_TARGET};
use warden_ipc::client::{self, DaemonClient};
use warden_ipc::RuntimePaths;

use protocol::{Request, Response, APP_NAME};

#[derive(Parser)]
#[command(name = "warden", version, about = "Keep long-running programs alive")]
struct Cli {
	/// Directory for the daemon socket and pid file
	#[arg(long, global = true)]
	state_dir: Option<PathBuf>,

	#[command(subcommand)]
	command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
	/// Run the supervisor in the foreground
	Run {
		#[arg(short, long, default_value = "warden.toml")]
		config: PathBuf,
		/// Overrides [logging] level from the config
		#[arg(long)]
		log_level: Option<String>,
	},
	/// Validate a config file and list its processes
	Check {
		#[arg(short, long, default_value = "warden.toml")]
		config: PathBuf,
	},
	Start(Target),
	Stop(Target),
	Restart(Target),
	Status(Target),
	/// Show the tail of captured stdout
	Logs(Target),
	/// Show the tail of captured stderr
	Errors(Target),
	/// Truncate captured logs
	Clear(Target),
	/// Print every status change as it happens
	Watch,
	/// Check that the daemon answers
	Ping,
	/// Ask a running daemon to exit
	Shutdown,
}

#[derive(Args)]
struct Target {
	/// Process name, or [all]
	#[arg(default_value = ALL_TARGET)]
	target: String,
}

fn main() {
	let cli = Cli::parse();
	let paths = match &cli.state_dir {
		Some(dir) => RuntimePaths::at(dir),
		None => RuntimePaths::for_app(APP_NAME),
	};

	let result = match cli.command {
		Cmd::Run { config, log_level } => cmd_run(config, log_level, &paths),
		Cmd::Check { config } => cmd_check(config),
		Cmd::Start(t) => cmd_command(&paths, CommandKind::Start, t.target),
		Cmd::Stop(t) => cmd_command(&paths, CommandKind::Stop, t.target),
		Cmd::Restart(t) => cmd_command(&paths, CommandKind::Restart, t.target),
		Cmd::Status(t) => cmd_command(&paths, CommandKind::Status, t.target),
		Cmd::Logs(t) => cmd_command(&paths, CommandKind::LastLogs, t.target),
		Cmd::Errors(t) => cmd_command(&paths, CommandKind::LastErrorLogs, t.target),
		Cmd::Clear(t) => cmd_command(&paths, CommandKind::ClearLogs, t.target),
		Cmd::Watch => cmd_watch(&paths),
		Cmd::Ping => cmd_ping(&paths),
		Cmd::Shutdown => cmd_shutdown(&paths),
	};

	if let Err(e) = result {
		eprintln!("{} {:#}", "error:".red(), e);
		std::process::exit(1);
	}
}

fn cmd_run(config_path: PathBuf, log_level: Option<String>, paths: &RuntimePaths) -> anyhow::Result<()> {
	let config = warden::load_config(&config_path)?;
	daemon::init_tracing(log_level.as_deref().unwrap_or(&config.logging.level));
	tracing::info!("{}", daemon::config_summary(&config_path, &config));

	if client::is_running(paths) {
		bail!("daemon already running (socket {})", paths.socket_path().display());
	}

	let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
	runtime.block_on(daemon::run(config, paths))
}

fn cmd_check(config_path: PathBuf) -> anyhow::Result<()> {
	let config = warden::load_config(&config_path)?;
	println!("{}", daemon::config_summary(&config_path, &config).bold());
	render::print_config(&config);
	Ok(())
}

type Client = DaemonClient<Request, Response>;

fn connect(paths: &RuntimePaths) -> anyhow::Result<Client> {
	Client::connect(paths).with_context(|| {
		format!("cannot reach daemon at {} (is `warden run` up?)", paths.socket_path().display())
	})
}

fn subscribe(client: &mut Client) -> anyhow::Result<()> {
	match client.request(&Request::Subscribe)? {
		Response::Subscribed => Ok(()),
		Response::Error { message } => bail!("{}", message),
		other => bail!("unexpected response: {:?}", other),
	}
}

/// Send one command and print what comes back until the daemon says it is done.
fn cmd_command(paths: &RuntimePaths, kind: CommandKind, target: String) -> anyhow::Result<()> {
	let mut client = connect(paths)?;
	let broadcasts = !matches!(kind, CommandKind::LastLogs | CommandKind::LastErrorLogs | CommandKind::ClearLogs);
	if broadcasts {
		subscribe(&mut client)?;
	}

	let wants_all = target.is_empty() || target == ALL_TARGET;
	client.send(&Request::Command {
		kind,
		target: target.clone(),
		content: None,
	})?;

	loop {
		match client.recv()? {
			Response::Status(status) => {
				if wants_all || status.process_name == target {
					render::print_status(&status);
				}
			}
			Response::Reply(reply) => match reply.content {
				ReplyContent::Logs { text } => render::print_logs(&reply.process_name, kind, &text),
				ReplyContent::Unreadable => eprintln!(
					"{} {}: log file could not be read",
					"warn:".yellow(),
					reply.process_name
				),
				ReplyContent::NotCaptured => eprintln!(
					"{}",
					format!("{}: output is not captured", reply.process_name).dimmed()
				),
				ReplyContent::UnknownTarget => bail!("unknown process '{}'", reply.process_name),
				ReplyContent::Completed { handled } => {
					if kind == CommandKind::ClearLogs {
						eprintln!("cleared logs for {} process{}", handled, if handled == 1 { "" } else { "es" });
					}
					return Ok(());
				}
			},
			Response::Error { message } => bail!("{}", message),
			Response::Subscribed | Response::Pong => {}
		}
	}
}

fn cmd_watch(paths: &RuntimePaths) -> anyhow::Result<()> {
	let mut client = connect(paths)?;
	subscribe(&mut client)?;
	eprintln!("{}", "watching status changes (ctrl-c to quit)".dimmed());

	loop {
		match client.recv() {
			Ok(Response::Status(status)) => render::print_status(&status),
			Ok(_) => {}
			Err(warden_ipc::ClientError::Closed) => {
				eprintln!("daemon went away");
				return Ok(());
			}
			Err(e) => return Err(e.into()),
		}
	}
}

fn cmd_ping(paths: &RuntimePaths) -> anyhow::Result<()> {
	let mut client = connect(paths)?;
	client.set_read_timeout(Some(Duration::from_secs(5)))?;
	match client.request(&Request::Ping)? {
		Response::Pong => {
			match client::read_pid(paths) {
				Some(pid) => println!("daemon running (pid {})", pid),
				None => println!("daemon running"),
			}
			Ok(())
		}
		other => bail!("unexpected response: {:?}", other),
	}
}

fn cmd_shutdown(paths: &RuntimePaths) -> anyhow::Result<()> {
	use nix::sys::signal::{kill, Signal};
	use nix::unistd::Pid;

	let Some(pid) = client::read_pid(paths) else {
		bail!("daemon not running (no pid file at {})", paths.pid_path().display());
	};
	kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
		.with_context(|| format!("failed to signal daemon (pid {})", pid))?;

	for _ in 0..50 {
		if !client::is_running(paths) {
			eprintln!("daemon stopped");
			return Ok(());
		}
		std::thread::sleep(Duration::from_millis(100));
	}
	bail!("daemon (pid {}) still answering after 5s", pid)
}
