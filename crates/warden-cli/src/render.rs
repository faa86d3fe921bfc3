use owo_colors::OwoColorize;
use warden::{format_uptime, CommandKind, Config, StatusSnapshot};

const NAME_WIDTH: usize = 16;

pub fn print_status(status: &StatusSnapshot) {
	let (circle, uptime, pid, label) = if status.running {
		(
			"●".green().to_string(),
			status.uptime_secs.map(format_uptime).unwrap_or_else(|| "-".to_string()),
			status.pid.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
			"on".green().to_string(),
		)
	} else {
		("●".red().to_string(), "-".to_string(), "-".to_string(), "off".red().to_string())
	};
	println!(
		"{} {:<width$} {:<8} {:<8} {}",
		circle,
		status.process_name,
		uptime,
		pid,
		label,
		width = NAME_WIDTH
	);
}

pub fn print_logs(process: &str, kind: CommandKind, text: &str) {
	let stream = if kind == CommandKind::LastErrorLogs { "stderr" } else { "stdout" };
	println!("{}", format!("── {} ({}) ──", process, stream).dimmed());
	if text.is_empty() {
		println!("{}", "(empty)".dimmed());
	} else {
		print!("{}", text.replace("\r\n", "\n"));
		if !text.ends_with('\n') {
			println!();
		}
	}
}

pub fn print_config(config: &Config) {
	let base = config.supervisor.base_dir();
	for process in &config.processes {
		let policy = match (process.autostart, process.autorestart) {
			(true, true) => "autostart, autorestart".to_string(),
			(true, false) => "autostart".to_string(),
			(false, true) => "manual, autorestart".to_string(),
			(false, false) => "manual".to_string(),
		};
		let mut line = process.command.display().to_string();
		for arg in &process.args {
			line.push(' ');
			line.push_str(arg);
		}
		println!("  {:<width$} {} {}", process.name.bold(), line, format!("[{}]", policy).dimmed(), width = NAME_WIDTH);
		for path in [process.stdout_path(&base), process.stderr_path(&base)].into_iter().flatten() {
			println!("  {:<width$} {}", "", format!("→ {}", path.display()).dimmed(), width = NAME_WIDTH);
		}
	}
}
