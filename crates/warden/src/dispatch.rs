use crate::error::SupervisorError;
use crate::executor::ProcessExecutor;
use crate::notify::Notifier;
use crate::types::{Command, CommandKind, CommandOutcome, Reply, ReplyContent, TailRead};

/// Pick the executors a command addresses, in configured order.
pub fn select_targets<'a>(
	executors: &'a mut [ProcessExecutor],
	command: &Command,
) -> Result<Vec<&'a mut ProcessExecutor>, SupervisorError> {
	if command.targets_all() {
		return Ok(executors.iter_mut().collect());
	}

	executors
		.iter_mut()
		.find(|e| e.name() == command.target)
		.map(|e| vec![e])
		.ok_or_else(|| SupervisorError::UnknownTarget(command.target.clone()))
}

/// Run a command against its targets and publish the results.
///
/// Log reads go back to the requester, state changes and queries are
/// broadcast, clears publish nothing. The requester always gets a final
/// `completed` reply, or `unknown_target` if the name matched nothing.
pub async fn dispatch(
	executors: &mut [ProcessExecutor],
	command: &Command,
	notifier: &dyn Notifier,
) -> Result<usize, SupervisorError> {
	let targets = match select_targets(executors, command) {
		Ok(targets) => targets,
		Err(e) => {
			notifier.reply(Reply {
				reply_to: command.reply_to,
				kind: command.kind,
				process_name: command.target.clone(),
				content: ReplyContent::UnknownTarget,
			});
			return Err(e);
		}
	};

	let handled = targets.len();
	for executor in targets {
		let outcome = executor
			.execute_command(command.kind, command.content.as_deref())
			.await;

		match (command.kind, outcome) {
			(CommandKind::LastLogs | CommandKind::LastErrorLogs, outcome) => {
				let content = match outcome {
					CommandOutcome::Logs(TailRead::Text(text)) => ReplyContent::Logs { text },
					CommandOutcome::Logs(TailRead::Unreadable) => ReplyContent::Unreadable,
					_ => ReplyContent::NotCaptured,
				};
				notifier.reply(Reply {
					reply_to: command.reply_to,
					kind: command.kind,
					process_name: executor.name().to_string(),
					content,
				});
			}
			(CommandKind::ClearLogs, _) => {}
			(_, CommandOutcome::Status(status)) => notifier.broadcast(status),
			(_, _) => notifier.broadcast(executor.snapshot()),
		}
	}

	notifier.reply(Reply {
		reply_to: command.reply_to,
		kind: command.kind,
		process_name: command.target.clone(),
		content: ReplyContent::Completed { handled },
	});
	Ok(handled)
}
