use std::time::Duration;

use cordwire::protocol::CommandRef;
use cordwire::{CancellationToken, ClickOutcome, ClickSpec, Client, TriggerSpec};
use tracing::info;

use crate::cli::ClickArgs;
use crate::output::{CommandResult, ErrorCode, ResultBuilder};

pub async fn execute(client: &Client, args: &ClickArgs, cancel: &CancellationToken) -> CommandResult<Vec<ClickOutcome>> {
	let builder = ResultBuilder::new("click");
	let targets = targets(args);
	let click = click_spec(args);

	let outcomes = match targets.as_slice() {
		[single] => client.trigger_and_act(single, &click, cancel).await.map(|outcome| vec![outcome]),
		many => client.run_batch(many, &click, cancel).await,
	};

	match outcomes {
		Ok(outcomes) => {
			let captured = outcomes.iter().filter(|o| o.captured().is_some()).count();
			info!(target = "cordwire.cli", targets = outcomes.len(), captured, "click workflow finished");
			match first_failure(&outcomes) {
				Some((code, message)) => builder.data(outcomes).error(code, message).build(),
				None => builder.data(outcomes).build(),
			}
		}
		Err(err) => builder.failure(&err).build(),
	}
}

fn targets(args: &ClickArgs) -> Vec<TriggerSpec> {
	let command = CommandRef {
		application_id: args.application.clone(),
		id: args.command_id.clone(),
		version: args.command_version.clone(),
		name: args.command_name.clone(),
	};
	args.channels
		.iter()
		.map(|channel_id| TriggerSpec {
			guild_id: args.guild.clone(),
			channel_id: channel_id.clone(),
			command: command.clone(),
			custom_id_prefix: args.prefix.clone(),
		})
		.collect()
}

fn click_spec(args: &ClickArgs) -> ClickSpec {
	ClickSpec {
		repetitions: args.repetitions,
		interval: Duration::from_millis(args.interval_ms),
		delay: args.delay,
	}
}

/// Error for the envelope when any target did not finish its workflow.
fn first_failure(outcomes: &[ClickOutcome]) -> Option<(ErrorCode, String)> {
	let unfinished = |o: &&ClickOutcome| !matches!(o, ClickOutcome::Completed { .. } | ClickOutcome::Captured { .. });
	let missed = outcomes.iter().filter(unfinished).count();
	let code = match outcomes.iter().find(unfinished)? {
		ClickOutcome::TriggerFailed { kind, .. } | ClickOutcome::Failed { kind, .. } => (*kind).into(),
		ClickOutcome::Cancelled { .. } => ErrorCode::Cancelled,
		_ => ErrorCode::NotFound,
	};
	Some((code, format!("{missed} of {} targets did not finish", outcomes.len())))
}
