use cordwire::{CancellationToken, Client, CollectOutcome, CollectRequest};
use tracing::info;

use crate::output::{CommandResult, ResultBuilder};

pub async fn execute(
	client: &Client,
	guild_id: String,
	channel_id: String,
	max_items: usize,
	cancel: &CancellationToken,
) -> CommandResult<CollectOutcome> {
	let builder = ResultBuilder::new("members");
	let request = CollectRequest {
		guild_id,
		channel_id,
		max_items,
	};

	match client.collect_members(&request, cancel).await {
		Ok(outcome) => {
			info!(
				target = "cordwire.cli",
				members = outcome.members.len(),
				total = outcome.total,
				finish = ?outcome.finish,
				"collection finished"
			);
			builder.data(outcome).build()
		}
		Err(err) => builder.failure(&err).build(),
	}
}
