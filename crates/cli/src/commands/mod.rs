mod click;
mod members;

use std::path::Path;

use cordwire::{CancellationToken, Client, ClientConfig, Error};
use serde_json::Value;
use tracing::{debug, info};

use crate::cli::{Cli, Commands};
use crate::output::ResultBuilder;

pub fn load_config(path: Option<&Path>) -> cordwire::Result<ClientConfig> {
	match path {
		Some(path) => {
			debug!(target = "cordwire.cli", path = %path.display(), "loading config");
			ClientConfig::from_path(path)
		}
		None => Ok(ClientConfig::default()),
	}
}

fn build_client(cli: &Cli) -> cordwire::Result<Client> {
	let config = load_config(cli.config.as_deref())?;
	let token = cli
		.token
		.as_deref()
		.filter(|t| !t.trim().is_empty())
		.ok_or_else(|| Error::Config("missing credential: pass --token or set CORDWIRE_TOKEN".into()))?;
	Client::new(token, config)
}

/// Cancels `cancel` on the first Ctrl-C.
fn cancel_on_interrupt(cancel: CancellationToken) {
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			info!(target = "cordwire.cli", "interrupted, cancelling");
			cancel.cancel();
		}
	});
}

fn command_name(command: &Commands) -> &'static str {
	match command {
		Commands::Members { .. } => "members",
		Commands::Click(_) => "click",
	}
}

/// Runs the command and prints its envelope. Returns whether it succeeded.
pub async fn dispatch(cli: Cli) -> anyhow::Result<bool> {
	let pretty = cli.pretty;
	let client = match build_client(&cli) {
		Ok(client) => client,
		Err(err) => {
			let result = ResultBuilder::<Value>::new(command_name(&cli.command)).failure(&err).build();
			result.print(pretty)?;
			return Ok(false);
		}
	};

	let cancel = CancellationToken::new();
	cancel_on_interrupt(cancel.clone());

	match cli.command {
		Commands::Members { guild, channel, max } => {
			let result = members::execute(&client, guild, channel, max, &cancel).await;
			result.print(pretty)?;
			Ok(result.ok)
		}
		Commands::Click(args) => {
			let result = click::execute(&client, &args, &cancel).await;
			result.print(pretty)?;
			Ok(result.ok)
		}
	}
}
