use clap::Parser;
use cordwire_cli::{cli::Cli, commands, logging};
use tracing::error;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	match commands::dispatch(cli).await {
		Ok(true) => {}
		Ok(false) => std::process::exit(1),
		Err(err) => {
			error!(target = "cordwire.cli", error = %err, "command failed");
			std::process::exit(1);
		}
	}
}
