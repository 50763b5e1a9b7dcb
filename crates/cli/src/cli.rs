use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "cordwire")]
#[command(about = "Member-list collection and button workflows over a gateway session")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// JSON configuration file (missing fields use defaults)
	#[arg(short, long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Account credential
	#[arg(long, global = true, env = "CORDWIRE_TOKEN", hide_env_values = true)]
	pub token: Option<String>,

	/// Pretty-print the JSON result
	#[arg(long, global = true)]
	pub pretty: bool,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Collect the member list of a guild through a channel's sidebar
	Members {
		#[arg(long)]
		guild: String,
		#[arg(long)]
		channel: String,
		/// Stop after this many members
		#[arg(long, default_value = "1000")]
		max: usize,
	},

	/// Trigger a slash command, wait for the bot's button and click it
	Click(ClickArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct ClickArgs {
	/// Target channel; repeat for a batch
	#[arg(long = "channel", required = true)]
	pub channels: Vec<String>,

	#[arg(long)]
	pub guild: Option<String>,

	/// Application that owns the command
	#[arg(long)]
	pub application: String,

	#[arg(long)]
	pub command_id: String,

	#[arg(long)]
	pub command_version: String,

	#[arg(long)]
	pub command_name: String,

	/// Custom id prefix of the button to click
	#[arg(long)]
	pub prefix: String,

	#[arg(long, default_value = "1")]
	pub repetitions: u32,

	/// Pause between repeated clicks (ms)
	#[arg(long, default_value = "0")]
	pub interval_ms: u64,

	/// Only detect; do not click
	#[arg(long)]
	pub delay: bool,
}
