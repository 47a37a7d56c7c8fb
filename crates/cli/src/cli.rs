use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "cairn")]
#[command(about = "Apply serialized metadata changes to a cairn cluster")]
#[command(version)]
/// Command-line arguments.
pub struct Cli {
	/// Node configuration (TOML)
	#[arg(short, long, value_name = "PATH")]
	pub config: Option<PathBuf>,

	/// Verbose logging
	#[arg(short, long)]
	pub verbose: bool,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Print the cluster state as JSON
	Show,
	/// Add or replace a warmer on the selected indices
	PutWarmer {
		/// Warmer name
		name: String,
		/// Index names or patterns (all indices if omitted)
		#[arg(short, long, value_delimiter = ',')]
		indices: Vec<String>,
		/// Document types the warmer applies to
		#[arg(short, long, value_delimiter = ',')]
		types: Vec<String>,
		/// Warming query
		#[arg(short, long)]
		source: Option<String>,
	},
	/// Remove warmers matching a name or pattern
	DeleteWarmer {
		/// Warmer name or pattern
		name: String,
		/// Index names or patterns (all indices if omitted)
		#[arg(short, long, value_delimiter = ',')]
		indices: Vec<String>,
	},
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_put_warmer() {
		let cli = Cli::parse_from(["cairn", "-v", "put-warmer", "w1", "-i", "test,logs-*", "-s", "{}"]);
		assert!(cli.verbose);
		match cli.command {
			Command::PutWarmer { name, indices, types, source } => {
				assert_eq!(name, "w1");
				assert_eq!(indices, ["test", "logs-*"]);
				assert!(types.is_empty());
				assert_eq!(source.as_deref(), Some("{}"));
			}
			other => panic!("unexpected command {other:?}"),
		}
	}

	#[test]
	fn verifies_definition() {
		use clap::CommandFactory;
		Cli::command().debug_assert();
	}
}
