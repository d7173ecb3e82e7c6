//! Command-line interface definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "intentctl")]
#[command(about = "Turn free-form requests into executable intents", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
	/// Path to configuration file (.toml, .json, .yaml)
	#[arg(short, long, value_name = "FILE", env = "INTENT_CONFIG", global = true)]
	pub config: Option<PathBuf>,

	/// Log level override (trace, debug, info, warn, error)
	#[arg(short, long, global = true)]
	pub log_level: Option<String>,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Parse a request and print the intent
	Parse {
		#[arg(required = true, num_args = 1.., value_name = "TEXT")]
		text: Vec<String>,
	},

	/// Parse a request and print its validation result
	Validate {
		#[arg(required = true, num_args = 1.., value_name = "TEXT")]
		text: Vec<String>,
	},

	/// Parse a request and print its cost estimate
	Estimate {
		#[arg(required = true, num_args = 1.., value_name = "TEXT")]
		text: Vec<String>,
	},

	/// Parse, validate and estimate in one document
	Plan {
		#[arg(required = true, num_args = 1.., value_name = "TEXT")]
		text: Vec<String>,
	},

	/// Run the HTTP API
	Serve {
		/// Port override
		#[arg(short, long)]
		port: Option<u16>,
	},

	/// Load and validate the configuration, then exit
	CheckConfig,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_text_words_are_collected() {
		let cli = Cli::parse_from(["intentctl", "parse", "swap", "1", "ETH", "for", "USDC"]);
		match cli.command {
			Command::Parse { text } => assert_eq!(text.join(" "), "swap 1 ETH for USDC"),
			other => panic!("unexpected command {:?}", other),
		}
	}

	#[test]
	fn test_global_flags_after_subcommand() {
		let cli = Cli::parse_from([
			"intentctl",
			"serve",
			"--port",
			"8080",
			"--config",
			"intent.toml",
			"-l",
			"debug",
		]);
		assert_eq!(cli.config, Some(PathBuf::from("intent.toml")));
		assert_eq!(cli.log_level.as_deref(), Some("debug"));
		assert!(matches!(cli.command, Command::Serve { port: Some(8080) }));
	}
}
