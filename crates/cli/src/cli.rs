use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use payframe::{DeviceClass, Strategy};

use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "payframe")]
#[command(about = "Inspect payframe presentation decisions and replay scripted payment sessions")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug, -vvv trace)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format
	#[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Json)]
	pub format: OutputFormat,

	/// Controller configuration (camelCase JSON)
	#[arg(short, long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Show which presentation strategy a URL gets and the fallback chain behind it
	Strategy {
		url: String,
		/// Device class to evaluate for
		#[arg(short, long, value_enum, default_value_t = DeviceArg::Desktop)]
		device: DeviceArg,
		/// Treat a strategy as already blocked (repeatable)
		#[arg(short = 'x', long = "exclude", value_name = "STRATEGY", value_parser = parse_strategy)]
		exclude: Vec<Strategy>,
		/// Extra framing-denied host pattern (repeatable)
		#[arg(long = "deny", value_name = "PATTERN")]
		deny: Vec<String>,
	},

	/// Classify a message payload or a popup location the way a live session would
	Classify {
		/// JSON payload, or a raw string when it does not parse
		payload: String,
		/// Treat the input as a popup/tab location instead of a message
		#[arg(long)]
		location: bool,
		/// Device class used to size resize requests
		#[arg(short, long, value_enum, default_value_t = DeviceArg::Desktop)]
		device: DeviceArg,
		/// Viewport height used to size resize requests
		#[arg(long, default_value_t = 800)]
		viewport_height: u32,
	},

	/// Print the effective configuration
	Config,

	/// Drive a session from a scenario file and report the outcome
	Replay {
		/// Scenario JSON file
		scenario: PathBuf,
	},
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DeviceArg {
	Desktop,
	Mobile,
}

impl From<DeviceArg> for DeviceClass {
	fn from(arg: DeviceArg) -> Self {
		match arg {
			DeviceArg::Desktop => DeviceClass::Desktop,
			DeviceArg::Mobile => DeviceClass::Mobile,
		}
	}
}

fn parse_strategy(value: &str) -> Result<Strategy, String> {
	value.parse::<Strategy>().map_err(|err| err.to_string())
}
