//! Tracing subscriber setup for the `payframe` binary.
//!
//! Logs go to stderr so stdout stays a clean result envelope. `RUST_LOG`
//! wins over the `-v` count when set. Every crate logs under a `payframe`
//! target prefix, so one directive covers the whole workspace.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Filter directive for a `-v` count.
pub fn default_directive(verbosity: u8) -> &'static str {
	match verbosity {
		0 => "warn",
		1 => "payframe=info,warn",
		2 => "payframe=debug,info",
		_ => "trace",
	}
}

pub fn init_logging(verbosity: u8) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

	let _ = tracing_subscriber::registry()
		.with(filter)
		.with(fmt::layer().with_writer(std::io::stderr).with_target(true).compact())
		.try_init();
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn verbosity_widens_the_filter() {
		assert_eq!(default_directive(0), "warn");
		assert!(default_directive(2).contains("payframe=debug"));
		assert_eq!(default_directive(7), "trace");
	}

	#[test]
	fn directives_parse() {
		for level in 0..4 {
			assert!(EnvFilter::try_new(default_directive(level)).is_ok());
		}
	}
}
