use clap::ValueEnum;

/// How `payframe` prints a command result.
///
/// `json` and `ndjson` carry the full envelope for scripts; `text` prints a
/// summary of the payload (strategy chain, classified signal, replay timeline).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
	#[default]
	Json,
	/// One envelope per line.
	#[value(alias = "jsonl")]
	Ndjson,
	Text,
}

impl OutputFormat {
	/// Whether the envelope is printed as machine-readable JSON.
	pub fn is_json(self) -> bool {
		!matches!(self, OutputFormat::Text)
	}
}
