//! Error types for controller construction and API misuse.
//!
//! Runtime conditions (blocked presentations, gateway failures, timeouts) are
//! never errors; they settle the session through the outcome callback.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("target URL is empty")]
	EmptyTargetUrl,

	#[error("invalid target URL '{url}': {source}")]
	InvalidTargetUrl {
		url: String,
		#[source]
		source: url::ParseError,
	},

	#[error("target URL '{0}' has no host")]
	MissingHost(String),

	#[error("invalid host pattern '{pattern}': {source}")]
	HostPattern {
		pattern: String,
		#[source]
		source: glob::PatternError,
	},

	#[error("invalid configuration: {0}")]
	Config(String),

	#[error("failed to read configuration {}: {source}", path.display())]
	ConfigRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("invalid order: {0}")]
	InvalidOrder(String),

	#[error("gateway request failed: {0}")]
	Gateway(String),

	#[error(transparent)]
	Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
