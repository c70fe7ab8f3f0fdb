use std::path::PathBuf;

use payframe_runtime::RuntimeError;
use thiserror::Error;

use crate::output::ErrorCode;

#[derive(Debug, Error)]
pub enum CliError {
	#[error("{0}")]
	InvalidInput(String),

	#[error("invalid URL '{url}': {source}")]
	InvalidUrl {
		url: String,
		#[source]
		source: url::ParseError,
	},

	#[error(transparent)]
	Config(#[from] payframe::Error),

	#[error("scenario {}: {message}", path.display())]
	Scenario { path: PathBuf, message: String },

	#[error("failed to read {}: {source}", path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error(transparent)]
	Runtime(#[from] RuntimeError),

	#[error(transparent)]
	Json(#[from] serde_json::Error),
}

impl CliError {
	/// Stable code reported in the result envelope.
	pub fn code(&self) -> ErrorCode {
		match self {
			CliError::InvalidInput(_) => ErrorCode::InvalidInput,
			CliError::InvalidUrl { .. } => ErrorCode::InvalidUrl,
			CliError::Config(err) | CliError::Runtime(RuntimeError::Controller(err)) => controller_code(err),
			CliError::Scenario { .. } => ErrorCode::ScenarioError,
			CliError::Io { .. } => ErrorCode::IoError,
			CliError::Runtime(_) => ErrorCode::RuntimeError,
			CliError::Json(_) => ErrorCode::InternalError,
		}
	}
}

fn controller_code(err: &payframe::Error) -> ErrorCode {
	match err {
		payframe::Error::EmptyTargetUrl | payframe::Error::InvalidTargetUrl { .. } | payframe::Error::MissingHost(_) => ErrorCode::InvalidUrl,
		payframe::Error::ConfigRead { .. } => ErrorCode::IoError,
		_ => ErrorCode::ConfigError,
	}
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;
