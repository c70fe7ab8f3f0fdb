use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
	#[error(transparent)]
	Controller(#[from] payframe::Error),

	/// The driver loop has stopped and no longer accepts commands.
	#[error("payframe driver is not running")]
	Closed,

	/// The session's outcome sender was dropped without settling.
	#[error("session {0} ended without an outcome")]
	Abandoned(payframe::Ticket),
}

pub type Result<T, E = RuntimeError> = std::result::Result<T, E>;
