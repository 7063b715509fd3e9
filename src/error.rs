use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for collector operations.
pub type Result<T> = std::result::Result<T, CollectorError>;

/// Errors that can surface out of setup or a poll.
///
/// Unparseable lines never show up here; they are skipped by the parser.
#[derive(Error, Debug)]
pub enum CollectorError {
	#[error("Failed to invoke {command}: {reason}")]
	Invocation { command: String, reason: String },

	#[error("Could not find any CPUs in turbostat dump")]
	TopologyResolution,

	#[error("RAPL power unit unavailable on CPU {cpu}: {reason}")]
	RaplUnavailable { cpu: u32, reason: String },

	#[error("Invalid configuration at {path:?}: {reason}")]
	Config { path: PathBuf, reason: String },

	#[error("IO error: {0}")]
	Io(#[from] io::Error),
}
