//! Errors returned by the start/restart lifecycle.
//!
//! A detected application panic is deliberately absent: it is recorded on the
//! [`App`](crate::App) as its last error and never aborts a lifecycle call.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure of a `start` or `restart` call.
///
/// `Clone` so every caller blocked on a single-flight gate receives the same value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
	/// The build produced diagnostics (or the toolchain could not be spawned).
	#[error("build failed:\n{0}")]
	BuildFailure(String),

	/// A run was attempted but no artifact exists at the expected path.
	#[error("no artifact at {}", .0.display())]
	ArtifactMissing(PathBuf),

	/// The child was launched but never accepted a TCP connection.
	#[error("fail to run {name}: {addr} not ready after {timeout:?}")]
	RunTimeout {
		name: String,
		addr: SocketAddr,
		timeout: Duration,
	},

	/// The OS refused to spawn the artifact.
	#[error("fail to run {name}: {reason}")]
	Launch { name: String, reason: String },
}

impl AppError {
	/// Short stable label for structured log fields.
	pub fn as_label(&self) -> &'static str {
		match self {
			AppError::BuildFailure(_) => "build_failure",
			AppError::ArtifactMissing(_) => "artifact_missing",
			AppError::RunTimeout { .. } => "run_timeout",
			AppError::Launch { .. } => "launch_failure",
		}
	}

	/// True when the console already shows the full reason (the framed build banner).
	pub fn is_reported(&self) -> bool {
		matches!(self, AppError::BuildFailure(_))
	}
}
