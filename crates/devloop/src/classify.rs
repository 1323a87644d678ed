//! Heuristics that turn raw toolchain and application output into verdicts.
//!
//! Both are tied to a toolchain's diagnostic conventions, so they sit behind
//! traits and can be swapped per project.

/// Preamble `go build` prints before diagnostics for a single-file package.
pub const GO_BUILD_PREAMBLE: &str = "# command-line-arguments\n";

/// Substring Go's `net/http` writes when a handler panics.
pub const HTTP_PANIC_SIGNATURE: &str = "http: panic serving";

/// Decides whether a build succeeded from its combined output and exit status.
pub trait BuildClassifier: Send + Sync {
	/// `Err` carries the diagnostic text to surface to the operator.
	fn classify(&self, output: &str, exit_ok: bool) -> Result<(), String>;
}

/// Decides whether a chunk of application error output marks a runtime failure.
pub trait FailureDetector: Send + Sync {
	fn detect(&self, chunk: &[u8]) -> bool;
}

/// Any output at all is a failure, whatever the exit status.
#[derive(Debug, Clone, Default)]
pub struct NonEmptyOutput {
	preamble: Option<String>,
}

impl NonEmptyOutput {
	pub fn new(preamble: Option<String>) -> Self {
		Self { preamble }
	}
}

impl BuildClassifier for NonEmptyOutput {
	fn classify(&self, output: &str, _exit_ok: bool) -> Result<(), String> {
		if output.is_empty() {
			return Ok(());
		}
		match &self.preamble {
			Some(preamble) if !preamble.is_empty() => Err(output.replacen(preamble.as_str(), "", 1)),
			_ => Err(output.to_string()),
		}
	}
}

/// Only a non-zero exit status is a failure; output on success is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExitStatus;

impl BuildClassifier for ExitStatus {
	fn classify(&self, output: &str, exit_ok: bool) -> Result<(), String> {
		if exit_ok {
			Ok(())
		} else if output.is_empty() {
			Err("build exited with a non-zero status\n".to_string())
		} else {
			Err(output.to_string())
		}
	}
}

/// Matches a fixed substring anywhere in the chunk.
#[derive(Debug, Clone)]
pub struct SignatureDetector {
	signature: String,
}

impl SignatureDetector {
	pub fn new(signature: impl Into<String>) -> Self {
		Self {
			signature: signature.into(),
		}
	}
}

impl Default for SignatureDetector {
	fn default() -> Self {
		Self::new(HTTP_PANIC_SIGNATURE)
	}
}

impl FailureDetector for SignatureDetector {
	fn detect(&self, chunk: &[u8]) -> bool {
		let needle = self.signature.as_bytes();
		if needle.is_empty() {
			return false;
		}
		chunk.windows(needle.len()).any(|w| w == needle)
	}
}
