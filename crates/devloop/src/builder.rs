use owo_colors::OwoColorize;
use std::io::Write;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

use crate::classify::BuildClassifier;
use crate::error::AppError;

pub const ARTIFACT_TOKEN: &str = "{artifact}";
pub const ENTRY_TOKEN: &str = "{entry}";

const BUILD_ERROR_HEADER: &str = "----------- Build Error -----------\n";
const BUILD_ERROR_FOOTER: &str = "-----------------------------------\n";

/// Runs the external toolchain that produces the artifact.
#[derive(Clone)]
pub struct Builder {
	command: Vec<String>,
	classifier: Arc<dyn BuildClassifier>,
}

impl Builder {
	pub fn new(command: Vec<String>, classifier: Arc<dyn BuildClassifier>) -> Self {
		Self {
			command,
			classifier,
		}
	}

	/// The command template with `{artifact}` and `{entry}` filled in.
	pub fn render(&self, entry: &Path, artifact: &Path) -> Vec<String> {
		let entry = entry.to_string_lossy();
		let artifact = artifact.to_string_lossy();
		self.command
			.iter()
			.map(|arg| arg.replace(ARTIFACT_TOKEN, &artifact).replace(ENTRY_TOKEN, &entry))
			.collect()
	}

	pub async fn build(&self, name: &str, entry: &Path, artifact: &Path) -> Result<(), AppError> {
		println!("{} {}", "== Building".bold(), name);

		let argv = self.render(entry, artifact);
		let Some((program, args)) = argv.split_first() else {
			return Err(report(String::from("build command is empty\n")));
		};

		tracing::debug!(command = ?argv, "invoking toolchain");
		let output = match Command::new(program)
			.args(args)
			.stdin(Stdio::null())
			.kill_on_drop(true)
			.output()
			.await
		{
			Ok(o) => o,
			Err(e) => return Err(report(format!("failed to run {}: {}\n", program, e))),
		};

		let mut combined = output.stdout;
		combined.extend_from_slice(&output.stderr);
		let text = String::from_utf8_lossy(&combined);

		self.classifier
			.classify(&text, output.status.success())
			.map_err(report)
	}
}

/// Frames a build diagnostic for the console.
pub fn format_build_error(msg: &str) -> String {
	format!("{}{}{}", BUILD_ERROR_HEADER, msg, BUILD_ERROR_FOOTER)
}

fn report(msg: String) -> AppError {
	let mut out = std::io::stdout().lock();
	let _ = out.write_all(format_build_error(&msg).as_bytes());
	let _ = out.flush();
	AppError::BuildFailure(msg)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::classify::{ExitStatus, NonEmptyOutput};
	use std::path::PathBuf;

	fn sh(script: &str, classifier: Arc<dyn BuildClassifier>) -> Builder {
		Builder::new(
			vec!["sh".into(), "-c".into(), script.into(), "sh".into(), "{artifact}".into()],
			classifier,
		)
	}

	#[test]
	fn render_substitutes_inside_arguments() {
		let b = Builder::new(
			vec![
				"go".into(),
				"build".into(),
				"-o".into(),
				"{artifact}".into(),
				"-ldflags=-X main.src={entry}".into(),
				"{entry}".into(),
			],
			Arc::new(NonEmptyOutput::default()),
		);
		let argv = b.render(Path::new("cmd/web/main.go"), Path::new("/tmp/devloop-app-1"));
		assert_eq!(
			argv,
			vec![
				"go",
				"build",
				"-o",
				"/tmp/devloop-app-1",
				"-ldflags=-X main.src=cmd/web/main.go",
				"cmd/web/main.go",
			]
		);
	}

	#[test]
	fn build_error_is_framed() {
		let framed = format_build_error("oops\n");
		assert!(framed.starts_with("----------- Build Error -----------\noops\n"));
		assert!(framed.ends_with("-----------------------------------\n"));
	}

	#[tokio::test]
	async fn silent_build_succeeds() {
		let b = sh("touch \"$1\"", Arc::new(NonEmptyOutput::default()));
		let artifact = std::env::temp_dir().join(format!("devloop-builder-ok-{}", std::process::id()));
		let result = b.build("web", Path::new("main.go"), &artifact).await;
		assert_eq!(result, Ok(()));
		assert!(artifact.exists());
		let _ = std::fs::remove_file(&artifact);
	}

	#[tokio::test]
	async fn any_output_fails_despite_zero_exit() {
		let b = sh(
			"echo '# command-line-arguments'; echo 'main.go:1: bad' >&2",
			Arc::new(NonEmptyOutput::new(Some("# command-line-arguments\n".into()))),
		);
		let result = b.build("web", Path::new("main.go"), &PathBuf::from("/nonexistent/x")).await;
		assert_eq!(result, Err(AppError::BuildFailure("main.go:1: bad\n".into())));
	}

	#[tokio::test]
	async fn exit_status_classifier_tolerates_output() {
		let b = sh("echo compiling", Arc::new(ExitStatus));
		assert!(b.build("web", Path::new("main.go"), Path::new("/tmp/x")).await.is_ok());
		let b = sh("echo broken; exit 2", Arc::new(ExitStatus));
		assert_eq!(
			b.build("web", Path::new("main.go"), Path::new("/tmp/x")).await,
			Err(AppError::BuildFailure("broken\n".into()))
		);
	}

	#[tokio::test]
	async fn missing_toolchain_is_a_build_failure() {
		let b = Builder::new(
			vec!["devloop-no-such-toolchain".into()],
			Arc::new(NonEmptyOutput::default()),
		);
		let err = b.build("web", Path::new("main.go"), Path::new("/tmp/x")).await.unwrap_err();
		assert_eq!(err.as_label(), "build_failure");

		let empty = Builder::new(vec![], Arc::new(NonEmptyOutput::default()));
		assert!(empty.build("web", Path::new("main.go"), Path::new("/tmp/x")).await.is_err());
	}
}
