use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::classify::{
	BuildClassifier, ExitStatus, NonEmptyOutput, SignatureDetector, GO_BUILD_PREAMBLE,
	HTTP_PANIC_SIGNATURE,
};

pub const CONFIG_FILE: &str = "devloop.toml";

/// Contents of `devloop.toml`. Every field is optional.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConfigFile {
	#[serde(default)]
	pub app: AppSection,
	#[serde(default)]
	pub build: BuildConfig,
	#[serde(default)]
	pub run: RunConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
	pub name: Option<String>,
	pub entry: Option<PathBuf>,
	pub port: Option<u16>,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ClassifierKind {
	/// Any toolchain output means failure.
	#[default]
	Output,
	/// Only a non-zero exit means failure.
	ExitStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildConfig {
	#[serde(default = "default_build_command")]
	pub command: Vec<String>,
	#[serde(default)]
	pub classifier: ClassifierKind,
	#[serde(default = "default_preamble")]
	pub preamble: Option<String>,
}

impl Default for BuildConfig {
	fn default() -> Self {
		Self {
			command: default_build_command(),
			classifier: ClassifierKind::default(),
			preamble: default_preamble(),
		}
	}
}

impl BuildConfig {
	pub fn classifier(&self) -> Arc<dyn BuildClassifier> {
		match self.classifier {
			ClassifierKind::Output => Arc::new(NonEmptyOutput::new(self.preamble.clone())),
			ClassifierKind::ExitStatus => Arc::new(ExitStatus),
		}
	}
}

fn default_build_command() -> Vec<String> {
	["go", "build", "-o", "{artifact}", "{entry}"]
		.iter()
		.map(|s| s.to_string())
		.collect()
}
fn default_preamble() -> Option<String> {
	Some(GO_BUILD_PREAMBLE.to_string())
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
	#[serde(default = "default_ready_timeout")]
	pub ready_timeout_secs: u64,
	#[serde(default)]
	pub kill_on_timeout: bool,
	#[serde(default = "default_failure_signature")]
	pub failure_signature: String,
	#[serde(default = "default_artifact_prefix")]
	pub artifact_prefix: String,
}

impl Default for RunConfig {
	fn default() -> Self {
		Self {
			ready_timeout_secs: default_ready_timeout(),
			kill_on_timeout: false,
			failure_signature: default_failure_signature(),
			artifact_prefix: default_artifact_prefix(),
		}
	}
}

impl RunConfig {
	pub fn ready_timeout(&self) -> Duration {
		Duration::from_secs(self.ready_timeout_secs)
	}

	pub fn detector(&self) -> SignatureDetector {
		SignatureDetector::new(self.failure_signature.clone())
	}
}

fn default_ready_timeout() -> u64 {
	60
}
fn default_failure_signature() -> String {
	HTTP_PANIC_SIGNATURE.to_string()
}
fn default_artifact_prefix() -> String {
	"devloop-app".to_string()
}

/// Fully resolved settings for one supervised application.
#[derive(Debug, Clone)]
pub struct AppConfig {
	pub name: String,
	pub entry: PathBuf,
	pub port: u16,
	pub build: BuildConfig,
	pub run: RunConfig,
	/// Register the Enter and signal watchers after the first successful start.
	pub listen: bool,
}

impl AppConfig {
	pub fn new(entry: impl Into<PathBuf>, port: u16) -> Self {
		Self {
			name: default_name(),
			entry: entry.into(),
			port,
			build: BuildConfig::default(),
			run: RunConfig::default(),
			listen: true,
		}
	}
}

pub fn load_config(path: &Path) -> ConfigFile {
	if path.exists() {
		match std::fs::read_to_string(path) {
			Ok(content) => match toml::from_str(&content) {
				Ok(config) => return config,
				Err(e) => eprintln!("warning: failed to parse {}: {}", path.display(), e),
			},
			Err(e) => eprintln!("warning: failed to read {}: {}", path.display(), e),
		}
	}
	ConfigFile::default()
}

/// Base name of the working directory.
pub fn default_name() -> String {
	std::env::current_dir()
		.ok()
		.and_then(|d| d.file_name().map(|n| n.to_string_lossy().to_string()))
		.unwrap_or_else(|| "app".to_string())
}
