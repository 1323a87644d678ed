use devloop::config::{default_name, AppConfig, ConfigFile};
use std::path::PathBuf;

use crate::Cli;

const DEFAULT_PORT: u16 = 8080;

/// Merges command-line flags over `devloop.toml`; flags win.
pub fn resolve(cli: &Cli, file: ConfigFile) -> Result<AppConfig, String> {
	let entry: PathBuf = cli
		.entry
		.clone()
		.or(file.app.entry)
		.ok_or_else(|| "no entry point given (pass one, or set app.entry in devloop.toml)".to_string())?;

	if !entry.exists() {
		return Err(format!("entry point {} does not exist", entry.display()));
	}

	let mut run = file.run;
	if let Some(secs) = cli.timeout {
		run.ready_timeout_secs = secs;
	}
	if cli.kill_on_timeout {
		run.kill_on_timeout = true;
	}

	Ok(AppConfig {
		name: cli
			.name
			.clone()
			.or(file.app.name)
			.unwrap_or_else(default_name),
		entry,
		port: cli.port.or(file.app.port).unwrap_or(DEFAULT_PORT),
		build: file.build,
		run,
		listen: true,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::Parser;

	fn file(toml_src: &str) -> ConfigFile {
		toml::from_str(toml_src).unwrap()
	}

	#[test]
	fn flags_override_file() {
		let cli = Cli::parse_from(["devloop", "Cargo.toml", "--port", "9000", "--name", "api"]);
		let config = resolve(
			&cli,
			file("[app]\nname = \"web\"\nport = 3000\n[run]\nready_timeout_secs = 5\n"),
		)
		.unwrap();
		assert_eq!(config.port, 9000);
		assert_eq!(config.name, "api");
		assert_eq!(config.run.ready_timeout_secs, 5);
	}

	#[test]
	fn file_fills_gaps() {
		let cli = Cli::parse_from(["devloop", "--timeout", "3"]);
		let config = resolve(&cli, file("[app]\nentry = \"Cargo.toml\"\nport = 3000\n")).unwrap();
		assert_eq!(config.entry, PathBuf::from("Cargo.toml"));
		assert_eq!(config.port, 3000);
		assert_eq!(config.run.ready_timeout_secs, 3);
	}

	#[test]
	fn entry_is_required() {
		let cli = Cli::parse_from(["devloop"]);
		assert!(resolve(&cli, ConfigFile::default()).is_err());

		let cli = Cli::parse_from(["devloop", "does/not/exist.go"]);
		assert!(resolve(&cli, ConfigFile::default()).unwrap_err().contains("does not exist"));
	}

	#[test]
	fn defaults_without_file() {
		let cli = Cli::parse_from(["devloop", "Cargo.toml"]);
		let config = resolve(&cli, ConfigFile::default()).unwrap();
		assert_eq!(config.port, DEFAULT_PORT);
		assert_eq!(config.build.command[0], "go");
		assert!(!config.run.kill_on_timeout);
	}
}
