mod config;

use clap::Parser;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::process::ExitCode;

use devloop::App;

/// Build a server, run it, and rebuild/restart it when you press Enter.
#[derive(Parser, Debug)]
#[command(name = "devloop", version, about)]
pub struct Cli {
	/// Entry-point source file handed to the build command
	#[arg(value_name = "ENTRY")]
	entry: Option<PathBuf>,

	/// Port the application listens on (probed on 127.0.0.1)
	#[arg(short, long)]
	port: Option<u16>,

	/// Display name (default: current directory name)
	#[arg(short, long)]
	name: Option<String>,

	/// Config file path
	#[arg(short, long, default_value = devloop::config::CONFIG_FILE)]
	config: PathBuf,

	/// Seconds to wait for the port to accept connections
	#[arg(long)]
	timeout: Option<u64>,

	/// Kill the child if it never becomes ready
	#[arg(long)]
	kill_on_timeout: bool,

	/// Debug logging (build commands, pids, probe timings)
	#[arg(short, long)]
	verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
	let cli = Cli::parse();

	tracing_subscriber::fmt()
		.with_writer(std::io::stderr)
		.with_target(false)
		.with_max_level(if cli.verbose {
			tracing::Level::DEBUG
		} else {
			tracing::Level::WARN
		})
		.init();

	let file = devloop::load_config(&cli.config);
	let config = match config::resolve(&cli, file) {
		Ok(c) => c,
		Err(e) => {
			eprintln!("{} {}", "error:".red().bold(), e);
			return ExitCode::FAILURE;
		}
	};
	tracing::debug!(?config, "resolved configuration");

	let app = App::new(config);

	// Before the first build, so a signal during build or probe still stops the child.
	app.watch_signals();
	let mut shutdown = app.subscribe_shutdown();

	let interrupted = tokio::select! {
		started = app.start(true) => {
			if let Err(e) = started {
				tracing::debug!(error = e.as_label(), "initial start failed");
				if !e.is_reported() {
					eprintln!("{} {}", "error:".red().bold(), e);
				}
			}
			false
		}
		_ = async { let _ = shutdown.wait_for(|done| *done).await; } => true,
	};
	if interrupted {
		// The abandoned start may have launched a child after the watcher stopped.
		app.stop().await;
		std::process::exit(0)
	}

	// Registered even after a failed first start so Enter can retry.
	app.register_listeners();
	eprintln!(
		"{} press {} to rebuild and restart, {} to quit",
		"devloop".bold(),
		"Enter".cyan(),
		"Ctrl-C".cyan()
	);

	app.wait_for_shutdown().await;

	// stdin is read on a detached thread; exiting here does not wait for it.
	std::process::exit(0)
}
