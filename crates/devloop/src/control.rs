//! Operator controls: Enter restarts the application; Ctrl-C (or SIGTERM/SIGHUP) stops it.
//!
//! Each watcher runs independently. Shutdown is reported back through the
//! app's shutdown channel; nothing here exits the process.

use std::io::{self, BufRead};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

use crate::supervisor::App;

/// Reads lines until EOF, firing `on_trigger` for each exactly-empty line.
pub fn watch_input<R, F>(mut reader: R, mut on_trigger: F) -> io::Result<()>
where
	R: BufRead,
	F: FnMut(),
{
	let mut line = String::new();
	loop {
		line.clear();
		if reader.read_line(&mut line)? == 0 {
			return Ok(());
		}
		if line == "\n" {
			on_trigger();
		}
	}
}

/// Feeds empty lines typed on stdin into a trigger channel.
///
/// Blocking stdin reads stay on a detached thread so they never hold up runtime shutdown.
pub fn stdin_triggers() -> mpsc::UnboundedReceiver<()> {
	let (tx, rx) = mpsc::unbounded_channel();
	std::thread::spawn(move || {
		let stdin = io::stdin();
		if let Err(e) = watch_input(stdin.lock(), || {
			let _ = tx.send(());
		}) {
			tracing::warn!("stdin: {}", e);
		}
	});
	rx
}

/// Restarts `app` once per trigger until the channel closes or shutdown is requested.
pub fn spawn_restart_watcher(app: Arc<App>, mut triggers: mpsc::UnboundedReceiver<()>) {
	tokio::spawn(async move {
		let mut shutdown = app.subscribe_shutdown();
		loop {
			tokio::select! {
				trigger = triggers.recv() => {
					if trigger.is_none() {
						tracing::debug!("restart input closed");
						return;
					}
					let app = Arc::clone(&app);
					tokio::spawn(async move {
						if let Err(e) = app.restart().await {
							tracing::debug!(app = %app.name, error = e.as_label(), "restart failed");
						}
					});
				}
				_ = async { let _ = shutdown.wait_for(|done| *done).await; } => return,
			}
		}
	});
}

/// Stops `app` on SIGINT, SIGTERM or SIGHUP, then publishes shutdown.
///
/// The handlers are installed before this returns, so a signal raised right
/// after the call is already routed to the watcher.
pub fn spawn_signal_watcher(app: Arc<App>) -> io::Result<()> {
	let mut interrupt = signal(SignalKind::interrupt())?;
	let mut terminate = signal(SignalKind::terminate())?;
	let mut hangup = signal(SignalKind::hangup())?;

	tokio::spawn(async move {
		let received = tokio::select! {
			_ = interrupt.recv() => "SIGINT",
			_ = terminate.recv() => "SIGTERM",
			_ = hangup.recv() => "SIGHUP",
		};
		tracing::debug!(app = %app.name, signal = received, "stopping");
		println!();
		app.stop().await;
		app.request_shutdown();
	});
	Ok(())
}
