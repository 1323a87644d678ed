use owo_colors::OwoColorize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::watch;

use crate::builder::Builder;
use crate::classify::{BuildClassifier, FailureDetector};
use crate::config::AppConfig;
use crate::control;
use crate::error::AppError;
use crate::gate::SingleFlight;
use crate::output::{pipe_stderr, ErrorInterceptor, LastError};
use crate::paths;
use crate::probe;
use crate::types::{AppState, ProcessState};

/// The supervised application: one artifact, at most one live child.
pub struct App {
	pub name: String,
	pub entry: PathBuf,
	/// Directory holding the entry point; what a file watcher should observe.
	pub root: PathBuf,
	pub port: u16,
	artifact: PathBuf,
	ready_timeout: Duration,
	kill_on_timeout: bool,
	listen_on_start: bool,
	builder: Builder,
	detector: Arc<dyn FailureDetector>,
	last_error: LastError,
	child: Mutex<Option<ChildHandle>>,
	building: AtomicBool,
	listening: AtomicBool,
	signals: AtomicBool,
	start_gate: SingleFlight<Result<(), AppError>>,
	restart_gate: SingleFlight<Result<(), AppError>>,
	shutdown: watch::Sender<bool>,
}

/// Owned handle to a launched child. Dropping it kills the child.
struct ChildHandle {
	pid: u32,
	state: watch::Receiver<ProcessState>,
	kill_tx: watch::Sender<bool>,
}

impl ChildHandle {
	fn state(&self) -> ProcessState {
		*self.state.borrow()
	}

	fn is_running(&self) -> bool {
		self.state().is_running()
	}

	/// Signals the wrapper task and waits until it has recorded the exit.
	async fn kill(mut self) {
		let _ = self.kill_tx.send(true);
		let _ = self.state.wait_for(|s| !s.is_running()).await;
	}
}

impl App {
	pub fn new(config: AppConfig) -> Arc<Self> {
		let classifier = config.build.classifier();
		let detector = Arc::new(config.run.detector());
		Self::with_classifiers(config, classifier, detector)
	}

	pub fn with_classifiers(
		config: AppConfig,
		classifier: Arc<dyn BuildClassifier>,
		detector: Arc<dyn FailureDetector>,
	) -> Arc<Self> {
		let root = config
			.entry
			.parent()
			.map(Path::to_path_buf)
			.unwrap_or_default();
		let (shutdown, _) = watch::channel(false);

		Arc::new(Self {
			name: config.name,
			root,
			port: config.port,
			artifact: paths::artifact_path(&config.run.artifact_prefix),
			ready_timeout: config.run.ready_timeout(),
			kill_on_timeout: config.run.kill_on_timeout,
			listen_on_start: config.listen,
			builder: Builder::new(config.build.command, classifier),
			entry: config.entry,
			detector,
			last_error: LastError::default(),
			child: Mutex::new(None),
			building: AtomicBool::new(false),
			listening: AtomicBool::new(false),
			signals: AtomicBool::new(false),
			start_gate: SingleFlight::new(),
			restart_gate: SingleFlight::new(),
			shutdown,
		})
	}

	pub fn artifact(&self) -> &Path {
		&self.artifact
	}

	/// Where the readiness probe connects.
	pub fn addr(&self) -> SocketAddr {
		SocketAddr::from(([127, 0, 0, 1], self.port))
	}

	pub fn last_error(&self) -> Option<String> {
		self.last_error.get()
	}

	pub fn is_running(&self) -> bool {
		self.lock_child().as_ref().map_or(false, |h| h.is_running())
	}

	pub fn is_exited(&self) -> bool {
		self.lock_child().as_ref().map_or(false, |h| !h.is_running())
	}

	pub fn pid(&self) -> Option<u32> {
		self.lock_child()
			.as_ref()
			.filter(|h| h.is_running())
			.map(|h| h.pid)
	}

	pub fn state(&self) -> AppState {
		if self.building.load(Ordering::SeqCst) {
			return AppState::Building;
		}
		match self.lock_child().as_ref() {
			Some(h) => h.state().into(),
			None => AppState::Idle,
		}
	}

	/// Builds (optionally) and runs the artifact, returning once the port accepts connections.
	///
	/// Concurrent calls share a single execution and its result.
	pub async fn start(self: &Arc<Self>, build: bool) -> Result<(), AppError> {
		let app = Arc::clone(self);
		self.start_gate
			.run(move || async move { app.start_once(build).await })
			.await
	}

	/// Stops the current child and starts a freshly built one.
	pub async fn restart(self: &Arc<Self>) -> Result<(), AppError> {
		let app = Arc::clone(self);
		self.restart_gate
			.run(move || async move {
				app.stop().await;
				app.start(true).await
			})
			.await
	}

	/// Kills the running child and removes the artifact. No-op unless a child is running.
	pub async fn stop(&self) {
		let handle = {
			let mut slot = self.lock_child();
			let running = slot.as_ref().map_or(false, |h| h.is_running());
			if running {
				slot.take()
			} else {
				None
			}
		};
		let Some(handle) = handle else {
			return;
		};

		let _ = std::fs::remove_file(&self.artifact);
		println!("{} {}", "== Stopping".bold(), self.name);
		tracing::debug!(app = %self.name, pid = handle.pid, "killing child");
		handle.kill().await;
	}

	/// Spawns the restart-input and interrupt watchers, once per application.
	pub fn register_listeners(self: &Arc<Self>) {
		if self
			.listening
			.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
			.is_err()
		{
			return;
		}
		control::spawn_restart_watcher(Arc::clone(self), control::stdin_triggers());
		self.watch_signals();
	}

	/// Installs the SIGINT/SIGTERM/SIGHUP watcher, once per application.
	///
	/// Safe to call before the first start so an early signal still stops the child.
	pub fn watch_signals(self: &Arc<Self>) {
		if self.signals.swap(true, Ordering::SeqCst) {
			return;
		}
		if let Err(e) = control::spawn_signal_watcher(Arc::clone(self)) {
			tracing::warn!(app = %self.name, "cannot listen for signals: {}", e);
		}
	}

	pub fn listeners_registered(&self) -> bool {
		self.listening.load(Ordering::SeqCst)
	}

	pub fn signals_watched(&self) -> bool {
		self.signals.load(Ordering::SeqCst)
	}

	pub fn request_shutdown(&self) {
		self.shutdown.send_replace(true);
	}

	pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
		self.shutdown.subscribe()
	}

	/// Resolves once the interrupt watcher has stopped the application.
	pub async fn wait_for_shutdown(&self) {
		let mut rx = self.shutdown.subscribe();
		let _ = rx.wait_for(|done| *done).await;
	}

	async fn start_once(self: &Arc<Self>, build: bool) -> Result<(), AppError> {
		if build {
			self.building.store(true, Ordering::SeqCst);
			let built = self
				.builder
				.build(&self.name, &self.entry, &self.artifact)
				.await;
			self.building.store(false, Ordering::SeqCst);

			if let Err(e) = built {
				println!("{} {}", "== Fail to build".red().bold(), self.name);
				tracing::debug!(app = %self.name, error = e.as_label(), "build failed");
				return Err(e);
			}
		}

		if let Err(e) = self.run().await {
			println!("{} {}", "== Fail to run".red().bold(), self.name);
			tracing::warn!(app = %self.name, error = e.as_label(), "{}", e);
			return Err(e);
		}

		if self.listen_on_start {
			self.register_listeners();
		}
		Ok(())
	}

	async fn run(&self) -> Result<(), AppError> {
		if tokio::fs::metadata(&self.artifact).await.is_err() {
			return Err(AppError::ArtifactMissing(self.artifact.clone()));
		}

		let previous = self.lock_child().take();
		if let Some(previous) = previous {
			if previous.is_running() {
				tracing::warn!(app = %self.name, pid = previous.pid, "replacing a live child");
			}
			previous.kill().await;
		}

		println!("{} {}", "== Running".bold(), self.name);
		let handle = self.launch()?;
		let pid = handle.pid;
		*self.lock_child() = Some(handle);

		let addr = self.addr();
		match probe::dial_until_ready(addr, self.ready_timeout).await {
			Ok(()) => {
				tracing::info!(app = %self.name, pid, %addr, "serving");
				Ok(())
			}
			Err(not_ready) => {
				tracing::debug!(app = %self.name, pid, "{}", not_ready);
				if self.kill_on_timeout {
					let handle = self.lock_child().take();
					if let Some(handle) = handle {
						handle.kill().await;
					}
				}
				Err(AppError::RunTimeout {
					name: self.name.clone(),
					addr,
					timeout: self.ready_timeout,
				})
			}
		}
	}

	fn launch(&self) -> Result<ChildHandle, AppError> {
		let mut child = Command::new(&self.artifact)
			.stdin(Stdio::null())
			.stdout(Stdio::inherit())
			.stderr(Stdio::piped())
			.process_group(0)
			.kill_on_drop(true)
			.spawn()
			.map_err(|e| AppError::Launch {
				name: self.name.clone(),
				reason: e.to_string(),
			})?;

		let pid = child.id().unwrap_or(0);
		tracing::debug!(app = %self.name, pid, artifact = %self.artifact.display(), "launched");

		if let Some(stderr) = child.stderr.take() {
			let interceptor = ErrorInterceptor::new(
				std::io::stdout(),
				Arc::clone(&self.detector),
				self.last_error.clone(),
			);
			tokio::spawn(pipe_stderr(stderr, interceptor));
		}

		let (state_tx, state_rx) = watch::channel(ProcessState::Running { pid });
		let (kill_tx, mut kill_rx) = watch::channel(false);
		let name = self.name.clone();

		tokio::spawn(async move {
			let status = tokio::select! {
				status = child.wait() => status,
				_ = kill_rx.changed() => {
					kill_process_group(pid);
					let _ = child.start_kill();
					child.wait().await
				}
			};
			let code = status.ok().and_then(|s| s.code());
			tracing::debug!(app = %name, pid, ?code, "child exited");
			state_tx.send_replace(ProcessState::Exited { code });
		});

		Ok(ChildHandle {
			pid,
			state: state_rx,
			kill_tx,
		})
	}

	fn lock_child(&self) -> MutexGuard<'_, Option<ChildHandle>> {
		self.child.lock().unwrap_or_else(|e| e.into_inner())
	}
}

/// SIGKILL to the whole process group led by `pid`.
pub fn kill_process_group(pid: u32) {
	use nix::sys::signal::{killpg, Signal};
	use nix::unistd::Pid;
	if pid == 0 {
		return;
	}
	let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
}
