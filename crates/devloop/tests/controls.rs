//! Operator controls against a real child. Kept apart from `integration.rs`
//! because these tests install process-wide signal handlers.

use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use devloop::config::{AppConfig, ClassifierKind};
use devloop::{control, App};
use nix::sys::signal::{raise, Signal};
use tokio::sync::mpsc;

static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

fn temp_dir(name: &str) -> PathBuf {
	let n = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
	let dir = std::env::temp_dir().join(format!("devloop-controls-{}-{}-{}", std::process::id(), n, name));
	let _ = std::fs::create_dir_all(&dir);
	dir
}

fn free_port() -> u16 {
	let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
	listener.local_addr().unwrap().port()
}

fn write_server(dir: &Path, port: u16) -> PathBuf {
	let entry = dir.join("main.rs");
	let source = format!(
		"fn main() {{\n\
		\tlet listener = std::net::TcpListener::bind(\"127.0.0.1:{}\").unwrap();\n\
		\tfor _stream in listener.incoming() {{}}\n\
		}}\n",
		port
	);
	std::fs::write(&entry, source).unwrap();
	entry
}

/// rustc build that appends a line to `counter` on every invocation.
fn counted_config(name: &str, entry: &Path, port: u16, counter: &Path) -> AppConfig {
	let mut config = AppConfig::new(entry, port);
	config.name = name.to_string();
	config.build.command = vec![
		"sh".into(),
		"-c".into(),
		format!(
			"echo b >> '{}' && rustc --edition=2021 -o \"$0\" \"$1\"",
			counter.display()
		),
		"{artifact}".into(),
		"{entry}".into(),
	];
	config.build.classifier = ClassifierKind::Output;
	config.build.preamble = None;
	config.run.ready_timeout_secs = 20;
	config
}

fn builds(counter: &Path) -> usize {
	std::fs::read_to_string(counter)
		.map(|s| s.lines().count())
		.unwrap_or(0)
}

fn connects(port: u16) -> bool {
	TcpStream::connect(("127.0.0.1", port)).is_ok()
}

async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
	let deadline = Instant::now() + Duration::from_secs(30);
	while !check() {
		assert!(Instant::now() < deadline, "timed out waiting for {}", what);
		tokio::time::sleep(Duration::from_millis(25)).await;
	}
}

#[tokio::test]
async fn each_trigger_restarts_once() {
	let dir = temp_dir("trigger");
	let port = free_port();
	let entry = write_server(&dir, port);
	let counter = dir.join("builds");
	let mut config = counted_config("trigger", &entry, port, &counter);
	config.listen = false;
	let app = App::new(config);

	assert_eq!(app.start(true).await, Ok(()));
	assert!(!app.listeners_registered());
	let first = app.pid().unwrap();

	let (tx, rx) = mpsc::unbounded_channel();
	control::spawn_restart_watcher(Arc::clone(&app), rx);
	tx.send(()).unwrap();

	eventually("restarted child", || app.pid().map_or(false, |pid| pid != first)).await;
	eventually("restart to settle", || connects(port)).await;
	tokio::time::sleep(Duration::from_millis(300)).await;
	assert_eq!(builds(&counter), 2);
	assert!(app.is_running());

	// closing the input ends the watcher; nothing restarts afterwards
	let second = app.pid();
	drop(tx);
	tokio::time::sleep(Duration::from_millis(300)).await;
	assert_eq!(app.pid(), second);
	assert_eq!(builds(&counter), 2);

	app.stop().await;
	let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn interrupt_stops_the_app_and_requests_shutdown() {
	let dir = temp_dir("interrupt");
	let port = free_port();
	let entry = write_server(&dir, port);
	let counter = dir.join("builds");
	let app = App::new(counted_config("interrupt", &entry, port, &counter));

	// a successful start registers both watchers
	assert_eq!(app.start(true).await, Ok(()));
	assert!(app.listeners_registered());
	assert!(app.signals_watched());
	assert!(app.is_running());
	assert!(app.artifact().exists());

	raise(Signal::SIGINT).unwrap();

	tokio::time::timeout(Duration::from_secs(10), app.wait_for_shutdown())
		.await
		.expect("shutdown after SIGINT");
	assert!(!app.is_running());
	assert!(!app.artifact().exists());
	assert!(!connects(port));

	let _ = std::fs::remove_dir_all(&dir);
}
