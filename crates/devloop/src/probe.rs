use std::net::SocketAddr;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::TcpStream;

/// Pause between connection attempts; also bounds each attempt.
pub const DIAL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{addr} not accepting connections after {elapsed:?}")]
pub struct NotReady {
	pub addr: SocketAddr,
	pub elapsed: Duration,
}

/// Connects to `addr` repeatedly until one attempt succeeds or `timeout` has elapsed.
pub async fn dial_until_ready(addr: SocketAddr, timeout: Duration) -> Result<(), NotReady> {
	let started = Instant::now();
	let mut attempts: u32 = 0;

	loop {
		attempts += 1;
		if let Ok(Ok(stream)) = tokio::time::timeout(DIAL_INTERVAL, TcpStream::connect(addr)).await {
			drop(stream);
			tracing::debug!(%addr, attempts, elapsed = ?started.elapsed(), "ready");
			return Ok(());
		}

		let elapsed = started.elapsed();
		if elapsed >= timeout {
			return Err(NotReady { addr, elapsed });
		}
		tokio::time::sleep(DIAL_INTERVAL.min(timeout - elapsed)).await;
	}
}
