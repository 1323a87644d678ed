use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::classify::FailureDetector;

const APP_ERROR_HEADER: &[u8] = b"----------- Application Error -----------\n";
const APP_ERROR_FOOTER: &[u8] = b"-----------------------------------------\n";

/// Most recent application failure seen on the child's error stream.
///
/// Overwritten by each new detection; never cleared by stop or restart.
#[derive(Clone, Default)]
pub struct LastError {
	inner: Arc<Mutex<Option<String>>>,
}

impl LastError {
	pub fn get(&self) -> Option<String> {
		self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
	}

	pub fn set(&self, msg: String) {
		*self.inner.lock().unwrap_or_else(|e| e.into_inner()) = Some(msg);
	}
}

/// Sink for the child's stderr: passes chunks through to the console and
/// frames the ones carrying a failure signature.
pub struct ErrorInterceptor<W> {
	sink: W,
	detector: Arc<dyn FailureDetector>,
	last_error: LastError,
}

impl<W: Write> ErrorInterceptor<W> {
	pub fn new(sink: W, detector: Arc<dyn FailureDetector>, last_error: LastError) -> Self {
		Self {
			sink,
			detector,
			last_error,
		}
	}

	#[cfg(test)]
	fn into_inner(self) -> W {
		self.sink
	}
}

impl<W: Write> Write for ErrorInterceptor<W> {
	fn write(&mut self, chunk: &[u8]) -> io::Result<usize> {
		if self.detector.detect(chunk) {
			self.last_error.set(String::from_utf8_lossy(chunk).into_owned());
			tracing::debug!(bytes = chunk.len(), "application failure detected");
			self.sink.write_all(APP_ERROR_HEADER)?;
			self.sink.write_all(chunk)?;
			self.sink.write_all(APP_ERROR_FOOTER)?;
		} else {
			self.sink.write_all(chunk)?;
		}
		Ok(chunk.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		self.sink.flush()
	}
}

/// Feeds a child's error stream into the interceptor, one read per chunk.
pub async fn pipe_stderr<R, W>(mut reader: R, mut interceptor: ErrorInterceptor<W>)
where
	R: AsyncRead + Unpin,
	W: Write,
{
	let mut buf = [0u8; 4096];
	loop {
		match reader.read(&mut buf).await {
			Ok(0) => break,
			Ok(n) => {
				if let Err(e) = interceptor.write_all(&buf[..n]).and_then(|_| interceptor.flush()) {
					tracing::warn!("console write failed: {}", e);
					break;
				}
			}
			Err(_) => break,
		}
	}
}
