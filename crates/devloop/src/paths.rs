use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static ARTIFACT_SEQ: AtomicU32 = AtomicU32::new(0);

/// Unique artifact location in the temp directory.
///
/// Start time and pid keep concurrent supervisors on one machine apart; the
/// sequence number keeps several apps inside one process apart.
pub fn artifact_path(prefix: &str) -> PathBuf {
	let secs = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs())
		.unwrap_or(0);
	let seq = ARTIFACT_SEQ.fetch_add(1, Ordering::SeqCst);
	std::env::temp_dir().join(format!("{}-{}-{}-{}", prefix, secs, std::process::id(), seq))
}
