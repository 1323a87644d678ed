//! Single-flight gate for lifecycle operations.
//!
//! The first caller runs the operation; callers arriving while it is in flight
//! wait for that run's result instead of starting their own. Once the run
//! finishes the gate rearms, so the next call executes again.

use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

pub struct SingleFlight<T> {
	inflight: Arc<Mutex<Option<watch::Receiver<Option<T>>>>>,
}

enum Role<T> {
	Leader(watch::Sender<Option<T>>, Rearm<T>),
	Follower(watch::Receiver<Option<T>>),
}

/// Returns the gate to idle when the leader finishes or is dropped mid-flight.
struct Rearm<T> {
	inflight: Arc<Mutex<Option<watch::Receiver<Option<T>>>>>,
}

impl<T> Drop for Rearm<T> {
	fn drop(&mut self) {
		self.inflight.lock().unwrap_or_else(|e| e.into_inner()).take();
	}
}

impl<T: Clone> SingleFlight<T> {
	pub fn new() -> Self {
		Self {
			inflight: Arc::new(Mutex::new(None)),
		}
	}

	pub fn is_engaged(&self) -> bool {
		self.inflight.lock().unwrap_or_else(|e| e.into_inner()).is_some()
	}

	pub async fn run<F, Fut>(&self, f: F) -> T
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = T>,
	{
		loop {
			match self.join() {
				Role::Leader(tx, rearm) => {
					let result = f().await;
					drop(rearm);
					tx.send_replace(Some(result.clone()));
					return result;
				}
				Role::Follower(mut rx) => {
					let published = match rx.wait_for(|r| r.is_some()).await {
						Ok(r) => r.clone(),
						Err(_) => None,
					};
					if let Some(result) = published {
						return result;
					}
					// leader was dropped before publishing; contend again
				}
			}
		}
	}

	fn join(&self) -> Role<T> {
		let mut slot = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
		if let Some(rx) = slot.as_ref() {
			return Role::Follower(rx.clone());
		}
		let (tx, rx) = watch::channel(None);
		*slot = Some(rx);
		Role::Leader(
			tx,
			Rearm {
				inflight: Arc::clone(&self.inflight),
			},
		)
	}
}

impl<T: Clone> Default for SingleFlight<T> {
	fn default() -> Self {
		Self::new()
	}
}
