use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

/// Serializes joins of the supervisor task.
///
/// Only one caller owns the join handle at a time; every other caller waits
/// for the `done` flag instead. A caller that times out puts the handle back
/// so a later shutdown can still observe completion.
pub(super) struct SupervisorJoinCtrl {
	handle: Mutex<Option<JoinHandle<()>>>,
	done_tx: watch::Sender<bool>,
}

impl SupervisorJoinCtrl {
	pub(super) fn new(handle: JoinHandle<()>) -> Self {
		let (done_tx, _) = watch::channel(false);
		Self {
			handle: Mutex::new(Some(handle)),
			done_tx,
		}
	}

	/// Waits until the supervisor task has finished.
	pub(super) async fn join_forever(&self) {
		let mut done_rx = self.done_tx.subscribe();
		loop {
			if *done_rx.borrow_and_update() {
				return;
			}
			let taken = self.handle.lock().await.take();
			match taken {
				Some(handle) => {
					let _ = handle.await;
					self.done_tx.send_replace(true);
					return;
				}
				None => {
					if done_rx.changed().await.is_err() {
						return;
					}
				}
			}
		}
	}

	/// Joins with a deadline. Returns `true` if the task completed in time.
	pub(super) async fn join_with_timeout(&self, timeout: Duration) -> bool {
		tokio::time::timeout(timeout, self.join_owned_or_wait()).await.unwrap_or(false)
	}

	async fn join_owned_or_wait(&self) -> bool {
		let mut done_rx = self.done_tx.subscribe();
		loop {
			if *done_rx.borrow_and_update() {
				return true;
			}
			let taken = self.handle.lock().await.take();
			let Some(handle) = taken else {
				if done_rx.changed().await.is_err() {
					return false;
				}
				continue;
			};
			// Hands the join handle back if the caller's timeout drops this future.
			let mut guard = HandleGuard {
				slot: &self.handle,
				done: &self.done_tx,
				handle: Some(handle),
			};
			if let Some(handle) = guard.handle.as_mut() {
				let _ = handle.await;
			}
			guard.handle = None;
			self.done_tx.send_replace(true);
			return true;
		}
	}
}

struct HandleGuard<'a> {
	slot: &'a Mutex<Option<JoinHandle<()>>>,
	done: &'a watch::Sender<bool>,
	handle: Option<JoinHandle<()>>,
}

impl Drop for HandleGuard<'_> {
	fn drop(&mut self) {
		if let Some(handle) = self.handle.take() {
			if let Ok(mut slot) = self.slot.try_lock() {
				*slot = Some(handle);
			}
			// Wake waiters so one of them can take over the join.
			self.done.send_modify(|_| {});
		}
	}
}
