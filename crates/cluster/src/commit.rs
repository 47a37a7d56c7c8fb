use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::{ClusterError, InterruptCause, Result};
use crate::state::ClusterState;

pub(crate) type CommitReply = oneshot::Sender<Result<Arc<ClusterState>>>;

/// Waits for one submitted task to be applied.
///
/// Success is only reported once the resulting state is published. Giving up
/// early never withdraws the task.
#[derive(Debug)]
pub struct CommitWaiter {
	task: String,
	rx: oneshot::Receiver<Result<Arc<ClusterState>>>,
}

impl CommitWaiter {
	pub(crate) fn channel(task: impl Into<String>) -> (CommitReply, Self) {
		let (tx, rx) = oneshot::channel();
		(tx, Self { task: task.into(), rx })
	}

	/// Source label of the awaited task.
	pub fn task(&self) -> &str {
		&self.task
	}

	/// Waits without a deadline.
	pub async fn wait(self) -> Result<Arc<ClusterState>> {
		self.wait_with(None, None).await
	}

	/// Waits until the task is answered, `timeout` elapses, or `cancel` fires.
	pub async fn wait_with(self, timeout: Option<Duration>, cancel: Option<&CancellationToken>) -> Result<Arc<ClusterState>> {
		let Self { task, rx } = self;
		let deadline = async {
			match timeout {
				Some(after) => tokio::time::sleep(after).await,
				None => std::future::pending().await,
			}
		};
		let cancelled = async {
			match cancel {
				Some(token) => token.cancelled().await,
				None => std::future::pending().await,
			}
		};

		let cause = tokio::select! {
			biased;
			reply = rx => return reply.unwrap_or(Err(ClusterError::InterruptedWait { task, cause: InterruptCause::Shutdown })),
			_ = cancelled => InterruptCause::Cancelled,
			_ = deadline => InterruptCause::Timeout(timeout.unwrap_or_default()),
		};
		tracing::debug!(task = %task, %cause, "cluster.task.wait_interrupted");
		Err(ClusterError::InterruptedWait { task, cause })
	}

	/// Blocks the current thread until the task is answered.
	///
	/// Must not be called from within an async runtime.
	pub fn wait_blocking(self) -> Result<Arc<ClusterState>> {
		let Self { task, rx } = self;
		rx.blocking_recv().unwrap_or(Err(ClusterError::InterruptedWait { task, cause: InterruptCause::Shutdown }))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn reply_is_returned() {
		let (tx, waiter) = CommitWaiter::channel("t");
		let state = Arc::new(ClusterState::default());
		tx.send(Ok(Arc::clone(&state))).unwrap();
		assert!(Arc::ptr_eq(&waiter.wait().await.unwrap(), &state));
	}

	#[tokio::test]
	async fn dropped_reply_reports_shutdown() {
		let (tx, waiter) = CommitWaiter::channel("t");
		drop(tx);
		let err = waiter.wait().await.unwrap_err();
		assert_eq!(
			err,
			ClusterError::InterruptedWait {
				task: "t".into(),
				cause: InterruptCause::Shutdown
			}
		);
	}

	#[tokio::test]
	async fn timeout_and_cancel_interrupt() {
		let (_tx, waiter) = CommitWaiter::channel("slow");
		let err = waiter.wait_with(Some(Duration::from_millis(5)), None).await.unwrap_err();
		assert!(err.is_outcome_unknown());
		assert!(matches!(err, ClusterError::InterruptedWait { cause: InterruptCause::Timeout(_), .. }));

		let (_tx, waiter) = CommitWaiter::channel("slow");
		let token = CancellationToken::new();
		token.cancel();
		let err = waiter.wait_with(None, Some(&token)).await.unwrap_err();
		assert!(matches!(err, ClusterError::InterruptedWait { cause: InterruptCause::Cancelled, .. }));
	}

	#[test]
	fn blocking_wait_outside_runtime() {
		let (tx, waiter) = CommitWaiter::channel("t");
		tx.send(Err(ClusterError::QueueClosed)).unwrap();
		assert_eq!(waiter.wait_blocking().unwrap_err(), ClusterError::QueueClosed);
	}
}
