use std::fmt;
use std::time::Duration;

use cairn_metadata::MetadataError;

use crate::blocks::ClusterBlockError;
use crate::validation::ShardFailure;

/// Why a caller stopped waiting for its task to commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptCause {
	/// The caller's deadline elapsed.
	Timeout(Duration),
	/// The caller's cancellation token fired.
	Cancelled,
	/// The queue went away without answering.
	Shutdown,
}

impl fmt::Display for InterruptCause {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Timeout(after) => write!(f, "timed out after {after:?}"),
			Self::Cancelled => f.write_str("cancelled"),
			Self::Shutdown => f.write_str("update queue shut down"),
		}
	}
}

/// Errors surfaced by cluster metadata operations.
///
/// None of these are retried internally.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClusterError {
	#[error(transparent)]
	ClusterBlocked(#[from] ClusterBlockError),

	#[error("validation query failed on {} shard(s): {}", .failures.len(), join_failures(.failures))]
	ValidationFailed { failures: Vec<ShardFailure> },

	#[error("no such index [{index}]")]
	IndexNotFound { index: String },

	/// The task may have committed, may still commit, or may have failed.
	/// Re-read the cluster state to learn which.
	#[error("interrupted while waiting for [{task}] to commit ({cause}); outcome unknown")]
	InterruptedWait { task: String, cause: InterruptCause },

	#[error("warmer [{name}] missing")]
	WarmerNotFound { name: String },

	#[error("index [{index}] already exists")]
	IndexAlreadyExists { index: String },

	#[error("invalid index name [{index}]: {reason}")]
	InvalidIndexName { index: String, reason: String },

	#[error("validation collaborator unavailable: {0}")]
	ValidatorUnavailable(String),

	#[error("node [{node}] is not the elected master")]
	NotMaster { node: String },

	#[error("invalid request: {0}")]
	InvalidRequest(String),

	#[error("cluster state update queue is closed")]
	QueueClosed,

	#[error("task [{task}] panicked: {message}")]
	TaskPanicked { task: String, message: String },

	#[error(transparent)]
	Metadata(MetadataError),
}

impl From<MetadataError> for ClusterError {
	fn from(err: MetadataError) -> Self {
		match err {
			MetadataError::IndexNotFound(index) => Self::IndexNotFound { index },
			other => Self::Metadata(other),
		}
	}
}

impl ClusterError {
	pub(crate) fn index_not_found(index: impl Into<String>) -> Self {
		Self::IndexNotFound { index: index.into() }
	}

	/// True when the caller cannot tell whether the mutation was applied.
	pub fn is_outcome_unknown(&self) -> bool {
		matches!(self, Self::InterruptedWait { .. })
	}
}

fn join_failures(failures: &[ShardFailure]) -> String {
	let parts: Vec<String> = failures.iter().map(ToString::to_string).collect();
	format!("[{}]", parts.join(", "))
}

pub type Result<T, E = ClusterError> = std::result::Result<T, E>;
