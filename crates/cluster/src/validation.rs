//! Read-only pre-commit validation.
//!
//! A mutation that carries a query is first checked by running that query
//! against live data. The coordinator only looks at the shard failure count:
//! any failure rejects the request before it reaches the update queue, and a
//! clean run is accepted as-is even if a shard silently returned partial
//! results. The check is not repeated after commit.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::ClusterError;

/// Failure of one shard while executing a validation query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardFailure {
	pub index: String,
	pub shard: u32,
	pub reason: String,
}

impl ShardFailure {
	pub fn new(index: impl Into<String>, shard: u32, reason: impl Into<String>) -> Self {
		Self {
			index: index.into(),
			shard,
			reason: reason.into(),
		}
	}
}

impl fmt::Display for ShardFailure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "[{}][{}]: {}", self.index, self.shard, self.reason)
	}
}

/// Query to validate and the scope to run it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRequest {
	/// Concrete index names.
	pub indices: Vec<String>,
	/// Document types; empty means all.
	pub types: Vec<String>,
	pub source: Option<Bytes>,
}

/// Outcome reported by the collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
	pub total_shards: u32,
	pub successful_shards: u32,
	pub failures: Vec<ShardFailure>,
}

impl ValidationResult {
	/// All `total` shards succeeded.
	pub fn succeeded(total: u32) -> Self {
		Self {
			total_shards: total,
			successful_shards: total,
			failures: Vec::new(),
		}
	}

	/// `failures.len()` of `total` shards failed.
	pub fn with_failures(total: u32, failures: Vec<ShardFailure>) -> Self {
		let failed = u32::try_from(failures.len()).unwrap_or(u32::MAX);
		Self {
			total_shards: total,
			successful_shards: total.saturating_sub(failed),
			failures,
		}
	}

	pub fn failed_shards(&self) -> usize {
		self.failures.len()
	}
}

/// The collaborator could not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidatorError {
	#[error("validation timed out after {0:?}")]
	Timeout(Duration),
	#[error("{0}")]
	Unavailable(String),
}

/// Executes validation queries. Implementations must not mutate cluster state.
#[async_trait]
pub trait QueryValidator: Send + Sync {
	async fn validate(&self, request: &ValidationRequest) -> Result<ValidationResult, ValidatorError>;
}

/// Validator that accepts every query, reporting one successful shard per index.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllValidator;

#[async_trait]
impl QueryValidator for AcceptAllValidator {
	async fn validate(&self, request: &ValidationRequest) -> Result<ValidationResult, ValidatorError> {
		Ok(ValidationResult::succeeded(u32::try_from(request.indices.len()).unwrap_or(u32::MAX)))
	}
}

/// Runs `request` through `validator`, mapping the outcome onto cluster errors.
pub async fn run_validation(validator: &dyn QueryValidator, request: &ValidationRequest, timeout: Option<Duration>) -> Result<ValidationResult, ClusterError> {
	let outcome = match timeout {
		Some(limit) => tokio::time::timeout(limit, validator.validate(request))
			.await
			.unwrap_or(Err(ValidatorError::Timeout(limit))),
		None => validator.validate(request).await,
	};

	let result = outcome.map_err(|err| ClusterError::ValidatorUnavailable(err.to_string()))?;
	if result.failed_shards() > 0 {
		tracing::warn!(
			indices = ?request.indices,
			failed = result.failed_shards(),
			total = result.total_shards,
			"cluster.validation.failed"
		);
		return Err(ClusterError::ValidationFailed { failures: result.failures });
	}
	tracing::debug!(indices = ?request.indices, total = result.total_shards, "cluster.validation.ok");
	Ok(result)
}

#[cfg(test)]
mod tests {
	use super::*;

	struct FixedValidator(ValidationResult);

	#[async_trait]
	impl QueryValidator for FixedValidator {
		async fn validate(&self, _request: &ValidationRequest) -> Result<ValidationResult, ValidatorError> {
			Ok(self.0.clone())
		}
	}

	struct HangingValidator;

	#[async_trait]
	impl QueryValidator for HangingValidator {
		async fn validate(&self, _request: &ValidationRequest) -> Result<ValidationResult, ValidatorError> {
			std::future::pending().await
		}
	}

	fn request() -> ValidationRequest {
		ValidationRequest {
			indices: vec!["test".into()],
			types: vec![],
			source: Some(Bytes::from_static(b"{}")),
		}
	}

	#[tokio::test]
	async fn shard_failures_are_surfaced_verbatim() {
		let failures = vec![ShardFailure::new("test", 0, "parse error"), ShardFailure::new("test", 3, "timeout")];
		let validator = FixedValidator(ValidationResult::with_failures(5, failures.clone()));
		let err = run_validation(&validator, &request(), None).await.unwrap_err();
		assert_eq!(err, ClusterError::ValidationFailed { failures });
		assert_eq!(
			err.to_string(),
			"validation query failed on 2 shard(s): [[test][0]: parse error, [test][3]: timeout]"
		);
	}

	#[tokio::test]
	async fn zero_failures_is_accepted() {
		let result = run_validation(&AcceptAllValidator, &request(), None).await.unwrap();
		assert_eq!(result, ValidationResult::succeeded(1));
	}

	#[tokio::test]
	async fn timeout_maps_to_unavailable() {
		let err = run_validation(&HangingValidator, &request(), Some(Duration::from_millis(10))).await.unwrap_err();
		assert!(matches!(err, ClusterError::ValidatorUnavailable(msg) if msg.contains("timed out")));
	}
}
