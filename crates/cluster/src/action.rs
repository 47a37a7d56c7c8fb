//! Master-only request handling.
//!
//! Every metadata-changing request passes the same gate before it can reach
//! the update queue: master check, request checks, index resolution against
//! the current snapshot, then metadata blocks. Each step only fast-rejects;
//! the task itself re-checks what it depends on.

use std::sync::Arc;

use async_trait::async_trait;

use crate::blocks::{ClusterBlockError, ClusterBlockLevel};
use crate::error::{ClusterError, Result};
use crate::service::ClusterService;
use crate::state::ClusterState;

#[async_trait]
pub trait MasterNodeAction: Send + Sync {
	type Request: Send + Sync + 'static;
	type Response: Send + 'static;

	fn name(&self) -> &'static str;

	fn cluster(&self) -> &ClusterService;

	/// Index names and patterns the request targets.
	fn indices<'r>(&self, request: &'r Self::Request) -> &'r [String];

	fn validate_request(&self, _request: &Self::Request) -> Result<()> {
		Ok(())
	}

	/// Blocks that forbid running `request` against `concrete` indices.
	fn check_block(&self, _request: &Self::Request, concrete: &[String], state: &ClusterState) -> Option<ClusterBlockError> {
		state.blocks().indices_blocked_error(ClusterBlockLevel::METADATA, concrete)
	}

	async fn master_operation(&self, request: Self::Request, concrete: Vec<String>, state: Arc<ClusterState>) -> Result<Self::Response>;
}

/// Runs `request` through the master gate and then `action.master_operation`.
pub async fn execute_master_action<A: MasterNodeAction>(action: &A, request: A::Request) -> Result<A::Response> {
	let cluster = action.cluster();
	if !cluster.is_master() {
		return Err(ClusterError::NotMaster {
			node: cluster.node().name.clone(),
		});
	}
	action.validate_request(&request)?;

	let state = cluster.state();
	let concrete = state.metadata().concrete_indices(action.indices(&request))?;
	if let Some(blocked) = action.check_block(&request, &concrete, &state) {
		tracing::debug!(action = action.name(), indices = ?concrete, error = %blocked, "cluster.action.blocked");
		return Err(blocked.into());
	}

	tracing::debug!(action = action.name(), indices = ?concrete, version = state.version(), "cluster.action.execute");
	action.master_operation(request, concrete, state).await
}
