use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cairn_metadata::pattern::NamePattern;
use cairn_metadata::{CustomKind, IndexWarmers, Metadata};
use serde::Serialize;

use crate::action::MasterNodeAction;
use crate::error::{ClusterError, Result};
use crate::service::ClusterService;
use crate::state::ClusterState;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteWarmerRequest {
	pub indices: Vec<String>,
	/// Warmer name or glob; `_all` and `*` remove every warmer.
	pub name: String,
}

impl DeleteWarmerRequest {
	pub fn new<I, S>(indices: I, name: impl Into<String>) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			indices: indices.into_iter().map(Into::into).collect(),
			name: name.into(),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteWarmerResponse {
	pub acknowledged: bool,
}

/// Removes warmers matching `name` from every index in `indices`.
///
/// Fails with [`ClusterError::WarmerNotFound`] when no index held a match.
pub fn delete_warmer(current: &Metadata, indices: &[String], name: &str) -> Result<Metadata> {
	let pattern = NamePattern::new(name)?;
	let mut builder = current.builder();
	let mut removed_total = 0;
	for index in indices {
		let meta = builder.get(index).ok_or_else(|| ClusterError::index_not_found(index.as_str()))?;
		let Some(warmers) = meta.custom::<IndexWarmers>() else {
			continue;
		};
		let (kept, removed) = warmers.remove_matching(&pattern);
		if removed == 0 {
			continue;
		}
		let next = if kept.is_empty() {
			meta.without_custom(IndexWarmers::KIND)
		} else {
			meta.with_custom(Arc::new(kept))
		};
		tracing::info!(index = %index, warmer = name, removed, "[{index}] delete warmer [{name}]");
		removed_total += removed;
		builder.put(Arc::new(next));
	}
	if removed_total == 0 {
		return Err(ClusterError::WarmerNotFound { name: name.to_string() });
	}
	Ok(builder.build())
}

pub fn delete_warmer_task(indices: Vec<String>, name: String) -> impl FnOnce(&Metadata) -> Result<Metadata> + Send + 'static {
	move |current: &Metadata| delete_warmer(current, &indices, &name)
}

pub struct DeleteWarmerAction {
	cluster: ClusterService,
	commit_timeout: Option<Duration>,
}

impl DeleteWarmerAction {
	pub fn new(cluster: ClusterService) -> Self {
		Self { cluster, commit_timeout: None }
	}

	#[must_use]
	pub fn commit_timeout(mut self, timeout: Option<Duration>) -> Self {
		self.commit_timeout = timeout;
		self
	}
}

#[async_trait]
impl MasterNodeAction for DeleteWarmerAction {
	type Request = DeleteWarmerRequest;
	type Response = DeleteWarmerResponse;

	fn name(&self) -> &'static str {
		"indices:admin/warmers/delete"
	}

	fn cluster(&self) -> &ClusterService {
		&self.cluster
	}

	fn indices<'r>(&self, request: &'r DeleteWarmerRequest) -> &'r [String] {
		&request.indices
	}

	fn validate_request(&self, request: &DeleteWarmerRequest) -> Result<()> {
		if request.name.trim().is_empty() {
			return Err(ClusterError::InvalidRequest("warmer name is missing".into()));
		}
		Ok(())
	}

	async fn master_operation(&self, request: DeleteWarmerRequest, concrete: Vec<String>, _state: Arc<ClusterState>) -> Result<DeleteWarmerResponse> {
		let source = format!("delete_warmer [{}]", request.name);
		self.cluster
			.submit_and_wait(source, delete_warmer_task(concrete, request.name), self.commit_timeout)
			.await?;
		Ok(DeleteWarmerResponse { acknowledged: true })
	}
}
