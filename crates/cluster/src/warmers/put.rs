use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use cairn_metadata::{IndexWarmers, Metadata, Upsert, WarmerEntry};
use serde::Serialize;

use crate::action::MasterNodeAction;
use crate::error::{ClusterError, Result};
use crate::service::ClusterService;
use crate::state::ClusterState;
use crate::validation::{QueryValidator, ValidationRequest, run_validation};

/// Request to add or replace one warmer on a set of indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutWarmerRequest {
	pub name: String,
	/// Index names or patterns; empty targets every index.
	pub indices: Vec<String>,
	pub types: Vec<String>,
	pub source: Option<Bytes>,
	/// Used when `source` is absent or empty.
	pub extra_source: Option<Bytes>,
}

impl PutWarmerRequest {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			..Self::default()
		}
	}

	#[must_use]
	pub fn indices<I, S>(mut self, indices: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.indices = indices.into_iter().map(Into::into).collect();
		self
	}

	#[must_use]
	pub fn types<I, S>(mut self, types: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.types = types.into_iter().map(Into::into).collect();
		self
	}

	#[must_use]
	pub fn source(mut self, source: impl Into<Bytes>) -> Self {
		self.source = Some(source.into());
		self
	}

	#[must_use]
	pub fn extra_source(mut self, source: impl Into<Bytes>) -> Self {
		self.extra_source = Some(source.into());
		self
	}

	pub fn validate(&self) -> Result<()> {
		if self.name.trim().is_empty() {
			return Err(ClusterError::InvalidRequest("warmer name is missing".into()));
		}
		Ok(())
	}

	/// The query to store: `source`, else `extra_source`, else nothing.
	pub fn effective_source(&self) -> Option<Bytes> {
		[&self.source, &self.extra_source].into_iter().flatten().find(|bytes| !bytes.is_empty()).cloned()
	}

	fn entry(&self) -> WarmerEntry {
		WarmerEntry::new(self.name.as_str(), self.types.clone(), self.effective_source())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PutWarmerResponse {
	pub acknowledged: bool,
}

/// Upserts `entry` into the warmers of every index in `indices`.
///
/// All indices change together or, if any is missing, none does.
pub fn put_warmer(current: &Metadata, indices: &[String], entry: &WarmerEntry) -> Result<Metadata> {
	let mut builder = current.builder();
	for index in indices {
		let meta = builder.get(index).ok_or_else(|| ClusterError::index_not_found(index.as_str()))?;
		let outcome = match meta.custom::<IndexWarmers>().and_then(|warmers| warmers.get(entry.name())) {
			Some(_) => Upsert::Replaced,
			None => Upsert::Appended,
		};
		let next = meta.with_custom_merged(Arc::new(IndexWarmers::single(entry.clone())));
		match outcome {
			Upsert::Appended => tracing::info!(index = %index, warmer = entry.name(), "[{index}] put warmer [{}]", entry.name()),
			Upsert::Replaced => tracing::info!(index = %index, warmer = entry.name(), "[{index}] update warmer [{}]", entry.name()),
		}
		builder.put(Arc::new(next));
	}
	Ok(builder.build())
}

/// Queue task applying [`put_warmer`] to concrete index names.
pub fn put_warmer_task(indices: Vec<String>, entry: WarmerEntry) -> impl FnOnce(&Metadata) -> Result<Metadata> + Send + 'static {
	move |current: &Metadata| put_warmer(current, &indices, &entry)
}

/// Validates the warming query, then stores the warmer through the update queue.
pub struct PutWarmerAction {
	cluster: ClusterService,
	validator: Arc<dyn QueryValidator>,
	validation_timeout: Option<Duration>,
	commit_timeout: Option<Duration>,
}

impl PutWarmerAction {
	pub fn new(cluster: ClusterService, validator: Arc<dyn QueryValidator>) -> Self {
		Self {
			cluster,
			validator,
			validation_timeout: None,
			commit_timeout: None,
		}
	}

	#[must_use]
	pub fn validation_timeout(mut self, timeout: Option<Duration>) -> Self {
		self.validation_timeout = timeout;
		self
	}

	#[must_use]
	pub fn commit_timeout(mut self, timeout: Option<Duration>) -> Self {
		self.commit_timeout = timeout;
		self
	}
}

#[async_trait]
impl MasterNodeAction for PutWarmerAction {
	type Request = PutWarmerRequest;
	type Response = PutWarmerResponse;

	fn name(&self) -> &'static str {
		"indices:admin/warmers/put"
	}

	fn cluster(&self) -> &ClusterService {
		&self.cluster
	}

	fn indices<'r>(&self, request: &'r PutWarmerRequest) -> &'r [String] {
		&request.indices
	}

	fn validate_request(&self, request: &PutWarmerRequest) -> Result<()> {
		request.validate()
	}

	async fn master_operation(&self, request: PutWarmerRequest, concrete: Vec<String>, _state: Arc<ClusterState>) -> Result<PutWarmerResponse> {
		let entry = request.entry();
		let check = ValidationRequest {
			indices: concrete.clone(),
			types: request.types.clone(),
			source: entry.source().cloned(),
		};
		run_validation(self.validator.as_ref(), &check, self.validation_timeout).await?;

		let source = format!("put_warmer [{}]", request.name);
		self.cluster
			.submit_and_wait(source, put_warmer_task(concrete, entry), self.commit_timeout)
			.await?;
		Ok(PutWarmerResponse { acknowledged: true })
	}
}

#[cfg(test)]
mod tests {
	use cairn_metadata::IndexMetadata;
	use pretty_assertions::assert_eq;
	use proptest::prelude::*;

	use super::*;

	fn metadata(names: &[&str]) -> Metadata {
		let mut builder = Metadata::new().builder();
		for name in names {
			builder.put(Arc::new(IndexMetadata::new(*name)));
		}
		builder.build()
	}

	fn warmers<'a>(md: &'a Metadata, index: &str) -> &'a IndexWarmers {
		md.index(index).and_then(|meta| meta.custom::<IndexWarmers>()).unwrap()
	}

	fn entry(name: &str, query: &'static str) -> WarmerEntry {
		WarmerEntry::new(name, vec![], Some(Bytes::from_static(query.as_bytes())))
	}

	#[test]
	fn replace_keeps_single_entry_with_last_payload() {
		let md = metadata(&["test"]);
		let md = put_warmer(&md, &["test".into()], &entry("w1", "Q1")).unwrap();
		let md = put_warmer(&md, &["test".into()], &entry("w1", "Q2")).unwrap();
		assert_eq!(warmers(&md, "test").entries(), &[entry("w1", "Q2")]);
	}

	#[test]
	fn new_name_is_appended_after_existing() {
		let md = metadata(&["test"]);
		let md = put_warmer(&md, &["test".into()], &entry("w1", "Q1")).unwrap();
		let md = put_warmer(&md, &["test".into()], &entry("w2", "Q2")).unwrap();
		let names: Vec<_> = warmers(&md, "test").entries().iter().map(WarmerEntry::name).collect();
		assert_eq!(names, ["w1", "w2"]);
	}

	#[test]
	fn missing_index_leaves_every_index_untouched() {
		let md = metadata(&["a", "b"]);
		let err = put_warmer(&md, &["a".into(), "gone".into(), "b".into()], &entry("w1", "Q1")).unwrap_err();
		assert_eq!(err, ClusterError::index_not_found("gone"));
		assert!(md.index("a").unwrap().custom::<IndexWarmers>().is_none());
	}

	#[test]
	fn untouched_indices_are_shared() {
		let md = metadata(&["a", "b"]);
		let next = put_warmer(&md, &["a".into()], &entry("w1", "Q1")).unwrap();
		assert!(Arc::ptr_eq(md.index("b").unwrap(), next.index("b").unwrap()));
	}

	#[test]
	fn source_falls_back_to_extra_source() {
		let request = PutWarmerRequest::new("w").source(Bytes::new()).extra_source(Bytes::from_static(b"{}"));
		assert_eq!(request.effective_source(), Some(Bytes::from_static(b"{}")));
		assert_eq!(PutWarmerRequest::new("w").effective_source(), None);
		let both = PutWarmerRequest::new("w").source(Bytes::from_static(b"a")).extra_source(Bytes::from_static(b"b"));
		assert_eq!(both.effective_source(), Some(Bytes::from_static(b"a")));
	}

	#[test]
	fn empty_name_is_rejected() {
		assert!(matches!(PutWarmerRequest::new(" ").validate(), Err(ClusterError::InvalidRequest(_))));
	}

	proptest! {
		#[test]
		fn last_upsert_wins_per_name(ops in proptest::collection::vec((0u8..6, 0u8..4), 1..40)) {
			let mut md = metadata(&["test"]);
			let mut expected = std::collections::BTreeMap::new();
			for (name, payload) in &ops {
				let name = format!("w{name}");
				let source = Bytes::from(format!("Q{payload}"));
				md = put_warmer(&md, &["test".into()], &WarmerEntry::new(name.as_str(), vec![], Some(source.clone()))).unwrap();
				expected.insert(name, source);
			}
			let stored = warmers(&md, "test");
			prop_assert_eq!(stored.len(), expected.len());
			for (name, source) in expected {
				prop_assert_eq!(stored.get(&name).and_then(WarmerEntry::source), Some(&source));
			}
		}
	}
}
