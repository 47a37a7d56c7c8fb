use std::collections::BTreeSet;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::{Map, Value};

use crate::custom::CustomRegistry;
use crate::error::{MetadataError, Result};
use crate::index::IndexMetadata;
use crate::pattern::{ALL, NamePattern, is_pattern, selects_all};

type IndexTable = FxHashMap<String, Arc<IndexMetadata>>;

/// Immutable cluster metadata: index name to index metadata.
///
/// Cloning is one `Arc` bump. Edits produce a new value whose untouched
/// [`IndexMetadata`] entries are the same allocations as in the receiver.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
	indices: Arc<IndexTable>,
}

impl Metadata {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns true when both values are the same allocation.
	pub fn ptr_eq(lhs: &Self, rhs: &Self) -> bool {
		Arc::ptr_eq(&lhs.indices, &rhs.indices)
	}

	pub fn len(&self) -> usize {
		self.indices.len()
	}

	pub fn is_empty(&self) -> bool {
		self.indices.is_empty()
	}

	pub fn has_index(&self, name: &str) -> bool {
		self.indices.contains_key(name)
	}

	pub fn index(&self, name: &str) -> Option<&Arc<IndexMetadata>> {
		self.indices.get(name)
	}

	/// Index names, sorted.
	pub fn index_names(&self) -> Vec<String> {
		let mut names: Vec<String> = self.indices.keys().cloned().collect();
		names.sort_unstable();
		names
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<IndexMetadata>)> {
		self.indices.iter().map(|(name, index)| (name.as_str(), index))
	}

	/// Returns a copy with the existing entry `name` replaced.
	pub fn with_index(&self, name: &str, index: Arc<IndexMetadata>) -> Result<Self> {
		if !self.has_index(name) {
			return Err(MetadataError::IndexNotFound(name.to_string()));
		}
		let mut builder = self.builder();
		builder.put(index);
		Ok(builder.build())
	}

	/// Starts a batch of edits based on this value.
	pub fn builder(&self) -> MetadataBuilder {
		MetadataBuilder {
			indices: Arc::clone(&self.indices),
		}
	}

	/// Resolves index names and patterns to concrete, existing index names.
	///
	/// * `[]`, `["_all"]` and `["*"]` select every index.
	/// * Glob patterns expand against existing names; no match is not an error.
	/// * `-pattern` removes matches from what was selected so far (or from all
	///   indices when it comes first).
	/// * Plain names must exist.
	///
	/// The result is sorted and free of duplicates.
	pub fn concrete_indices<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<String>> {
		if selects_all(names) {
			return Ok(self.index_names());
		}

		let mut selected = BTreeSet::new();
		for (position, raw) in names.iter().map(AsRef::as_ref).enumerate() {
			if let Some(excluded) = raw.strip_prefix('-').filter(|rest| !rest.is_empty()) {
				if position == 0 {
					selected.extend(self.indices.keys().cloned());
				}
				let pattern = NamePattern::new(excluded)?;
				selected.retain(|name: &String| !pattern.matches(name));
			} else if raw == ALL || is_pattern(raw) {
				let pattern = NamePattern::new(raw)?;
				selected.extend(self.indices.keys().filter(|name| pattern.matches(name)).cloned());
			} else if self.has_index(raw) {
				selected.insert(raw.to_string());
			} else {
				return Err(MetadataError::IndexNotFound(raw.to_string()));
			}
		}
		Ok(selected.into_iter().collect())
	}

	pub fn to_value(&self) -> Value {
		let indices: Map<String, Value> = self
			.index_names()
			.into_iter()
			.filter_map(|name| {
				let value = self.indices.get(&name)?.to_value();
				Some((name, value))
			})
			.collect();
		let mut obj = Map::new();
		obj.insert("indices".into(), Value::Object(indices));
		Value::Object(obj)
	}

	pub fn from_value(value: &Value, registry: &CustomRegistry) -> Result<Self> {
		let indices = value
			.get("indices")
			.and_then(Value::as_object)
			.ok_or_else(|| MetadataError::Decode("metadata is missing [indices]".into()))?;
		let mut builder = Self::new().builder();
		for (name, index) in indices {
			builder.put(Arc::new(IndexMetadata::from_value(name, index, registry)?));
		}
		Ok(builder.build())
	}
}

/// Batch editor for [`Metadata`].
///
/// The index table is copied on the first edit only; building without edits
/// returns a value that is [`Metadata::ptr_eq`] to the base.
#[derive(Debug, Clone)]
pub struct MetadataBuilder {
	indices: Arc<IndexTable>,
}

impl MetadataBuilder {
	pub fn get(&self, name: &str) -> Option<&Arc<IndexMetadata>> {
		self.indices.get(name)
	}

	pub fn contains(&self, name: &str) -> bool {
		self.indices.contains_key(name)
	}

	/// Inserts or replaces the index keyed by its own name.
	pub fn put(&mut self, index: Arc<IndexMetadata>) -> &mut Self {
		Arc::make_mut(&mut self.indices).insert(index.name().to_string(), index);
		self
	}

	pub fn remove(&mut self, name: &str) -> Option<Arc<IndexMetadata>> {
		if !self.indices.contains_key(name) {
			return None;
		}
		Arc::make_mut(&mut self.indices).remove(name)
	}

	pub fn build(self) -> Metadata {
		Metadata { indices: self.indices }
	}
}

#[cfg(test)]
mod tests {
	use bytes::Bytes;
	use pretty_assertions::assert_eq;
	use rstest::rstest;

	use super::*;
	use crate::warmers::{IndexWarmers, WarmerEntry};

	fn metadata(names: &[&str]) -> Metadata {
		let mut builder = Metadata::new().builder();
		for name in names {
			builder.put(Arc::new(IndexMetadata::new(*name)));
		}
		builder.build()
	}

	#[test]
	fn with_index_shares_untouched_entries() {
		let base = metadata(&["a", "b", "c"]);
		let edited = base.index("b").unwrap().with_custom(Arc::new(IndexWarmers::single(WarmerEntry::new("w", vec![], None))));
		let next = base.with_index("b", Arc::new(edited)).unwrap();

		assert!(Arc::ptr_eq(base.index("a").unwrap(), next.index("a").unwrap()));
		assert!(Arc::ptr_eq(base.index("c").unwrap(), next.index("c").unwrap()));
		assert!(!Arc::ptr_eq(base.index("b").unwrap(), next.index("b").unwrap()));
		assert!(base.index("b").unwrap().custom::<IndexWarmers>().is_none());
	}

	#[test]
	fn with_index_rejects_missing_name() {
		let base = metadata(&["a"]);
		let err = base.with_index("missing", Arc::new(IndexMetadata::new("missing"))).unwrap_err();
		assert_eq!(err, MetadataError::IndexNotFound("missing".into()));
	}

	#[test]
	fn builder_without_edits_is_pointer_equal() {
		let base = metadata(&["a"]);
		let mut builder = base.builder();
		assert!(builder.remove("nope").is_none());
		assert!(Metadata::ptr_eq(&base, &builder.build()));
	}

	#[rstest]
	#[case(&[], &["logs-1", "logs-2", "test"])]
	#[case(&["_all"], &["logs-1", "logs-2", "test"])]
	#[case(&["*"], &["logs-1", "logs-2", "test"])]
	#[case(&["logs-*"], &["logs-1", "logs-2"])]
	#[case(&["test", "logs-*"], &["logs-1", "logs-2", "test"])]
	#[case(&["test", "test"], &["test"])]
	#[case(&["-logs-1"], &["logs-2", "test"])]
	#[case(&["logs-*", "-logs-2"], &["logs-1"])]
	#[case(&["nomatch-*"], &[])]
	fn concrete_indices_resolution(#[case] patterns: &[&str], #[case] expected: &[&str]) {
		let md = metadata(&["test", "logs-1", "logs-2"]);
		assert_eq!(md.concrete_indices(patterns).unwrap(), expected.iter().map(|s| s.to_string()).collect::<Vec<_>>());
	}

	#[test]
	fn concrete_indices_rejects_missing_explicit_name() {
		let md = metadata(&["test"]);
		assert_eq!(md.concrete_indices(&["test", "missing"]).unwrap_err(), MetadataError::IndexNotFound("missing".into()));
	}

	#[test]
	fn json_form_decodes_back() {
		let base = metadata(&["a", "b"]);
		let warmers: IndexWarmers = [
			WarmerEntry::new("w1", vec!["type1".into()], Some(Bytes::from_static(br#"{"query":{"match_all":{}}}"#))),
			WarmerEntry::new("w2", vec![], None),
		]
		.into_iter()
		.collect();
		let a = base.index("a").unwrap().with_custom(Arc::new(warmers));
		let md = base.with_index("a", Arc::new(a)).unwrap();

		let value = md.to_value();
		let decoded = Metadata::from_value(&value, &CustomRegistry::with_builtins()).unwrap();
		assert_eq!(decoded.to_value(), value);
		assert_eq!(decoded.index("a").unwrap().custom::<IndexWarmers>().map(IndexWarmers::len), Some(2));
	}
}
