//! Index warmers: named query profiles stored as index custom metadata.

use std::any::Any;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use serde_json::{Map, Value};

use crate::custom::{CustomKind, IndexCustom};
use crate::error::{MetadataError, Result};
use crate::pattern::NamePattern;

/// One named warmer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmerEntry {
	name: String,
	types: Vec<String>,
	source: Option<Bytes>,
}

impl WarmerEntry {
	/// Creates an entry. Empty `types` means every document type.
	pub fn new(name: impl Into<String>, types: Vec<String>, source: Option<Bytes>) -> Self {
		Self {
			name: name.into(),
			types,
			source,
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn types(&self) -> &[String] {
		&self.types
	}

	/// Serialized warming query.
	pub fn source(&self) -> Option<&Bytes> {
		self.source.as_ref()
	}

	fn to_value(&self) -> Value {
		let mut obj = Map::new();
		obj.insert("name".into(), Value::from(self.name.as_str()));
		obj.insert("types".into(), Value::from(self.types.clone()));
		// Text payloads are stored verbatim so whitespace and key order survive.
		if let Some(source) = &self.source {
			match std::str::from_utf8(source) {
				Ok(text) => obj.insert("source".into(), Value::from(text)),
				Err(_) => obj.insert("source_base64".into(), Value::from(BASE64.encode(source))),
			};
		}
		Value::Object(obj)
	}

	fn from_value(value: &Value) -> Result<Self> {
		let obj = value.as_object().ok_or_else(|| decode_err("warmer entry must be an object"))?;
		let name = obj
			.get("name")
			.and_then(Value::as_str)
			.ok_or_else(|| decode_err("warmer entry is missing [name]"))?;
		let types = match obj.get("types") {
			None | Some(Value::Null) => Vec::new(),
			Some(Value::Array(items)) => items
				.iter()
				.map(|item| item.as_str().map(str::to_string).ok_or_else(|| decode_err("warmer [types] must be strings")))
				.collect::<Result<_>>()?,
			Some(_) => return Err(decode_err("warmer [types] must be an array")),
		};
		let source = if let Some(encoded) = obj.get("source_base64").and_then(Value::as_str) {
			let raw = BASE64.decode(encoded).map_err(|err| decode_err(&format!("warmer [source_base64]: {err}")))?;
			Some(Bytes::from(raw))
		} else {
			match obj.get("source") {
				None | Some(Value::Null) => None,
				Some(Value::String(text)) => Some(Bytes::from(text.clone())),
				// Hand-written state may embed the query as an object.
				Some(source) => Some(Bytes::from(serde_json::to_vec(source).map_err(|err| decode_err(&err.to_string()))?)),
			}
		};
		Ok(Self::new(name, types, source))
	}
}

fn decode_err(msg: &str) -> MetadataError {
	MetadataError::Decode(msg.to_string())
}

/// Whether an upsert replaced an existing entry or appended a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
	Appended,
	Replaced,
}

/// Ordered warmer collection of one index. Names are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexWarmers {
	entries: Arc<[WarmerEntry]>,
}

impl IndexWarmers {
	pub fn new() -> Self {
		Self::default()
	}

	/// Collection holding exactly `entry`.
	pub fn single(entry: WarmerEntry) -> Self {
		Self {
			entries: Arc::from(vec![entry]),
		}
	}

	pub fn entries(&self) -> &[WarmerEntry] {
		&self.entries
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn get(&self, name: &str) -> Option<&WarmerEntry> {
		self.entries.iter().find(|entry| entry.name == name)
	}

	/// Returns a collection with `entry` folded in.
	///
	/// An entry with the same name is replaced at its position; otherwise the
	/// entry is appended. Untouched entries keep their relative order.
	pub fn upsert(&self, entry: WarmerEntry) -> (Self, Upsert) {
		let mut entries = Vec::with_capacity(self.entries.len() + 1);
		let mut outcome = Upsert::Appended;
		let mut pending = Some(entry);
		for existing in self.entries.iter() {
			match pending.take_if(|candidate| candidate.name == existing.name) {
				Some(replacement) => {
					entries.push(replacement);
					outcome = Upsert::Replaced;
				}
				None => entries.push(existing.clone()),
			}
		}
		entries.extend(pending);
		(
			Self {
				entries: Arc::from(entries),
			},
			outcome,
		)
	}

	/// Returns a collection without the entries matching `pattern`, and how many were removed.
	pub fn remove_matching(&self, pattern: &NamePattern) -> (Self, usize) {
		let kept: Vec<WarmerEntry> = self.entries.iter().filter(|entry| !pattern.matches(&entry.name)).cloned().collect();
		let removed = self.entries.len() - kept.len();
		(Self { entries: Arc::from(kept) }, removed)
	}
}

impl FromIterator<WarmerEntry> for IndexWarmers {
	/// Builds a collection by upserting each entry in turn.
	fn from_iter<I: IntoIterator<Item = WarmerEntry>>(iter: I) -> Self {
		iter.into_iter().fold(Self::new(), |acc, entry| acc.upsert(entry).0)
	}
}

impl IndexCustom for IndexWarmers {
	fn kind(&self) -> &'static str {
		Self::KIND
	}

	fn to_value(&self) -> Value {
		Value::Array(self.entries.iter().map(WarmerEntry::to_value).collect())
	}

	fn merge(&self, newer: &dyn IndexCustom) -> Option<Arc<dyn IndexCustom>> {
		let newer = newer.as_any().downcast_ref::<IndexWarmers>()?;
		let merged = newer.entries.iter().cloned().fold(self.clone(), |acc, entry| acc.upsert(entry).0);
		Some(Arc::new(merged))
	}

	fn as_any(&self) -> &dyn Any {
		self
	}
}

impl CustomKind for IndexWarmers {
	const KIND: &'static str = "warmers";

	fn decode(value: &Value) -> Result<Self> {
		let items = value.as_array().ok_or_else(|| decode_err("warmers must be an array"))?;
		items.iter().map(WarmerEntry::from_value).collect()
	}
}

/// Convenience for building a JSON warming query payload.
pub fn json_source(value: Value) -> Bytes {
	Bytes::from(value.to_string())
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use proptest::prelude::*;

	use super::*;

	fn entry(name: &str, query: &str) -> WarmerEntry {
		WarmerEntry::new(name, vec!["type1".into()], Some(Bytes::from(query.to_string())))
	}

	fn names(warmers: &IndexWarmers) -> Vec<&str> {
		warmers.entries().iter().map(WarmerEntry::name).collect()
	}

	#[test]
	fn upsert_appends_new_names() {
		let (warmers, outcome) = IndexWarmers::new().upsert(entry("w1", "q1"));
		assert_eq!(outcome, Upsert::Appended);
		let (warmers, outcome) = warmers.upsert(entry("w2", "q2"));
		assert_eq!(outcome, Upsert::Appended);
		assert_eq!(names(&warmers), vec!["w1", "w2"]);
	}

	#[test]
	fn upsert_replaces_in_place() {
		let warmers: IndexWarmers = [entry("a", "1"), entry("b", "2"), entry("c", "3")].into_iter().collect();
		let (updated, outcome) = warmers.upsert(entry("b", "22"));
		assert_eq!(outcome, Upsert::Replaced);
		assert_eq!(names(&updated), vec!["a", "b", "c"]);
		assert_eq!(updated.get("b").and_then(WarmerEntry::source), Some(&Bytes::from("22")));
		// Base value is untouched.
		assert_eq!(warmers.get("b").and_then(WarmerEntry::source), Some(&Bytes::from("2")));
	}

	#[test]
	fn merge_upserts_every_newer_entry() {
		let base: IndexWarmers = [entry("a", "1"), entry("b", "2")].into_iter().collect();
		let newer: IndexWarmers = [entry("b", "20"), entry("c", "30")].into_iter().collect();
		let merged = base.merge(&newer).unwrap();
		let merged = merged.as_any().downcast_ref::<IndexWarmers>().unwrap();
		assert_eq!(names(merged), vec!["a", "b", "c"]);
		assert_eq!(merged.get("b").and_then(WarmerEntry::source), Some(&Bytes::from("20")));
	}

	#[test]
	fn remove_matching_counts_removed() {
		let warmers: IndexWarmers = [entry("hot-1", "1"), entry("hot-2", "2"), entry("cold", "3")].into_iter().collect();
		let (left, removed) = warmers.remove_matching(&NamePattern::new("hot-*").unwrap());
		assert_eq!(removed, 2);
		assert_eq!(names(&left), vec!["cold"]);
	}

	#[test]
	fn json_and_binary_sources_survive_decoding() {
		let warmers: IndexWarmers = [
			WarmerEntry::new("json", vec![], Some(json_source(serde_json::json!({"query": {"match_all": {}}})))),
			WarmerEntry::new("raw", vec!["t".into()], Some(Bytes::from_static(&[0xff, 0x00, 0x10]))),
			WarmerEntry::new("none", vec![], None),
		]
		.into_iter()
		.collect();
		let decoded = IndexWarmers::decode(&warmers.to_value()).unwrap();
		assert_eq!(decoded, warmers);
	}

	#[test]
	fn text_sources_are_stored_verbatim() {
		let spaced = r#"{ "query" : {"b":1, "a":2} }"#;
		let warmers: IndexWarmers = [
			WarmerEntry::new("spaced", vec![], Some(Bytes::from_static(spaced.as_bytes()))),
			WarmerEntry::new("null", vec![], Some(Bytes::from_static(b"null"))),
			WarmerEntry::new("plain", vec![], Some(Bytes::from_static(b"not json"))),
		]
		.into_iter()
		.collect();
		let value = warmers.to_value();
		assert_eq!(value[0]["source"], Value::from(spaced));

		let decoded = IndexWarmers::decode(&value).unwrap();
		assert_eq!(decoded, warmers);
		assert_eq!(decoded.get("null").and_then(WarmerEntry::source), Some(&Bytes::from_static(b"null")));
	}

	#[test]
	fn embedded_object_sources_are_accepted() {
		let value = serde_json::json!([{"name": "w", "types": [], "source": {"match_all": {}}}]);
		let decoded = IndexWarmers::decode(&value).unwrap();
		assert_eq!(decoded.get("w").and_then(WarmerEntry::source), Some(&Bytes::from_static(br#"{"match_all":{}}"#)));
	}

	proptest! {
		#[test]
		fn repeated_upserts_keep_one_entry_with_last_payload(payloads in prop::collection::vec("[a-z]{1,8}", 1..20)) {
			let mut warmers = IndexWarmers::new();
			for payload in &payloads {
				warmers = warmers.upsert(entry("w", payload)).0;
			}
			prop_assert_eq!(warmers.len(), 1);
			let last = payloads.last().cloned().unwrap_or_default();
			prop_assert_eq!(warmers.get("w").and_then(WarmerEntry::source), Some(&Bytes::from(last)));
		}

		#[test]
		fn size_equals_distinct_names(names in prop::collection::vec("[a-e]", 0..30)) {
			let warmers: IndexWarmers = names.iter().map(|n| entry(n, "q")).collect();
			let mut distinct = names.clone();
			distinct.sort();
			distinct.dedup();
			prop_assert_eq!(warmers.len(), distinct.len());
		}
	}
}
