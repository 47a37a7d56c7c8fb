use std::collections::BTreeMap;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::custom::{CustomKind, CustomRegistry, IndexCustom};
use crate::error::{MetadataError, Result};

/// Open/closed state of an index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexState {
	#[default]
	Open,
	Close,
}

/// Immutable metadata of one index.
///
/// Every `with_*` method returns a new value; settings and untouched custom
/// payloads stay shared with the receiver.
#[derive(Debug, Clone)]
pub struct IndexMetadata {
	name: String,
	state: IndexState,
	settings: Arc<BTreeMap<String, String>>,
	customs: FxHashMap<&'static str, Arc<dyn IndexCustom>>,
}

impl IndexMetadata {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			state: IndexState::Open,
			settings: Arc::default(),
			customs: FxHashMap::default(),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn state(&self) -> IndexState {
		self.state
	}

	pub fn settings(&self) -> &BTreeMap<String, String> {
		&self.settings
	}

	pub fn setting(&self, key: &str) -> Option<&str> {
		self.settings.get(key).map(String::as_str)
	}

	/// Untyped custom payload by kind name.
	pub fn custom_dyn(&self, kind: &str) -> Option<&Arc<dyn IndexCustom>> {
		self.customs.get(kind)
	}

	/// Typed custom payload.
	pub fn custom<T: CustomKind>(&self) -> Option<&T> {
		self.customs.get(T::KIND)?.as_any().downcast_ref::<T>()
	}

	/// Kind names present on this index, sorted.
	pub fn custom_kinds(&self) -> Vec<&'static str> {
		let mut kinds: Vec<_> = self.customs.keys().copied().collect();
		kinds.sort_unstable();
		kinds
	}

	#[must_use]
	pub fn with_state(&self, state: IndexState) -> Self {
		Self { state, ..self.clone() }
	}

	#[must_use]
	pub fn with_settings(&self, settings: BTreeMap<String, String>) -> Self {
		Self {
			settings: Arc::new(settings),
			..self.clone()
		}
	}

	/// Replaces the payload stored under `custom.kind()`.
	#[must_use]
	pub fn with_custom(&self, custom: Arc<dyn IndexCustom>) -> Self {
		let mut next = self.clone();
		next.customs.insert(custom.kind(), custom);
		next
	}

	/// Merges `custom` into the payload of the same kind, or stores it if absent.
	#[must_use]
	pub fn with_custom_merged(&self, custom: Arc<dyn IndexCustom>) -> Self {
		let merged = match self.customs.get(custom.kind()) {
			Some(existing) => existing.merge(custom.as_ref()).unwrap_or(custom),
			None => custom,
		};
		self.with_custom(merged)
	}

	#[must_use]
	pub fn without_custom(&self, kind: &str) -> Self {
		let mut next = self.clone();
		next.customs.remove(kind);
		next
	}

	pub fn to_value(&self) -> Value {
		let mut customs = Map::new();
		for kind in self.custom_kinds() {
			if let Some(custom) = self.customs.get(kind) {
				customs.insert(kind.to_string(), custom.to_value());
			}
		}
		let mut obj = Map::new();
		obj.insert("state".into(), serde_json::to_value(self.state).unwrap_or(Value::Null));
		obj.insert("settings".into(), Value::Object(self.settings.iter().map(|(k, v)| (k.clone(), Value::from(v.as_str()))).collect()));
		obj.insert("customs".into(), Value::Object(customs));
		Value::Object(obj)
	}

	pub fn from_value(name: &str, value: &Value, registry: &CustomRegistry) -> Result<Self> {
		let obj = value
			.as_object()
			.ok_or_else(|| MetadataError::Decode(format!("index [{name}] must be an object")))?;
		let state = match obj.get("state") {
			None => IndexState::Open,
			Some(state) => serde_json::from_value(state.clone()).map_err(|err| MetadataError::Decode(format!("index [{name}] state: {err}")))?,
		};
		let settings = match obj.get("settings") {
			None => BTreeMap::new(),
			Some(settings) => {
				serde_json::from_value(settings.clone()).map_err(|err| MetadataError::Decode(format!("index [{name}] settings: {err}")))?
			}
		};
		let mut index = Self::new(name).with_state(state).with_settings(settings);
		if let Some(customs) = obj.get("customs").and_then(Value::as_object) {
			for (kind, payload) in customs {
				index = index.with_custom(registry.decode(kind, payload)?);
			}
		}
		Ok(index)
	}
}

#[cfg(test)]
mod tests {
	use bytes::Bytes;

	use super::*;
	use crate::warmers::{IndexWarmers, WarmerEntry};

	fn warmer(name: &str) -> Arc<dyn IndexCustom> {
		Arc::new(IndexWarmers::single(WarmerEntry::new(name, vec![], Some(Bytes::from_static(b"{}")))))
	}

	#[test]
	fn with_custom_leaves_receiver_untouched() {
		let base = IndexMetadata::new("test");
		let next = base.with_custom(warmer("w1"));
		assert!(base.custom::<IndexWarmers>().is_none());
		assert_eq!(next.custom::<IndexWarmers>().map(IndexWarmers::len), Some(1));
	}

	#[test]
	fn merged_custom_upserts_into_existing() {
		let index = IndexMetadata::new("test").with_custom(warmer("w1")).with_custom_merged(warmer("w2")).with_custom_merged(warmer("w1"));
		let names: Vec<_> = index.custom::<IndexWarmers>().unwrap().entries().iter().map(WarmerEntry::name).collect();
		assert_eq!(names, vec!["w1", "w2"]);
	}

	#[test]
	fn settings_are_shared_across_custom_edits() {
		let mut settings = BTreeMap::new();
		settings.insert("index.number_of_shards".to_string(), "5".to_string());
		let base = IndexMetadata::new("test").with_settings(settings);
		let next = base.with_custom(warmer("w1"));
		assert!(Arc::ptr_eq(&base.settings, &next.settings));
		assert_eq!(next.setting("index.number_of_shards"), Some("5"));
	}

	#[test]
	fn without_custom_drops_kind() {
		let index = IndexMetadata::new("test").with_custom(warmer("w1")).without_custom(IndexWarmers::KIND);
		assert!(index.custom_kinds().is_empty());
	}
}
