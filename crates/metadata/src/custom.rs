//! Per-index custom metadata keyed by kind name.
//!
//! Every kind is an immutable value that can be serialized to JSON and merged
//! with a newer value of the same kind. Kinds are registered in a
//! [`CustomRegistry`] so snapshots can be decoded without the core knowing the
//! concrete types.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::error::{MetadataError, Result};
use crate::warmers::IndexWarmers;

/// Object-safe capability set of a custom metadata payload.
pub trait IndexCustom: fmt::Debug + Send + Sync + 'static {
	/// Kind name this payload is stored under.
	fn kind(&self) -> &'static str;

	/// JSON form of the payload.
	fn to_value(&self) -> Value;

	/// Folds `newer` into `self`, returning the combined payload.
	///
	/// Returns `None` when `newer` is a different kind.
	fn merge(&self, newer: &dyn IndexCustom) -> Option<Arc<dyn IndexCustom>>;

	fn as_any(&self) -> &dyn Any;
}

/// Statically known custom kind.
pub trait CustomKind: IndexCustom + Sized {
	const KIND: &'static str;

	fn decode(value: &Value) -> Result<Self>;
}

type DecodeFn = fn(&Value) -> Result<Arc<dyn IndexCustom>>;

fn decode_erased<T: CustomKind>(value: &Value) -> Result<Arc<dyn IndexCustom>> {
	Ok(Arc::new(T::decode(value)?))
}

/// Decoder table for custom metadata kinds.
#[derive(Clone)]
pub struct CustomRegistry {
	decoders: FxHashMap<&'static str, DecodeFn>,
}

impl fmt::Debug for CustomRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut kinds: Vec<_> = self.decoders.keys().collect();
		kinds.sort_unstable();
		f.debug_struct("CustomRegistry").field("kinds", &kinds).finish()
	}
}

impl Default for CustomRegistry {
	fn default() -> Self {
		Self::with_builtins()
	}
}

impl CustomRegistry {
	/// Registry without any kinds.
	pub fn empty() -> Self {
		Self {
			decoders: FxHashMap::default(),
		}
	}

	/// Registry with every kind shipped by this crate.
	pub fn with_builtins() -> Self {
		let mut registry = Self::empty();
		registry.register::<IndexWarmers>();
		registry
	}

	/// Registers `T`, replacing any previous decoder for the same kind.
	pub fn register<T: CustomKind>(&mut self) {
		self.decoders.insert(T::KIND, decode_erased::<T>);
	}

	pub fn contains(&self, kind: &str) -> bool {
		self.decoders.contains_key(kind)
	}

	/// Decodes one payload of the named kind.
	pub fn decode(&self, kind: &str, value: &Value) -> Result<Arc<dyn IndexCustom>> {
		let decode = self.decoders.get(kind).ok_or_else(|| MetadataError::UnknownCustom(kind.to_string()))?;
		decode(value)
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn builtins_decode_warmers() {
		let registry = CustomRegistry::with_builtins();
		assert!(registry.contains(IndexWarmers::KIND));
		let custom = registry.decode("warmers", &json!([])).unwrap();
		assert_eq!(custom.kind(), "warmers");
		assert!(custom.as_any().downcast_ref::<IndexWarmers>().is_some());
	}

	#[test]
	fn unknown_kind_is_an_error() {
		let registry = CustomRegistry::empty();
		let err = registry.decode("warmers", &json!([])).unwrap_err();
		assert_eq!(err, MetadataError::UnknownCustom("warmers".into()));
	}
}
