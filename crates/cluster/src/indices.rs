//! Index lifecycle transitions.

use std::collections::BTreeMap;
use std::sync::Arc;

use cairn_metadata::{IndexMetadata, Metadata};

use crate::error::{ClusterError, Result};

/// Rejects names that could not be addressed unambiguously by patterns.
pub fn validate_index_name(name: &str) -> Result<()> {
	let invalid = |reason: &str| {
		Err(ClusterError::InvalidIndexName {
			index: name.to_string(),
			reason: reason.to_string(),
		})
	};
	if name.is_empty() {
		return invalid("must not be empty");
	}
	if name.starts_with('_') {
		return invalid("must not start with '_'");
	}
	if name.starts_with('-') {
		return invalid("must not start with '-'");
	}
	if name.chars().any(char::is_uppercase) {
		return invalid("must be lowercase");
	}
	if let Some(bad) = name.chars().find(|c| c.is_whitespace() || matches!(c, ',' | '*' | '?' | '/' | '\\' | '"')) {
		return invalid(&format!("must not contain {bad:?}"));
	}
	Ok(())
}

pub fn create_index(current: &Metadata, name: &str, settings: BTreeMap<String, String>) -> Result<Metadata> {
	validate_index_name(name)?;
	if current.has_index(name) {
		return Err(ClusterError::IndexAlreadyExists { index: name.to_string() });
	}
	let mut builder = current.builder();
	builder.put(Arc::new(IndexMetadata::new(name).with_settings(settings)));
	tracing::info!(index = name, "[{name}] created index");
	Ok(builder.build())
}

pub fn delete_index(current: &Metadata, name: &str) -> Result<Metadata> {
	let mut builder = current.builder();
	if builder.remove(name).is_none() {
		return Err(ClusterError::index_not_found(name));
	}
	tracing::info!(index = name, "[{name}] deleted index");
	Ok(builder.build())
}

pub fn create_index_task(name: impl Into<String>, settings: BTreeMap<String, String>) -> impl FnOnce(&Metadata) -> Result<Metadata> + Send + 'static {
	let name = name.into();
	move |current: &Metadata| create_index(current, &name, settings)
}

pub fn delete_index_task(name: impl Into<String>) -> impl FnOnce(&Metadata) -> Result<Metadata> + Send + 'static {
	let name = name.into();
	move |current: &Metadata| delete_index(current, &name)
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	#[rstest]
	#[case("")]
	#[case("_hidden")]
	#[case("-neg")]
	#[case("Upper")]
	#[case("a,b")]
	#[case("log*")]
	#[case("with space")]
	fn rejects_invalid_names(#[case] name: &str) {
		assert!(matches!(validate_index_name(name), Err(ClusterError::InvalidIndexName { .. })));
	}

	#[test]
	fn create_then_delete() {
		let md = create_index(&Metadata::new(), "test", BTreeMap::from([("number_of_shards".to_string(), "5".to_string())])).unwrap();
		assert_eq!(md.index("test").and_then(|index| index.setting("number_of_shards")), Some("5"));
		assert_eq!(
			create_index(&md, "test", BTreeMap::new()).unwrap_err(),
			ClusterError::IndexAlreadyExists { index: "test".into() }
		);

		let md = delete_index(&md, "test").unwrap();
		assert!(md.is_empty());
		assert_eq!(delete_index(&md, "test").unwrap_err(), ClusterError::index_not_found("test"));
	}
}
