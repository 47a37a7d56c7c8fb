use std::collections::BTreeMap;

use cairn_metadata::pattern::{NamePattern, selects_all};
use cairn_metadata::{IndexWarmers, WarmerEntry};

use crate::error::Result;
use crate::state::ClusterState;

/// Warmers per index, read from one snapshot.
///
/// Indices come from `indices` patterns; `names` filters warmers by name or
/// glob and may be empty to return them all. Indices without a matching
/// warmer are left out.
pub fn get_warmers<S: AsRef<str>>(state: &ClusterState, indices: &[S], names: &[S]) -> Result<BTreeMap<String, Vec<WarmerEntry>>> {
	let concrete = state.metadata().concrete_indices(indices)?;
	let filters = if selects_all(names) {
		Vec::new()
	} else {
		names.iter().map(|name| NamePattern::new(name.as_ref())).collect::<cairn_metadata::Result<Vec<_>>>()?
	};

	let mut found = BTreeMap::new();
	for index in concrete {
		let Some(warmers) = state.metadata().index(&index).and_then(|meta| meta.custom::<IndexWarmers>()) else {
			continue;
		};
		let matching: Vec<WarmerEntry> = warmers
			.entries()
			.iter()
			.filter(|entry| filters.is_empty() || filters.iter().any(|filter| filter.matches(entry.name())))
			.cloned()
			.collect();
		if !matching.is_empty() {
			found.insert(index, matching);
		}
	}
	Ok(found)
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use cairn_metadata::{IndexMetadata, Metadata};
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::blocks::ClusterBlocks;

	#[test]
	fn filters_by_index_and_name() {
		let warmers: IndexWarmers = ["hot", "cold"].into_iter().map(|name| WarmerEntry::new(name, vec![], None)).collect();
		let mut builder = Metadata::new().builder();
		builder.put(Arc::new(IndexMetadata::new("logs-1").with_custom(Arc::new(warmers))));
		builder.put(Arc::new(IndexMetadata::new("logs-2")));
		let state = ClusterState::new(builder.build(), ClusterBlocks::new());

		let all = get_warmers(&state, &["logs-*"], &[]).unwrap();
		assert_eq!(all.keys().collect::<Vec<_>>(), ["logs-1"]);
		assert_eq!(all["logs-1"].len(), 2);

		let hot = get_warmers(&state, &["_all"], &["h*"]).unwrap();
		assert_eq!(hot["logs-1"].iter().map(WarmerEntry::name).collect::<Vec<_>>(), ["hot"]);

		assert!(get_warmers(&state, &["logs-1"], &["none"]).unwrap().is_empty());
	}
}
