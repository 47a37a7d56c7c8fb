//! Cluster-wide and per-index operation blocks.

use std::collections::BTreeMap;
use std::fmt;

use bitflags::bitflags;
use cairn_metadata::Metadata;

bitflags! {
	/// Operation classes a block applies to.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
	pub struct ClusterBlockLevel: u8 {
		const READ = 1;
		const WRITE = 1 << 1;
		const METADATA = 1 << 2;
	}
}

/// One block, global or attached to an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterBlock {
	id: u32,
	description: String,
	retryable: bool,
	levels: ClusterBlockLevel,
}

impl ClusterBlock {
	pub fn new(id: u32, description: impl Into<String>, retryable: bool, levels: ClusterBlockLevel) -> Self {
		Self {
			id,
			description: description.into(),
			retryable,
			levels,
		}
	}

	/// Global read-only: rejects writes and metadata changes cluster-wide.
	pub fn cluster_read_only() -> Self {
		Self::new(6, "cluster read-only (api)", false, ClusterBlockLevel::WRITE | ClusterBlockLevel::METADATA)
	}

	/// Per-index read-only.
	pub fn index_read_only() -> Self {
		Self::new(5, "index read-only (api)", false, ClusterBlockLevel::WRITE | ClusterBlockLevel::METADATA)
	}

	/// Per-index metadata freeze.
	pub fn index_metadata() -> Self {
		Self::new(9, "index metadata (api)", false, ClusterBlockLevel::METADATA)
	}

	/// Set while an index is closed. Metadata changes stay allowed.
	pub fn index_closed() -> Self {
		Self::new(4, "index closed", false, ClusterBlockLevel::READ | ClusterBlockLevel::WRITE)
	}

	pub fn id(&self) -> u32 {
		self.id
	}

	pub fn description(&self) -> &str {
		&self.description
	}

	pub fn retryable(&self) -> bool {
		self.retryable
	}

	pub fn levels(&self) -> ClusterBlockLevel {
		self.levels
	}

	pub fn applies_to(&self, level: ClusterBlockLevel) -> bool {
		self.levels.intersects(level)
	}
}

impl fmt::Display for ClusterBlock {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.id, self.description)
	}
}

/// Blocks that rejected an operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("blocked by: [{}]", describe(.blocks))]
pub struct ClusterBlockError {
	blocks: Vec<ClusterBlock>,
}

impl ClusterBlockError {
	pub fn blocks(&self) -> &[ClusterBlock] {
		&self.blocks
	}

	/// True when every blocking entry may clear on its own.
	pub fn retryable(&self) -> bool {
		self.blocks.iter().all(ClusterBlock::retryable)
	}
}

fn describe(blocks: &[ClusterBlock]) -> String {
	let parts: Vec<String> = blocks.iter().map(ToString::to_string).collect();
	parts.join(", ")
}

/// Immutable block table carried by each cluster state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterBlocks {
	global: Vec<ClusterBlock>,
	indices: BTreeMap<String, Vec<ClusterBlock>>,
}

impl ClusterBlocks {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn global(&self) -> &[ClusterBlock] {
		&self.global
	}

	pub fn index_blocks(&self, index: &str) -> &[ClusterBlock] {
		self.indices.get(index).map(Vec::as_slice).unwrap_or_default()
	}

	pub fn global_blocked(&self, level: ClusterBlockLevel) -> bool {
		self.global.iter().any(|block| block.applies_to(level))
	}

	pub fn global_blocked_error(&self, level: ClusterBlockLevel) -> Option<ClusterBlockError> {
		let blocks: Vec<_> = self.global.iter().filter(|block| block.applies_to(level)).cloned().collect();
		(!blocks.is_empty()).then_some(ClusterBlockError { blocks })
	}

	/// Global blocks plus the blocks of every named index that apply to `level`.
	pub fn indices_blocked_error<S: AsRef<str>>(&self, level: ClusterBlockLevel, indices: &[S]) -> Option<ClusterBlockError> {
		let mut blocks: Vec<ClusterBlock> = self.global.iter().filter(|block| block.applies_to(level)).cloned().collect();
		for index in indices {
			for block in self.index_blocks(index.as_ref()) {
				if block.applies_to(level) && !blocks.contains(block) {
					blocks.push(block.clone());
				}
			}
		}
		(!blocks.is_empty()).then_some(ClusterBlockError { blocks })
	}

	#[must_use]
	pub fn with_global_block(&self, block: ClusterBlock) -> Self {
		let mut next = self.clone();
		if !next.global.iter().any(|existing| existing.id == block.id) {
			next.global.push(block);
		}
		next
	}

	#[must_use]
	pub fn without_global_block(&self, id: u32) -> Self {
		let mut next = self.clone();
		next.global.retain(|block| block.id != id);
		next
	}

	#[must_use]
	pub fn with_index_block(&self, index: &str, block: ClusterBlock) -> Self {
		let mut next = self.clone();
		let entry = next.indices.entry(index.to_string()).or_default();
		if !entry.iter().any(|existing| existing.id == block.id) {
			entry.push(block);
		}
		next
	}

	#[must_use]
	pub fn without_index_block(&self, index: &str, id: u32) -> Self {
		let mut next = self.clone();
		if let Some(entry) = next.indices.get_mut(index) {
			entry.retain(|block| block.id != id);
			if entry.is_empty() {
				next.indices.remove(index);
			}
		}
		next
	}

	/// Drops per-index blocks of indices missing from `metadata`.
	///
	/// Returns `None` when nothing had to be dropped.
	pub(crate) fn pruned_to(&self, metadata: &Metadata) -> Option<Self> {
		if self.indices.keys().all(|index| metadata.has_index(index)) {
			return None;
		}
		let mut next = self.clone();
		next.indices.retain(|index, _| metadata.has_index(index));
		Some(next)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn index_block_applies_only_to_its_index() {
		let blocks = ClusterBlocks::new().with_index_block("test", ClusterBlock::index_read_only());
		assert!(blocks.indices_blocked_error(ClusterBlockLevel::METADATA, &["other"]).is_none());
		let err = blocks.indices_blocked_error(ClusterBlockLevel::METADATA, &["other", "test"]).unwrap();
		assert_eq!(err.blocks(), &[ClusterBlock::index_read_only()]);
		assert_eq!(err.to_string(), "blocked by: [5/index read-only (api)]");
	}

	#[test]
	fn closed_index_does_not_block_metadata() {
		let blocks = ClusterBlocks::new().with_index_block("test", ClusterBlock::index_closed());
		assert!(blocks.indices_blocked_error(ClusterBlockLevel::METADATA, &["test"]).is_none());
		assert!(blocks.indices_blocked_error(ClusterBlockLevel::READ, &["test"]).is_some());
	}

	#[test]
	fn global_block_applies_to_every_index() {
		let blocks = ClusterBlocks::new().with_global_block(ClusterBlock::cluster_read_only());
		assert!(blocks.global_blocked(ClusterBlockLevel::METADATA));
		assert!(!blocks.global_blocked(ClusterBlockLevel::READ));
		assert!(blocks.indices_blocked_error::<&str>(ClusterBlockLevel::METADATA, &[]).is_some());
		assert!(blocks.without_global_block(6).global_blocked_error(ClusterBlockLevel::METADATA).is_none());
	}

	#[test]
	fn adding_same_block_twice_is_idempotent() {
		let blocks = ClusterBlocks::new()
			.with_index_block("test", ClusterBlock::index_metadata())
			.with_index_block("test", ClusterBlock::index_metadata());
		assert_eq!(blocks.index_blocks("test").len(), 1);
		assert!(blocks.without_index_block("test", 9).index_blocks("test").is_empty());
	}
}
