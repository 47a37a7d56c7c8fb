use cairn_metadata::Metadata;
use serde_json::{Map, Value};

use crate::blocks::ClusterBlocks;

/// One immutable, versioned view of the cluster.
///
/// Published states are shared behind `Arc`; a reader holding one keeps
/// seeing exactly that version no matter how many commits follow.
#[derive(Debug, Clone, Default)]
pub struct ClusterState {
	version: u64,
	metadata: Metadata,
	blocks: ClusterBlocks,
}

impl ClusterState {
	/// Initial state, version 0.
	pub fn new(metadata: Metadata, blocks: ClusterBlocks) -> Self {
		Self {
			version: 0,
			metadata,
			blocks,
		}
	}

	pub fn version(&self) -> u64 {
		self.version
	}

	pub fn metadata(&self) -> &Metadata {
		&self.metadata
	}

	pub fn blocks(&self) -> &ClusterBlocks {
		&self.blocks
	}

	/// Successor state with the given parts and the next version.
	pub(crate) fn successor(&self, metadata: Metadata, blocks: ClusterBlocks) -> Self {
		Self {
			version: self.version + 1,
			metadata,
			blocks,
		}
	}

	pub fn to_value(&self) -> Value {
		let mut obj = Map::new();
		obj.insert("version".into(), Value::from(self.version));
		obj.insert("metadata".into(), self.metadata.to_value());
		let global: Vec<Value> = self.blocks.global().iter().map(|block| Value::from(block.to_string())).collect();
		obj.insert("global_blocks".into(), Value::from(global));
		Value::Object(obj)
	}
}
