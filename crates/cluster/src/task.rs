use std::sync::Arc;

use cairn_metadata::Metadata;

use crate::blocks::ClusterBlocks;
use crate::error::{ClusterError, Result};
use crate::state::ClusterState;

/// A pure transition from the latest committed metadata to its successor.
///
/// Runs on the update queue, one task at a time. Returning the input
/// unchanged (same allocation) commits nothing.
pub trait UpdateTask: Send + 'static {
	fn execute(self: Box<Self>, current: &Metadata) -> Result<Metadata>;
}

impl<F> UpdateTask for F
where
	F: FnOnce(&Metadata) -> Result<Metadata> + Send + 'static,
{
	fn execute(self: Box<Self>, current: &Metadata) -> Result<Metadata> {
		(*self)(current)
	}
}

/// Outcome notifications broadcast by the update queue.
#[derive(Debug, Clone)]
pub enum ClusterEvent {
	Committed { task: String, version: u64 },
	Unchanged { task: String, version: u64 },
	Failed { task: String, error: ClusterError },
}

impl ClusterEvent {
	pub fn task(&self) -> &str {
		match self {
			Self::Committed { task, .. } | Self::Unchanged { task, .. } | Self::Failed { task, .. } => task,
		}
	}
}

/// Receives every committed state, in commit order, before the submitter
/// is answered.
pub trait StatePublisher: Send + Sync {
	fn publish(&self, state: &Arc<ClusterState>);
}

pub(crate) type BlocksUpdate = Box<dyn FnOnce(&ClusterBlocks) -> ClusterBlocks + Send>;

pub(crate) enum Transition {
	Metadata(Box<dyn UpdateTask>),
	Blocks(BlocksUpdate),
}

impl Transition {
	/// Computes the successor parts, or `None` when nothing changed.
	pub(crate) fn apply(self, current: &ClusterState) -> Result<Option<(Metadata, ClusterBlocks)>> {
		match self {
			Self::Metadata(task) => {
				let metadata = task.execute(current.metadata())?;
				if Metadata::ptr_eq(&metadata, current.metadata()) {
					return Ok(None);
				}
				let blocks = current.blocks().pruned_to(&metadata).unwrap_or_else(|| current.blocks().clone());
				Ok(Some((metadata, blocks)))
			}
			Self::Blocks(update) => {
				let blocks = update(current.blocks());
				if &blocks == current.blocks() {
					return Ok(None);
				}
				Ok(Some((current.metadata().clone(), blocks)))
			}
		}
	}
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
	if let Some(msg) = payload.downcast_ref::<&str>() {
		(*msg).to_string()
	} else if let Some(msg) = payload.downcast_ref::<String>() {
		msg.clone()
	} else {
		"non-string panic payload".to_string()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use cairn_metadata::IndexMetadata;

	use super::*;
	use crate::blocks::ClusterBlock;

	fn state_with(names: &[&str]) -> ClusterState {
		let mut builder = Metadata::new().builder();
		for name in names {
			builder.put(Arc::new(IndexMetadata::new(*name)));
		}
		ClusterState::new(builder.build(), ClusterBlocks::new())
	}

	#[test]
	fn identity_task_is_unchanged() {
		let state = state_with(&["a"]);
		let transition = Transition::Metadata(Box::new(|md: &Metadata| -> Result<Metadata> { Ok(md.clone()) }));
		assert!(transition.apply(&state).unwrap().is_none());
	}

	#[test]
	fn deleting_an_index_prunes_its_blocks() {
		let state = state_with(&["a", "b"]);
		let blocks = state.blocks().with_index_block("b", ClusterBlock::index_read_only());
		let state = state.successor(state.metadata().clone(), blocks);

		let transition = Transition::Metadata(Box::new(|md: &Metadata| -> Result<Metadata> {
			let mut builder = md.builder();
			builder.remove("b");
			Ok(builder.build())
		}));
		let (metadata, blocks) = transition.apply(&state).unwrap().unwrap();
		assert!(!metadata.has_index("b"));
		assert!(blocks.index_blocks("b").is_empty());
	}

	#[test]
	fn panic_payloads_are_rendered() {
		assert_eq!(panic_message(&"boom"), "boom");
		assert_eq!(panic_message(&String::from("bang")), "bang");
		assert_eq!(panic_message(&7_u8), "non-string panic payload");
	}
}
