//! Serialized cluster metadata coordination.
//!
//! [`ClusterService`] owns the published [`ClusterState`] and applies update
//! tasks one at a time, in submission order. Master-only requests such as
//! [`PutWarmerAction`] go through [`execute_master_action`]: resolve indices,
//! check blocks, validate, enqueue, then wait on a [`CommitWaiter`].

mod action;
mod blocks;
mod commit;
mod config;
mod error;
mod indices;
mod service;
mod state;
mod task;
mod validation;
pub mod warmers;

pub use action::{MasterNodeAction, execute_master_action};
pub use blocks::{ClusterBlock, ClusterBlockError, ClusterBlockLevel, ClusterBlocks};
pub use commit::CommitWaiter;
pub use config::{CairnConfig, ConfigError, IndexSeed, NodeConfig, QueueConfig, ValidationConfig};
pub use error::{ClusterError, InterruptCause, Result};
pub use indices::{create_index, create_index_task, delete_index, delete_index_task, validate_index_name};
pub use service::ClusterService;
pub use state::ClusterState;
pub use task::{ClusterEvent, StatePublisher, UpdateTask};
pub use validation::{AcceptAllValidator, QueryValidator, ShardFailure, ValidationRequest, ValidationResult, ValidatorError, run_validation};
pub use warmers::{DeleteWarmerAction, DeleteWarmerRequest, PutWarmerAction, PutWarmerRequest};
