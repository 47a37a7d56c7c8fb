//! Immutable, structurally shared cluster metadata.
//!
//! The tree is [`Metadata`] (index name to [`IndexMetadata`]) and, per index,
//! custom payloads keyed by kind such as [`IndexWarmers`]. Nothing here is
//! mutated after construction: edits return new values that share every
//! untouched subtree with their base.

mod custom;
mod error;
mod index;
mod metadata;
pub mod pattern;
mod warmers;

pub use custom::{CustomKind, CustomRegistry, IndexCustom};
pub use error::{MetadataError, Result};
pub use index::{IndexMetadata, IndexState};
pub use metadata::{Metadata, MetadataBuilder};
pub use warmers::{IndexWarmers, Upsert, WarmerEntry, json_source};
