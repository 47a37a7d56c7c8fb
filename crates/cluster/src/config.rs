//! Node configuration loaded from TOML.
//!
//! Every section is optional; missing keys fall back to defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("failed to read config {}: {error}", .path.display())]
	Io { path: PathBuf, error: std::io::Error },
	#[error("invalid config: {0}")]
	Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CairnConfig {
	pub node: NodeConfig,
	pub queue: QueueConfig,
	pub validation: ValidationConfig,
	pub indices: Vec<IndexSeed>,
}

impl CairnConfig {
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let text = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&text)
	}

	pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(text)?)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
	pub name: String,
	/// Whether this node may run master-only actions.
	pub master: bool,
}

impl Default for NodeConfig {
	fn default() -> Self {
		Self {
			name: "cairn-0".into(),
			master: true,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
	/// Update tasks allowed to wait before submitters are held back.
	pub capacity: usize,
	/// How long master actions wait for their task to commit. 0 waits forever.
	pub commit_timeout_ms: u64,
	pub shutdown_timeout_ms: u64,
}

impl Default for QueueConfig {
	fn default() -> Self {
		Self {
			capacity: 1024,
			commit_timeout_ms: 30_000,
			shutdown_timeout_ms: 5_000,
		}
	}
}

impl QueueConfig {
	pub fn commit_timeout(&self) -> Option<Duration> {
		(self.commit_timeout_ms > 0).then(|| Duration::from_millis(self.commit_timeout_ms))
	}

	pub fn shutdown_timeout(&self) -> Duration {
		Duration::from_millis(self.shutdown_timeout_ms)
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
	/// 0 disables the limit.
	pub timeout_ms: u64,
}

impl ValidationConfig {
	pub fn timeout(&self) -> Option<Duration> {
		(self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
	}
}

/// Index created at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSeed {
	pub name: String,
	#[serde(default)]
	pub settings: BTreeMap<String, String>,
	#[serde(default)]
	pub read_only: bool,
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn empty_document_uses_defaults() {
		assert_eq!(CairnConfig::from_toml_str("").unwrap(), CairnConfig::default());
	}

	#[test]
	fn partial_sections_keep_other_defaults() {
		let cfg = CairnConfig::from_toml_str(
			r#"
			[node]
			name = "n1"

			[queue]
			capacity = 8

			[validation]
			timeout_ms = 250

			[[indices]]
			name = "test"
			settings = { "number_of_shards" = "5" }

			[[indices]]
			name = "frozen"
			read_only = true
			"#,
		)
		.unwrap();

		assert_eq!(cfg.node.name, "n1");
		assert!(cfg.node.master);
		assert_eq!(cfg.queue.capacity, 8);
		assert_eq!(cfg.queue.commit_timeout(), Some(Duration::from_secs(30)));
		assert_eq!(cfg.validation.timeout(), Some(Duration::from_millis(250)));
		assert_eq!(cfg.indices.len(), 2);
		assert_eq!(cfg.indices[0].settings.get("number_of_shards").map(String::as_str), Some("5"));
		assert!(cfg.indices[1].read_only);
	}

	#[test]
	fn load_reads_file_and_reports_bad_toml() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("cairn.toml");
		std::fs::write(&path, "[node]\nmaster = false\n").unwrap();
		assert!(!CairnConfig::load(&path).unwrap().node.master);

		std::fs::write(&path, "[node\n").unwrap();
		assert!(matches!(CairnConfig::load(&path), Err(ConfigError::Parse(_))));
		assert!(matches!(CairnConfig::load(dir.path().join("absent.toml")), Err(ConfigError::Io { .. })));
	}
}
