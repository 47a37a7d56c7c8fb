//! Glob-style name patterns shared by index and warmer resolution.

use globset::{Glob, GlobMatcher};

use crate::error::{MetadataError, Result};

/// Name that matches every entry.
pub const ALL: &str = "_all";

/// Returns true when `name` contains glob metacharacters.
pub fn is_pattern(name: &str) -> bool {
	name.contains(['*', '?', '['])
}

/// Returns true when `names` selects everything (`[]`, `["_all"]` or `["*"]`).
pub fn selects_all<S: AsRef<str>>(names: &[S]) -> bool {
	match names {
		[] => true,
		[only] => matches!(only.as_ref(), ALL | "*"),
		_ => false,
	}
}

/// Compiled name pattern. Plain names compare exactly.
#[derive(Debug, Clone)]
pub enum NamePattern {
	Exact(String),
	Glob(GlobMatcher),
}

impl NamePattern {
	pub fn new(raw: &str) -> Result<Self> {
		if raw == ALL {
			return Self::new("*");
		}
		if !is_pattern(raw) {
			return Ok(Self::Exact(raw.to_string()));
		}
		let glob = Glob::new(raw).map_err(|err| MetadataError::InvalidPattern {
			pattern: raw.to_string(),
			reason: err.to_string(),
		})?;
		Ok(Self::Glob(glob.compile_matcher()))
	}

	pub fn matches(&self, name: &str) -> bool {
		match self {
			Self::Exact(exact) => exact == name,
			Self::Glob(matcher) => matcher.is_match(name),
		}
	}
}
