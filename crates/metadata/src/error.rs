/// Errors raised while reading, editing or decoding metadata.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
	#[error("no such index [{0}]")]
	IndexNotFound(String),

	#[error("invalid pattern [{pattern}]: {reason}")]
	InvalidPattern { pattern: String, reason: String },

	#[error("unknown custom metadata kind [{0}]")]
	UnknownCustom(String),

	#[error("failed to decode metadata: {0}")]
	Decode(String),
}

pub type Result<T, E = MetadataError> = std::result::Result<T, E>;
