//! Error types for configuration, ingestion and persistence.

use std::io;

/// Errors raised while building or validating a [`ModelConfig`](crate::model::config::ModelConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("token length must be > 0, got {0}")]
	InvalidTokenLength(usize),

	#[error("invalid context window: {0}")]
	InvalidContext(String),

	#[error("chunk size must be > 0, got {0}")]
	InvalidChunkSize(usize),

	#[error("epsilon must be finite and > 0, got {0}")]
	InvalidEpsilon(f64),

	#[error("failed to parse configuration")]
	Parse(#[from] toml::de::Error),

	#[error("failed to read configuration file")]
	Read(#[source] io::Error),
}

/// Errors raised by model training, merging and persistence.
///
/// An empty suggestion list is never an error: `next` returns an empty
/// vector and `complete` returns the seed unchanged.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// The corpus source failed while streaming. Chunks trained before
	/// the failure stay in the model.
	#[error("corpus read failed after {line} lines")]
	Ingestion {
		line: usize,
		#[source]
		source: io::Error,
	},

	#[error("i/o failure")]
	Io(#[from] io::Error),

	#[error("model (de)serialization failed")]
	Persistence(#[from] postcard::Error),

	#[error("cannot merge models built with different configurations")]
	ConfigMismatch,

	#[error("training worker {0} stopped before sending its shard")]
	Worker(usize),

	#[error("corpus '{0}' is already loaded")]
	AlreadyLoaded(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
