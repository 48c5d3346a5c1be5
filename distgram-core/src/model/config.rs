use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::tokenizer::TokenizerKind;
use crate::error::ConfigError;

/// Maximum distance recorded between a source and a destination token.
///
/// # Variants
/// - `Bounded(n)`: only pairs at most `n` positions apart are recorded (`n > 0`).
/// - `Unbounded`: every pair of a training fragment is recorded.
///
/// In configuration files the window is written either as an integer,
/// `-1`, or the string `"unbounded"`. Binary formats store an `Option<u64>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextWindow {
	Bounded(usize),
	Unbounded,
}

impl ContextWindow {
	/// Returns the cap, or `None` if unbounded.
	pub fn max_distance(&self) -> Option<usize> {
		match self {
			ContextWindow::Bounded(n) => Some(*n),
			ContextWindow::Unbounded => None,
		}
	}

	/// Returns `true` if `distance` may be recorded under this window.
	pub fn allows(&self, distance: usize) -> bool {
		self.max_distance().is_none_or(|c| distance <= c)
	}
}

impl Default for ContextWindow {
	fn default() -> Self {
		ContextWindow::Bounded(100)
	}
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawContext {
	Limit(i64),
	Keyword(String),
}

impl Serialize for ContextWindow {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		if serializer.is_human_readable() {
			RawContext::from(*self).serialize(serializer)
		} else {
			self.max_distance().map(|n| n as u64).serialize(serializer)
		}
	}
}

impl<'de> Deserialize<'de> for ContextWindow {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		if deserializer.is_human_readable() {
			let raw = RawContext::deserialize(deserializer)?;
			ContextWindow::try_from(raw).map_err(serde::de::Error::custom)
		} else {
			match Option::<u64>::deserialize(deserializer)? {
				Some(n) => usize::try_from(n)
					.map(ContextWindow::Bounded)
					.map_err(serde::de::Error::custom),
				None => Ok(ContextWindow::Unbounded),
			}
		}
	}
}

impl TryFrom<RawContext> for ContextWindow {
	type Error = ConfigError;

	fn try_from(raw: RawContext) -> Result<Self, Self::Error> {
		match raw {
			RawContext::Limit(-1) => Ok(ContextWindow::Unbounded),
			RawContext::Limit(n) if n > 0 => usize::try_from(n)
				.map(ContextWindow::Bounded)
				.map_err(|_| ConfigError::InvalidContext(n.to_string())),
			RawContext::Limit(n) => Err(ConfigError::InvalidContext(n.to_string())),
			RawContext::Keyword(s) if s.eq_ignore_ascii_case("unbounded") => Ok(ContextWindow::Unbounded),
			RawContext::Keyword(s) => Err(ConfigError::InvalidContext(s)),
		}
	}
}

impl From<ContextWindow> for RawContext {
	fn from(window: ContextWindow) -> Self {
		match window {
			ContextWindow::Bounded(n) => RawContext::Limit(i64::try_from(n).unwrap_or(i64::MAX)),
			ContextWindow::Unbounded => RawContext::Keyword("unbounded".to_owned()),
		}
	}
}

/// Configuration of a token relation model.
///
/// # Responsibilities
/// - Select the tokenizer and its token length
/// - Bound the distances recorded during training
/// - Set the streaming chunk size and the per-observation weight `ε`
///
/// Fields are public; call [`ModelConfig::validate`] (done by
/// `RelationModel::new`) before building a model from a hand-written value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
	/// Characters per token for the fixed-width tokenizer.
	pub token_length: usize,

	/// Maximum recorded distance.
	pub context: ContextWindow,

	/// Number of corpus lines trained together by the streaming trainer.
	pub chunk_size: usize,

	/// Weight added per observation.
	pub epsilon: f64,

	/// Tokenizer used for training and inference.
	pub tokenizer: TokenizerKind,
}

impl Default for ModelConfig {
	fn default() -> Self {
		Self {
			token_length: 2,
			context: ContextWindow::default(),
			chunk_size: 1000,
			epsilon: 1e-6,
			tokenizer: TokenizerKind::default(),
		}
	}
}

impl ModelConfig {
	/// Checks every field against its valid range.
	///
	/// # Errors
	/// Returns the first invalid field as a `ConfigError`.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.token_length == 0 {
			return Err(ConfigError::InvalidTokenLength(self.token_length));
		}
		if self.context == ContextWindow::Bounded(0) {
			return Err(ConfigError::InvalidContext("0".to_owned()));
		}
		if self.chunk_size == 0 {
			return Err(ConfigError::InvalidChunkSize(self.chunk_size));
		}
		if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
			return Err(ConfigError::InvalidEpsilon(self.epsilon));
		}
		Ok(())
	}

	/// Parses and validates a TOML document.
	///
	/// Missing fields take their default value.
	pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	/// Reads, parses and validates a TOML file.
	pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
		let input = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
		Self::from_toml_str(&input)
	}
}

/// Strategy used to select the starting seed when generating a sequence.
///
/// # Variants
/// - `Random`: a fresh base-36 string of `token_length` characters.
/// - `FromModel`: a source token picked at random from the trained model.
/// - `Custom(String)`: the provided string.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum StartSeed {
	#[default]
	Random,
	FromModel,
	Custom(String),
}

/// Parameters of a completion request.
///
/// # Fields
/// - `length`: maximum number of appended tokens (default 100)
/// - `limit`: number of ranked candidates considered per step (default 5)
/// - `random`: pick uniformly among the candidates instead of the first one
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompletionInput {
	pub length: usize,
	pub limit: usize,
	pub random: bool,
}

impl Default for CompletionInput {
	fn default() -> Self {
		Self { length: 100, limit: 5, random: false }
	}
}

impl CompletionInput {
	pub fn new(length: usize, limit: usize, random: bool) -> Self {
		Self { length, limit, random }
	}
}
