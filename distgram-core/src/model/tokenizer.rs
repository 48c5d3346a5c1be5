//! Text to token conversion.
//!
//! Tokenizers are selected once, from [`ModelConfig`], and passed around as
//! an explicit [`Tokenizer`] value:
//! 1. `FixedWidth` splits each line into chunks of `token_length` characters.
//! 2. `Whitespace` splits on Unicode whitespace.

use serde::{Deserialize, Serialize};

use super::config::ModelConfig;

/// Tokenizer selection as written in configuration files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerKind {
	#[default]
	FixedWidth,
	Whitespace,
}

/// Splits text into tokens and joins tokens back into text.
pub trait Tokenize {
	/// Splits `text` into an ordered sequence of tokens (possibly empty).
	fn tokenize(&self, text: &str) -> Vec<String>;

	/// Joins tokens back into text.
	fn detokenize(&self, tokens: &[String]) -> String;

	/// Appends a single generated token to `text`.
	fn append(&self, text: &mut String, token: &str) {
		text.push_str(&self.detokenize(&[token.to_owned()]));
	}
}

/// Characters that end a line. They never belong to a token.
fn is_line_break(c: char) -> bool {
	matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

/// Fixed-width character chunking.
///
/// Each line is cut into chunks of `token_length` characters; the last chunk
/// of a line may be shorter. Line terminators are dropped, so
/// `detokenize(tokenize(t)) == t` only holds for single-line text whose
/// character count is a multiple of `token_length`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixedWidthTokenizer {
	token_length: usize,
}

impl FixedWidthTokenizer {
	/// Creates a tokenizer producing chunks of `token_length` characters.
	///
	/// A zero length is treated as 1; `ModelConfig::validate` rejects it
	/// before a model is built.
	pub fn new(token_length: usize) -> Self {
		Self { token_length: token_length.max(1) }
	}
}

impl Tokenize for FixedWidthTokenizer {
	fn tokenize(&self, text: &str) -> Vec<String> {
		let mut tokens = Vec::with_capacity(text.len() / self.token_length + 1);
		let mut current = String::new();
		let mut width = 0;

		for c in text.chars() {
			if is_line_break(c) {
				if width > 0 {
					tokens.push(std::mem::take(&mut current));
					width = 0;
				}
				continue;
			}

			current.push(c);
			width += 1;
			if width == self.token_length {
				tokens.push(std::mem::take(&mut current));
				width = 0;
			}
		}

		if width > 0 {
			tokens.push(current);
		}
		tokens
	}

	fn detokenize(&self, tokens: &[String]) -> String {
		tokens.concat()
	}

	fn append(&self, text: &mut String, token: &str) {
		text.push_str(token);
	}
}

/// Whitespace-separated words.
///
/// Detokenizing joins words with a single space, so runs of whitespace and
/// line breaks are not preserved.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WhitespaceTokenizer;

impl Tokenize for WhitespaceTokenizer {
	fn tokenize(&self, text: &str) -> Vec<String> {
		text.split_whitespace().map(str::to_owned).collect()
	}

	fn detokenize(&self, tokens: &[String]) -> String {
		tokens.join(" ")
	}

	fn append(&self, text: &mut String, token: &str) {
		if !text.is_empty() && !text.ends_with(char::is_whitespace) {
			text.push(' ');
		}
		text.push_str(token);
	}
}

/// Closed set of tokenizers a model can be configured with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Tokenizer {
	FixedWidth(FixedWidthTokenizer),
	Whitespace(WhitespaceTokenizer),
}

impl Tokenizer {
	/// Builds the tokenizer selected by `config`.
	pub fn from_config(config: &ModelConfig) -> Self {
		match config.tokenizer {
			TokenizerKind::FixedWidth => Tokenizer::FixedWidth(FixedWidthTokenizer::new(config.token_length)),
			TokenizerKind::Whitespace => Tokenizer::Whitespace(WhitespaceTokenizer),
		}
	}

	fn inner(&self) -> &dyn Tokenize {
		match self {
			Tokenizer::FixedWidth(t) => t,
			Tokenizer::Whitespace(t) => t,
		}
	}
}

impl Tokenize for Tokenizer {
	fn tokenize(&self, text: &str) -> Vec<String> {
		self.inner().tokenize(text)
	}

	fn detokenize(&self, tokens: &[String]) -> String {
		self.inner().detokenize(tokens)
	}

	fn append(&self, text: &mut String, token: &str) {
		self.inner().append(text, token)
	}
}
