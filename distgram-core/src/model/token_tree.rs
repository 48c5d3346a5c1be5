use super::config::ContextWindow;
use super::node::SourceNode;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Distance-indexed co-occurrence tree.
///
/// The `TokenTree` maps every source token to the destination tokens observed
/// after it, indexed by the number of positions separating them:
/// `source -> distance -> destination -> count`.
///
/// Counts are stored as integers; the association weight of a triple is
/// `count × ε`, so the weight invariant holds exactly.
///
/// # Responsibilities
/// - Record every `(src, dest)` pair of a token sequence within the window
/// - Answer lookups by `(source, distance)`
/// - Merge with another tree (point-wise summation)
///
/// # Invariants
/// - Counts never decrease
/// - No recorded distance exceeds the window the tree was trained with
/// - Iteration follows first-insertion order at every level
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct TokenTree {
	/// Mapping from a source token to its node
	sources: IndexMap<String, SourceNode>,
}

impl TokenTree {
	/// Creates an empty tree.
	pub fn new() -> Self {
		Self::default()
	}

	/// Records every ordered pair of the token sequence.
	///
	/// For each `src < dest` with `dest - src` inside `window`, one
	/// observation of `tokens[dest]` at distance `dest - src` is added
	/// under `tokens[src]`.
	///
	/// # Notes
	/// - Runs in `O(n·min(n, C))`.
	/// - Sequences shorter than two tokens are ignored.
	pub fn train<S: AsRef<str>>(&mut self, tokens: &[S], window: ContextWindow) {
		if tokens.len() < 2 {
			return;
		}

		for src in 0..tokens.len() - 1 {
			let source = tokens[src].as_ref();
			if !self.sources.contains_key(source) {
				self.sources.insert(source.to_owned(), SourceNode::default());
			}
			// Inserted above
			let Some(node) = self.sources.get_mut(source) else { continue };

			for dest in src + 1..tokens.len() {
				let distance = dest - src;
				if !window.allows(distance) {
					break;
				}
				node.observe(distance, tokens[dest].as_ref());
			}
		}
	}

	/// Returns the destinations recorded for `source` at `distance`.
	pub fn candidates(&self, source: &str, distance: usize) -> Option<&IndexMap<String, u64>> {
		self.sources.get(source)?.at(distance)
	}

	/// Returns the number of observations of a single triple.
	pub fn count(&self, source: &str, distance: usize, destination: &str) -> u64 {
		self.sources
			.get(source)
			.map_or(0, |node| node.count(distance, destination))
	}

	/// Returns a random source token, if any.
	pub fn random_source<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
		if self.sources.is_empty() {
			return None;
		}
		let index = rng.random_range(0..self.sources.len());
		self.sources.get_index(index).map(|(token, _)| token.as_str())
	}

	/// Iterates over `(source, distance, destination, count)` triples.
	pub fn iter(&self) -> impl Iterator<Item = (&str, usize, &str, u64)> {
		self.sources.iter().flat_map(|(source, node)| {
			node.iter()
				.map(move |(distance, destination, count)| (source.as_str(), distance, destination, count))
		})
	}

	/// Returns the number of distinct source tokens.
	pub fn len(&self) -> usize {
		self.sources.len()
	}

	/// Returns `true` if nothing was recorded.
	pub fn is_empty(&self) -> bool {
		self.sources.is_empty()
	}

	/// Returns the largest recorded distance, or `None` for an empty tree.
	pub fn max_distance(&self) -> Option<usize> {
		self.iter().map(|(_, distance, _, _)| distance).max()
	}

	/// Merges another tree into this one.
	///
	/// # Notes
	/// - Counts for matching triples are summed.
	/// - Commutative on counts; merging in source order also reproduces
	///   the insertion order a single sequential pass would have produced.
	pub fn merge(&mut self, other: &Self) {
		for (key, node) in &other.sources {
			if let Some(existing) = self.sources.get_mut(key) {
				existing.merge(node);
			} else {
				self.sources.insert(key.clone(), node.clone());
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn chars(text: &str) -> Vec<String> {
		text.chars().map(String::from).collect()
	}

	#[test]
	fn test_train_records_all_pairs() {
		let mut tree = TokenTree::new();
		tree.train(&chars("abc"), ContextWindow::Unbounded);

		assert_eq!(tree.count("a", 1, "b"), 1);
		assert_eq!(tree.count("a", 2, "c"), 1);
		assert_eq!(tree.count("b", 1, "c"), 1);
		assert_eq!(tree.count("c", 1, "a"), 0);
		assert_eq!(tree.iter().count(), 3);
	}

	#[test]
	fn test_train_respects_window() {
		let mut tree = TokenTree::new();
		tree.train(&chars("abcdefgh"), ContextWindow::Bounded(2));

		assert_eq!(tree.max_distance(), Some(2));
		assert_eq!(tree.count("a", 2, "c"), 1);
		assert_eq!(tree.count("f", 2, "h"), 1);
		assert_eq!(tree.count("a", 3, "d"), 0);
		assert!(tree.iter().all(|(_, distance, _, _)| distance <= 2));
	}

	#[test]
	fn test_short_sequences_are_ignored() {
		let mut tree = TokenTree::new();
		tree.train::<String>(&[], ContextWindow::Unbounded);
		tree.train(&chars("a"), ContextWindow::Unbounded);
		assert!(tree.is_empty());
		assert_eq!(tree.max_distance(), None);
	}

	#[test]
	fn test_merge_equals_joint_training() {
		let mut left = TokenTree::new();
		left.train(&chars("abab"), ContextWindow::Unbounded);
		let mut right = TokenTree::new();
		right.train(&chars("bca"), ContextWindow::Unbounded);

		let mut joint = TokenTree::new();
		joint.train(&chars("abab"), ContextWindow::Unbounded);
		joint.train(&chars("bca"), ContextWindow::Unbounded);

		left.merge(&right);
		assert_eq!(left, joint);
	}
}
