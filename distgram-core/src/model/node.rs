use indexmap::IndexMap;

use serde::{Deserialize, Serialize};


/// Represents a source token in the token tree.
///
/// A `SourceNode` stores, for a single source token, every destination token
/// observed at a given distance after it, together with the number of times
/// each `(distance, destination)` pair was observed.
///
/// ## Responsibilities:
/// - Accumulate observations during training
/// - Expose the destinations recorded at a given distance
/// - Merge with another node of the same source token (shard training support)
///
/// ## Invariants
/// - Every distance key is >= 1
/// - Every observation count is strictly positive
/// - Iteration follows first-insertion order at both levels
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub(crate) struct SourceNode {
	/// Destinations indexed by distance, then by destination token.
	/// Example: { 1 => { "ab" => 42, "cd" => 3 }, 2 => { "ef" => 1 } }
	distances: IndexMap<usize, IndexMap<String, u64>>,
}

impl SourceNode {
	/// Records one observation of `destination` at `distance`.
	pub fn observe(&mut self, distance: usize, destination: &str) {
		let destinations = self.distances.entry(distance).or_default();
		match destinations.get_mut(destination) {
			Some(count) => *count += 1,
			None => {
				destinations.insert(destination.to_owned(), 1);
			}
		}
	}

	/// Returns the destinations recorded at `distance`, in insertion order.
	pub fn at(&self, distance: usize) -> Option<&IndexMap<String, u64>> {
		self.distances.get(&distance)
	}

	/// Returns the observation count of a single `(distance, destination)` pair.
	pub fn count(&self, distance: usize, destination: &str) -> u64 {
		self.at(distance)
			.and_then(|destinations| destinations.get(destination))
			.copied()
			.unwrap_or(0)
	}

	/// Iterates over `(distance, destination, count)` triples.
	pub fn iter(&self) -> impl Iterator<Item = (usize, &str, u64)> {
		self.distances.iter().flat_map(|(distance, destinations)| {
			destinations
				.iter()
				.map(move |(destination, count)| (*distance, destination.as_str(), *count))
		})
	}

	/// Merges another node into this one.
	///
	/// Counts are summed. Entries only present in `other` are appended
	/// after the existing ones, preserving `other`'s order.
	pub fn merge(&mut self, other: &Self) {
		for (distance, destinations) in &other.distances {
			let target = self.distances.entry(*distance).or_default();
			for (destination, count) in destinations {
				*target.entry(destination.clone()).or_insert(0) += *count;
			}
		}
	}
}
