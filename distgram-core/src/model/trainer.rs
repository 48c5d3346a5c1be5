use std::io;
use std::sync::mpsc;
use std::thread;

use tracing::{debug, info, warn};

use super::config::ModelConfig;
use super::relation_model::RelationModel;
use crate::error::{ModelError, Result};

/// Chunks handed to a worker at once by `train_parallel`.
const SHARD_CHUNKS: usize = 8;

/// Counters reported after a training run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrainingStats {
	/// Lines consumed from the source.
	pub lines: usize,
	/// Fragments passed to `RelationModel::train`.
	pub chunks: usize,
}

/// Trains a model from a corpus in bounded chunks of lines.
///
/// Every `chunk_size` lines are joined with `\n` and trained as a single
/// fragment. Token pairs separated by a chunk boundary are never recorded,
/// which keeps the cost of each `train` call bounded on large corpora.
#[derive(Clone, Copy, Debug)]
pub struct StreamingTrainer {
	chunk_size: usize,
}

impl StreamingTrainer {
	/// Creates a trainer grouping `chunk_size` lines per fragment (at least 1).
	pub fn new(chunk_size: usize) -> Self {
		Self { chunk_size: chunk_size.max(1) }
	}

	pub fn from_config(config: &ModelConfig) -> Self {
		Self::new(config.chunk_size)
	}

	/// Streams `source` into `model`.
	///
	/// # Behavior
	/// - Lines are consumed once, in order.
	/// - A full buffer is trained and cleared; the final partial buffer is
	///   trained at the end of the source.
	///
	/// # Errors
	/// Returns `ModelError::Ingestion` on the first read failure. Chunks
	/// already trained stay in the model; the pending partial buffer is
	/// dropped.
	pub fn train<I>(&self, model: &mut RelationModel, source: I) -> Result<TrainingStats>
	where
		I: IntoIterator<Item = io::Result<String>>,
	{
		let mut stats = TrainingStats::default();
		let mut buffer = String::new();
		let mut buffered = 0;

		for line in source {
			let line = match line {
				Ok(line) => line,
				Err(err) => {
					warn!(lines = stats.lines, chunks = stats.chunks, error = %err, "corpus read failed, training stopped");
					return Err(ModelError::Ingestion { line: stats.lines, source: err });
				}
			};

			if buffered > 0 {
				buffer.push('\n');
			}
			buffer.push_str(&line);
			buffered += 1;
			stats.lines += 1;

			if buffered == self.chunk_size {
				self.flush(model, &mut buffer, &mut stats);
				buffered = 0;
			}
		}

		if buffered > 0 {
			self.flush(model, &mut buffer, &mut stats);
		}

		Ok(stats)
	}

	fn flush(&self, model: &mut RelationModel, buffer: &mut String, stats: &mut TrainingStats) {
		model.train(buffer);
		buffer.clear();
		stats.chunks += 1;
		debug!(chunk = stats.chunks, lines = stats.lines, "trained chunk");
	}

	/// Streams `source` through worker threads and merges the result into `model`.
	///
	/// # Behavior
	/// - Reads shards of `chunk_size * SHARD_CHUNKS` lines, one per CPU core
	///   at a time, so at most `cores * shard` lines are held in memory.
	/// - Shard sizes are multiples of `chunk_size`, so chunk boundaries are
	///   the same as with [`train`](Self::train).
	/// - Each worker trains an independent partial model.
	/// - Partial models are merged in source order, which yields exactly
	///   the model a sequential streaming pass would produce.
	///
	/// # Errors
	/// - `ModelError::Ingestion` on the first read failure. Complete chunks
	///   read before the failure are trained and kept; the pending partial
	///   chunk is dropped, as with [`train`](Self::train).
	/// - `ModelError::Worker` if a worker stopped without sending its
	///   partial model.
	pub fn train_parallel<I>(&self, model: &mut RelationModel, source: I) -> Result<TrainingStats>
	where
		I: IntoIterator<Item = io::Result<String>>,
	{
		let workers = num_cpus::get();
		let shard_size = self.chunk_size * SHARD_CHUNKS;
		let mut lines = source.into_iter();
		let mut stats = TrainingStats::default();
		let mut read = 0;

		loop {
			let mut shards: Vec<Vec<String>> = Vec::with_capacity(workers);
			let mut failure = None;
			let mut exhausted = false;

			while shards.len() < workers && failure.is_none() && !exhausted {
				let mut shard = Vec::with_capacity(shard_size);
				while shard.len() < shard_size {
					match lines.next() {
						Some(Ok(line)) => shard.push(line),
						Some(Err(err)) => {
							failure = Some(err);
							break;
						}
						None => {
							exhausted = true;
							break;
						}
					}
				}
				read += shard.len();

				if failure.is_some() {
					// Only complete chunks are trained
					shard.truncate(shard.len() / self.chunk_size * self.chunk_size);
				}
				if !shard.is_empty() {
					shards.push(shard);
				}
			}

			let batch = self.train_shards(model, shards)?;
			stats.lines += batch.lines;
			stats.chunks += batch.chunks;

			if let Some(err) = failure {
				warn!(lines = read, chunks = stats.chunks, error = %err, "corpus read failed, training stopped");
				return Err(ModelError::Ingestion { line: read, source: err });
			}
			if exhausted {
				break;
			}
		}

		info!(lines = stats.lines, chunks = stats.chunks, "parallel training done");
		Ok(stats)
	}

	/// Trains each shard on its own thread, then merges them in order.
	fn train_shards(&self, model: &mut RelationModel, shards: Vec<Vec<String>>) -> Result<TrainingStats> {
		let (tx, rx) = mpsc::channel();
		let count = shards.len();
		for (index, shard) in shards.into_iter().enumerate() {
			let tx = tx.clone();
			let mut partial = model.empty_like();
			let trainer = *self;

			thread::spawn(move || {
				let result = trainer.train(&mut partial, shard.into_iter().map(Ok));
				// The receiver only goes away if the caller stopped waiting.
				let _ = tx.send((index, result.map(|stats| (partial, stats))));
			});
		}
		drop(tx);

		let mut partials: Vec<Option<(RelationModel, TrainingStats)>> = (0..count).map(|_| None).collect();
		for (index, result) in rx.iter() {
			partials[index] = Some(result?);
		}

		let mut stats = TrainingStats::default();
		for (index, partial) in partials.into_iter().enumerate() {
			let (partial, partial_stats) = partial.ok_or(ModelError::Worker(index))?;
			model.merge(&partial)?;
			stats.lines += partial_stats.lines;
			stats.chunks += partial_stats.chunks;
		}

		debug!(shards = count, lines = stats.lines, "merged shards");
		Ok(stats)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::config::ContextWindow;

	fn char_model(chunk_size: usize) -> RelationModel {
		RelationModel::new(ModelConfig {
			token_length: 1,
			context: ContextWindow::Unbounded,
			chunk_size,
			..Default::default()
		})
		.unwrap()
	}

	fn lines(items: &[&str]) -> Vec<io::Result<String>> {
		items.iter().map(|s| Ok(s.to_string())).collect()
	}

	#[test]
	fn test_chunk_boundary_is_not_recorded() {
		let mut streamed = char_model(1);
		let stats = streamed.load_and_train(lines(&["ab", "cd"])).unwrap();
		assert_eq!(stats, TrainingStats { lines: 2, chunks: 2 });
		assert_eq!(streamed.weight("b", 1, "c"), 0.0);
		assert_eq!(streamed.weight("a", 2, "c"), 0.0);
		assert!(streamed.weight("a", 1, "b") > 0.0);
		assert!(streamed.weight("c", 1, "d") > 0.0);

		let mut whole = char_model(1);
		whole.train("abcd");
		assert!(whole.weight("b", 1, "c") > 0.0);
	}

	#[test]
	fn test_lines_of_one_chunk_are_joined() {
		let mut model = char_model(2);
		let stats = model.load_and_train(lines(&["ab", "cd", "ef"])).unwrap();
		assert_eq!(stats, TrainingStats { lines: 3, chunks: 2 });
		assert!(model.weight("b", 1, "c") > 0.0);
		assert_eq!(model.weight("d", 1, "e"), 0.0);
	}

	#[test]
	fn test_read_failure_keeps_trained_chunks() {
		let mut model = char_model(1);
		let source = vec![
			Ok("ab".to_owned()),
			Err(io::Error::other("disk gone")),
			Ok("cd".to_owned()),
		];

		match model.load_and_train(source) {
			Err(ModelError::Ingestion { line, .. }) => assert_eq!(line, 1),
			other => panic!("expected ingestion error, got {other:?}"),
		}
		assert!(model.weight("a", 1, "b") > 0.0);
		assert_eq!(model.weight("c", 1, "d"), 0.0);
	}

	#[test]
	fn test_empty_source() {
		let mut model = char_model(3);
		let stats = model.load_and_train(Vec::<io::Result<String>>::new()).unwrap();
		assert_eq!(stats, TrainingStats::default());
		assert!(model.is_empty());
	}

	#[test]
	fn test_parallel_matches_sequential() {
		let corpus: Vec<String> = (0..97).map(|i| format!("line {i} of the corpus {}", i * 7 % 13)).collect();

		let mut sequential = char_model(4);
		let seq_stats = sequential.load_and_train(corpus.iter().cloned().map(Ok)).unwrap();

		let mut parallel = char_model(4);
		let par_stats = StreamingTrainer::new(4)
			.train_parallel(&mut parallel, corpus.iter().cloned().map(Ok))
			.unwrap();

		assert_eq!(seq_stats, par_stats);
		let seq: Vec<_> = sequential.tree().iter().collect();
		let par: Vec<_> = parallel.tree().iter().collect();
		assert_eq!(seq, par);
	}

	#[test]
	fn test_parallel_read_failure_keeps_complete_chunks() {
		let mut model = char_model(2);
		let source = vec![
			Ok("ab".to_owned()),
			Ok("cd".to_owned()),
			Ok("ef".to_owned()),
			Err(io::Error::new(io::ErrorKind::InvalidData, "stream did not contain valid UTF-8")),
			Ok("gh".to_owned()),
		];

		match StreamingTrainer::new(2).train_parallel(&mut model, source) {
			Err(ModelError::Ingestion { line, .. }) => assert_eq!(line, 3),
			other => panic!("expected ingestion error, got {other:?}"),
		}
		assert!(model.weight("b", 1, "c") > 0.0);
		assert_eq!(model.weight("e", 1, "f"), 0.0);
		assert_eq!(model.weight("g", 1, "h"), 0.0);
	}

	#[test]
	fn test_parallel_empty_source() {
		let mut model = char_model(2);
		let stats = StreamingTrainer::new(2)
			.train_parallel(&mut model, Vec::<io::Result<String>>::new())
			.unwrap();
		assert_eq!(stats, TrainingStats::default());
		assert!(model.is_empty());
	}
}
