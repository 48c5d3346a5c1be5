use crate::error::{ModelError, Result};
use crate::io;
use crate::model::config::{CompletionInput, ModelConfig, StartSeed};
use crate::model::relation_model::RelationModel;
use rand::Rng;
use std::path::Path;
use tracing::info;

/// Alphabet of randomly drawn seeds.
const SEED_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// High-level generator owning a trained model.
///
/// # Responsibilities
/// - Build a model from one or more corpus files and remember their names
/// - Complete a given text or generate from a seed strategy
/// - Merge with another generator built with the same configuration
#[derive(Debug, Clone)]
pub struct Generator {
	model: RelationModel,
	model_names: Vec<String>,
}

impl Generator {
	/// Wraps an existing model.
	pub fn new(model: RelationModel) -> Self {
		Self { model, model_names: Vec::new() }
	}

	/// Creates a generator by loading all `.dat` corpora from a directory.
	///
	/// # Parameters
	/// - `filepath`: Path to a directory containing corpus files.
	///   Both `"folder"` and `"folder/"` are accepted.
	/// - `config`: Configuration shared by every corpus.
	///
	/// # Behavior
	/// - Lists all files with the `.dat` extension, sorted by name.
	/// - Loads (or trains) each corpus and merges it into one model.
	/// - The corpus name is derived from the file name (without extension).
	///
	/// # Errors
	/// - Returns an error if the path is not a directory.
	/// - Returns an error if a corpus fails to load or train.
	pub fn from_folder<P: AsRef<Path>>(filepath: P, config: ModelConfig) -> Result<Self> {
		let mut generator = Self::new(RelationModel::new(config)?);

		let folder = io::normalize_folder(&filepath.as_ref().to_string_lossy());
		if !folder.is_dir() {
			return Err(ModelError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Expected a directory, got: {}", folder.display()),
			)));
		}

		for file in io::list_files(&folder, "dat")? {
			generator.load_corpus(folder.join(&file))?;
		}

		info!(folder = %folder.display(), corpora = generator.model_names.len(), "generator ready");
		Ok(generator)
	}

	/// Loads a corpus file and merges it into the model.
	///
	/// Uses the corpus snapshot when it is valid; otherwise streams the
	/// corpus and writes a fresh snapshot.
	///
	/// # Errors
	/// Returns an error if a corpus with the same name is already loaded,
	/// or if loading or training fails. On a read failure partway through
	/// the corpus, the chunks trained so far are still merged and the
	/// corpus name is recorded, but no snapshot is written.
	pub fn load_corpus<P: AsRef<Path>>(&mut self, filepath: P) -> Result<()> {
		let key = io::get_filename(&filepath)?;
		if self.model_names.contains(&key) {
			return Err(ModelError::AlreadyLoaded(key));
		}

		let binary_path = io::build_output_path(&filepath, "bin")?;
		let config = self.model.config().clone();
		let partial = match RelationModel::cached_snapshot(&binary_path, &config) {
			Some(model) => model,
			None => {
				let mut partial = RelationModel::new(config)?;
				if let Err(err) = partial.train_file(&filepath) {
					if matches!(err, ModelError::Ingestion { .. }) {
						self.model.merge(&partial)?;
						self.model_names.push(key);
					}
					return Err(err);
				}
				partial.save(&binary_path)?;
				partial
			}
		};

		self.model.merge(&partial)?;
		self.model_names.push(key);
		Ok(())
	}

	/// Returns the names of the corpora merged into the model.
	pub fn model_names(&self) -> &[String] {
		&self.model_names
	}

	pub fn model(&self) -> &RelationModel {
		&self.model
	}

	/// Trains the model on a text fragment.
	pub fn train(&mut self, text: &str) {
		self.model.train(text);
	}

	/// Returns up to `limit` candidate next tokens for `context`.
	pub fn next(&self, context: &str, limit: usize) -> Vec<String> {
		self.model.next(context, limit)
	}

	/// Completes `seed` (see [`RelationModel::complete_with_rng`]).
	pub fn complete(&self, seed: &str, input: &CompletionInput) -> String {
		self.model.complete(seed, input)
	}

	/// Generates text from a fresh random seed of `token_length` characters.
	pub fn generate(&self, length: usize, random: bool, limit: usize) -> String {
		self.generate_from(&StartSeed::Random, &CompletionInput::new(length, limit, random))
	}

	/// Generates text from the given seed strategy.
	pub fn generate_from(&self, start_seed: &StartSeed, input: &CompletionInput) -> String {
		self.generate_with_rng(start_seed, input, &mut rand::rng())
	}

	/// Generates text, drawing the seed and every random pick from `rng`.
	///
	/// # Notes
	/// - `StartSeed::FromModel` falls back to a random seed when the model
	///   is empty.
	/// - The returned text starts with the seed.
	pub fn generate_with_rng<R: Rng + ?Sized>(&self, start_seed: &StartSeed, input: &CompletionInput, rng: &mut R) -> String {
		let seed = match start_seed {
			StartSeed::Random => self.random_seed(rng),
			StartSeed::FromModel => match self.model.tree().random_source(rng) {
				Some(token) => token.to_owned(),
				None => self.random_seed(rng),
			},
			StartSeed::Custom(s) => s.clone(),
		};

		self.model.complete_with_rng(&seed, input, rng)
	}

	/// Draws `token_length` base-36 characters.
	fn random_seed<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
		(0..self.model.config().token_length)
			.map(|_| SEED_ALPHABET[rng.random_range(0..SEED_ALPHABET.len())] as char)
			.collect()
	}

	/// Merges another `Generator` into this one.
	///
	/// # Notes
	/// - Models are merged point-wise; both must share a configuration.
	/// - Corpus names are appended.
	pub fn merge(&mut self, other: &Self) -> Result<()> {
		self.model.merge(&other.model)?;
		self.model_names.extend(other.model_names.iter().cloned());
		Ok(())
	}
}
