//! Top-level module for the token relation system.
//!
//! This module groups:
//! - Tokenizers (`Tokenizer`, `TokenizerKind`)
//! - The three-level association tree (`TokenTree`) and its nodes
//! - The configured model with training and scoring (`RelationModel`)
//! - Chunked and parallel corpus ingestion (`StreamingTrainer`)
//! - A high-level generation interface (`Generator`)

/// High-level interface owning a trained model.
///
/// Exposes corpus loading, completion and seeded generation.
pub mod generator;

/// Configured model: tokenizer + token tree.
///
/// Handles training, candidate scoring, merging and persistence.
pub mod relation_model;

/// Three-level `source -> distance -> destination -> count` structure.
pub mod token_tree;

/// Per-source node of the token tree.
///
/// Stores observation counts indexed by distance, then destination token.
mod node;

/// Model and completion configuration.
///
/// Stores token length, context window, chunk size, epsilon,
/// tokenizer selection and completion parameters.
pub mod config;

/// Text to token conversion and back.
pub mod tokenizer;

/// Chunked streaming and parallel shard training.
pub mod trainer;
