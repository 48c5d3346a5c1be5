//! Distance-indexed token co-occurrence text generation library.
//!
//! This crate provides a token relation model including:
//! - Pluggable tokenizers (fixed-width chunks, whitespace words)
//! - A three-level `source -> distance -> destination -> weight` tree
//! - Candidate scoring and greedy / random completion
//! - Chunked streaming and parallel shard training
//! - Compact binary persistence of trained models
//!
//! Most users only need [`model::generator::Generator`] or
//! [`model::relation_model::RelationModel`].

/// Core model, training and generation logic.
///
/// Exposes the high-level generator interface along with the model,
/// its configuration and the tokenizers.
pub mod model;

/// Error types returned by configuration, training and persistence.
pub mod error;

/// I/O utilities (line streaming, path helpers).
pub mod io;
