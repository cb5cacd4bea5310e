//! # Sentence embeddings and cross-runtime parity verification
//!
//! This crate turns the per-token hidden states of a transformer forward pass into sentence
//! embeddings, and verifies that independent runtimes computing the same embeddings agree
//! closely enough to preserve similarity rankings.
//!
//! The transformer model, its tokenizer and model conversion tooling are external
//! collaborators. The crate always starts from raw hidden states and an attention mask:
//!
//! 1. **Pooling**: masked mean pooling of the hidden states of real (non-padding) tokens
//! 2. **Normalization**: scaling to unit L2 norm, with an epsilon floor
//! 3. **Similarity**: cosine similarity and stable ranking of candidates against a query
//! 4. **Parity**: quantified comparison of embeddings and rankings produced by two runtimes
//!
//! All core operations are pure functions over owned values and can be fanned out across
//! threads freely.
//!
//! ```
//! use embedding_parity::parity::{compare_rankings, compare_vectors};
//! use embedding_parity::pipelines::sentence_embeddings::{
//!     normalize, pool, rank, AttentionMask, HiddenStateMatrix,
//! };
//!
//! # fn main() -> Result<(), embedding_parity::ParityError> {
//! let hidden = HiddenStateMatrix::from_rows(vec![
//!     vec![1.0, 0.0],
//!     vec![0.0, 1.0],
//!     vec![5.0, 5.0],
//!     vec![9.0, 9.0],
//! ])?;
//! let mask = AttentionMask::new(vec![1, 1, 0, 0])?;
//! let reference = normalize(&pool(&hidden, &mask)?);
//!
//! // Embedding of the same sentence computed by another runtime
//! let target = vec![0.70710677f32, 0.7071068];
//! let report = compare_vectors(&reference, &target, 1e-4)?;
//! assert!(report.passed);
//!
//! let candidates = [("x", vec![0.8f32, 0.6]), ("y", vec![-0.6, 0.8])];
//! let reference_ranking = rank(&reference, &candidates)?;
//! let target_ranking = rank(&target, &candidates)?;
//! assert!(compare_rankings(&reference_ranking, &target_ranking, 1e-3));
//! # Ok(())
//! # }
//! ```
//!
//! The `parity-check` binary exposes the same operations on plain-text vector files.
//! Enabling the `tch` feature adds a tensor implementation of pooling and normalization
//! (`pipelines::sentence_embeddings::tensor::TensorPooling`) for checking the slice
//! implementation against a tensor runtime.

pub mod common;
pub mod parity;
pub mod pipelines;

pub use common::error::ParityError;
pub use common::Config;
