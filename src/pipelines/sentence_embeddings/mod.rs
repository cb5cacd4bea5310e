//! # Sentence Embeddings pipeline
//!
//! Reduces the per-token hidden states of a transformer forward pass to a single
//! fixed-length sentence embedding that can be compared (with cosine similarity) to find
//! sentences with a similar meaning.
//!
//! The transformer and its tokenizer are external collaborators, reached through the
//! [`TokenEncoder`] and [`HiddenStateProducer`] traits. This module always starts from the
//! raw hidden states and the attention mask, and always performs:
//! - masked mean pooling ([`pool`], [`Pooling`])
//! - L2 normalization ([`normalize`])
//! - similarity scoring and ranking ([`cosine`], [`rank`])
//!
//! Basic usage is as follows:
//!
//! ```
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
//! let embedding = normalize(&pool(&hidden, &mask)?);
//!
//! let candidates = [("x", vec![1.0f32, 0.0]), ("diagonal", embedding.clone())];
//! let ranking = rank(&embedding, &candidates)?;
//! assert_eq!(ranking[0].id, "diagonal");
//! # Ok(())
//! # }
//! ```

mod config;
pub mod layers;
mod pipeline;
mod similarity;
#[cfg(feature = "tch")]
pub mod tensor;
mod tokenizer;
mod types;

pub use config::{PoolingConfig, SentenceEmbeddingsConfig};
pub use layers::{ensure_non_degenerate, l2_norm, normalize, pool, Pooling};
pub use pipeline::{HiddenStateProducer, SentenceEmbeddingsPipeline};
pub use similarity::{cosine, rank, SimilarityResult};
pub use tokenizer::{BertTokenEncoder, EncodedInput, TokenEncoder};
pub use types::{AttentionMask, HiddenStateMatrix, TokenSequence};

/// Length = hidden dimension. Pooled (raw average) or normalized (unit L2 norm).
pub type Embedding = Vec<f32>;
