//! # Embedding pipelines
//!
//! #### Sentence embeddings
//! Masked mean pooling of transformer hidden states, L2 normalization, cosine similarity and
//! ranking. The transformer forward pass and the tokenizer are provided by the caller through
//! the [`TokenEncoder`](sentence_embeddings::TokenEncoder) and
//! [`HiddenStateProducer`](sentence_embeddings::HiddenStateProducer) traits; a WordPiece
//! [`BertTokenEncoder`](sentence_embeddings::BertTokenEncoder) is included.
//!
//! ```
//! use embedding_parity::pipelines::sentence_embeddings::{
//!     normalize, pool, AttentionMask, HiddenStateMatrix,
//! };
//!
//! # fn main() -> Result<(), embedding_parity::ParityError> {
//! let hidden = HiddenStateMatrix::new(vec![3.0, 4.0, 100.0, 100.0], 2, 2)?;
//! let embedding = normalize(&pool(&hidden, &AttentionMask::right_padded(1, 2))?);
//! assert!((embedding[0] - 0.6).abs() < 1e-6);
//! # Ok(())
//! # }
//! ```

pub mod sentence_embeddings;
