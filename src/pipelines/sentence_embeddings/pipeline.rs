// Copyright 2024 The embedding-parity Authors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use tracing::debug;

use crate::pipelines::sentence_embeddings::layers::{normalize, Pooling};
use crate::pipelines::sentence_embeddings::{
    EncodedInput, Embedding, HiddenStateMatrix, SentenceEmbeddingsConfig, TokenEncoder,
};
use crate::ParityError;

/// # Transformer forward pass
///
/// Maps fixed-length token ids and attention mask to one hidden state per token. The model
/// itself lives outside this crate; implementations wrap whatever runtime executes it.
pub trait HiddenStateProducer: Send + Sync {
    fn forward(&self, input: &EncodedInput) -> Result<HiddenStateMatrix, ParityError>;
}

/// # SentenceEmbeddingsPipeline to compute sentence embeddings
///
/// It is made of the following blocks:
/// - `tokenizer`: fixed-length token encoder
/// - `transformer`: hidden state producer (model forward pass)
/// - `pooling`: masked mean pooling
/// - `normalization`: L2 normalization, always applied
///
/// Pooling and normalization are always performed here, from raw per-token hidden states,
/// so that the model runtime never has to agree on an output convention.
pub struct SentenceEmbeddingsPipeline<T, P>
where
    T: TokenEncoder,
    P: HiddenStateProducer,
{
    config: SentenceEmbeddingsConfig,
    tokenizer: T,
    transformer: P,
    pooling_layer: Pooling,
}

impl<T, P> SentenceEmbeddingsPipeline<T, P>
where
    T: TokenEncoder,
    P: HiddenStateProducer,
{
    /// Build a new `SentenceEmbeddingsPipeline`
    ///
    /// # Arguments
    ///
    /// * `config` - `SentenceEmbeddingsConfig` with the sequence length and expected hidden size
    /// * `tokenizer` - token encoder producing `max_seq_length` positions
    /// * `transformer` - hidden state producer
    pub fn new(config: SentenceEmbeddingsConfig, tokenizer: T, transformer: P) -> Result<Self, ParityError> {
        Ok(SentenceEmbeddingsPipeline {
            config: config.validate()?,
            tokenizer,
            transformer,
            pooling_layer: Pooling::default(),
        })
    }

    /// Replaces the default pooling layer, e.g. with one checking the embedding dimension.
    pub fn with_pooling(mut self, pooling_layer: Pooling) -> Self {
        self.pooling_layer = pooling_layer;
        self
    }

    pub fn config(&self) -> &SentenceEmbeddingsConfig {
        &self.config
    }

    /// Tokenizes a single input to `max_seq_length` positions.
    pub fn tokenize(&self, text: &str) -> Result<EncodedInput, ParityError> {
        let encoded = self.tokenizer.encode(text, self.config.max_seq_length)?;
        if encoded.len() != self.config.max_seq_length {
            return Err(ParityError::InputShapeMismatch {
                context: "tokenizer output vs max_seq_length".to_string(),
                expected: self.config.max_seq_length,
                actual: encoded.len(),
            });
        }
        Ok(encoded)
    }

    /// Computes the normalized embedding of an already tokenized input.
    pub fn encode_tokens(&self, input: &EncodedInput) -> Result<Embedding, ParityError> {
        if input.len() != self.config.max_seq_length {
            return Err(ParityError::InputShapeMismatch {
                context: "token ids vs max_seq_length".to_string(),
                expected: self.config.max_seq_length,
                actual: input.len(),
            });
        }
        let hidden_states = self.transformer.forward(input)?;
        if hidden_states.seq_len() != input.len() {
            return Err(ParityError::InputShapeMismatch {
                context: "hidden-state rows vs token ids".to_string(),
                expected: input.len(),
                actual: hidden_states.seq_len(),
            });
        }
        if let Some(hidden_size) = self.config.hidden_size {
            if hidden_states.hidden_size() != hidden_size {
                return Err(ParityError::DimensionMismatch {
                    context: "hidden states vs configured hidden_size".to_string(),
                    expected: hidden_size,
                    actual: hidden_states.hidden_size(),
                });
            }
        }
        debug!(
            seq_len = hidden_states.seq_len(),
            hidden_size = hidden_states.hidden_size(),
            real_tokens = input.attention_mask.real_tokens(),
            "pooling hidden states"
        );
        let mean_pool = self
            .pooling_layer
            .forward(&hidden_states, &input.attention_mask)?;
        Ok(normalize(&mean_pool))
    }

    /// Computes the normalized embedding of a text.
    pub fn encode(&self, text: &str) -> Result<Embedding, ParityError> {
        let encoded = self.tokenize(text)?;
        self.encode_tokens(&encoded)
    }

    /// Computes sentence embeddings for several texts.
    pub fn encode_batch<S>(&self, inputs: &[S]) -> Result<Vec<Embedding>, ParityError>
    where
        S: AsRef<str>,
    {
        inputs
            .iter()
            .map(|input| self.encode(input.as_ref()))
            .collect()
    }
}
