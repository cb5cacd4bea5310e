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

use tracing::warn;

use crate::pipelines::sentence_embeddings::{
    AttentionMask, Embedding, HiddenStateMatrix, PoolingConfig,
};
use crate::ParityError;

/// Lower bound of the mask sum used as pooling denominator.
pub const POOLING_EPSILON: f32 = 1e-9;
/// Lower bound of the L2 norm used as normalization denominator.
pub const NORMALIZATION_EPSILON: f32 = 1e-12;

/// Performs masked mean pooling on the token embeddings.
///
/// Generates a fixed sized sentence embedding from a variable sized sentence by averaging
/// the hidden states of the real (non-padding) tokens. Padding rows contribute nothing to
/// the sum and are excluded from the denominator.
#[derive(Debug, Clone, Default)]
pub struct Pooling {
    conf: PoolingConfig,
}

impl Pooling {
    pub fn new(conf: PoolingConfig) -> Result<Pooling, ParityError> {
        Ok(Pooling {
            conf: conf.validate()?,
        })
    }

    pub fn forward(
        &self,
        token_embeddings: &HiddenStateMatrix,
        attention_mask: &AttentionMask,
    ) -> Result<Embedding, ParityError> {
        if attention_mask.len() != token_embeddings.seq_len() {
            return Err(ParityError::InputShapeMismatch {
                context: "attention mask vs hidden-state rows".to_string(),
                expected: token_embeddings.seq_len(),
                actual: attention_mask.len(),
            });
        }
        if let Some(dimension) = self.conf.word_embedding_dimension {
            if dimension != token_embeddings.hidden_size() {
                return Err(ParityError::DimensionMismatch {
                    context: "hidden states vs pooling word_embedding_dimension".to_string(),
                    expected: dimension,
                    actual: token_embeddings.hidden_size(),
                });
            }
        }

        let mut sum_embeddings = vec![0f32; token_embeddings.hidden_size()];
        let mut sum_mask = 0f32;
        for (row, &mask) in token_embeddings.rows().zip(attention_mask.values()) {
            // Padding rows never enter the sum
            if mask == 0 {
                continue;
            }
            for (acc, value) in sum_embeddings.iter_mut().zip(row) {
                *acc += value;
            }
            sum_mask += 1.0;
        }

        if sum_mask == 0.0 {
            warn!(
                seq_len = attention_mask.len(),
                "attention mask has no real tokens, pooled embedding is all zeros"
            );
        }
        let denominator = sum_mask.max(POOLING_EPSILON);
        Ok(sum_embeddings
            .into_iter()
            .map(|value| value / denominator)
            .collect())
    }
}

/// Masked mean pooling with the default configuration.
///
/// # Arguments
///
/// * `hidden` - `seq_len x hidden_size` hidden states
/// * `mask` - attention mask of length `seq_len`
///
/// # Example
///
/// ```
/// use embedding_parity::pipelines::sentence_embeddings::{pool, AttentionMask, HiddenStateMatrix};
///
/// # fn main() -> Result<(), embedding_parity::ParityError> {
/// let hidden = HiddenStateMatrix::from_rows(vec![
///     vec![1.0, 0.0],
///     vec![0.0, 1.0],
///     vec![5.0, 5.0],
/// ])?;
/// let pooled = pool(&hidden, &AttentionMask::right_padded(2, 3))?;
/// assert_eq!(pooled, vec![0.5, 0.5]);
/// # Ok(())
/// # }
/// ```
pub fn pool(hidden: &HiddenStateMatrix, mask: &AttentionMask) -> Result<Embedding, ParityError> {
    Pooling::default().forward(hidden, mask)
}

/// Euclidean norm of a vector.
pub fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scales a vector to unit L2 norm.
///
/// The norm is floored at [`NORMALIZATION_EPSILON`]: an all-zero vector stays all zeros
/// (never NaN) and a warning is emitted.
pub fn normalize(vector: &[f32]) -> Embedding {
    let norm = l2_norm(vector);
    if norm == 0.0 {
        warn!(
            dimension = vector.len(),
            "normalizing an all-zero embedding, output is all zeros"
        );
    }
    let denominator = norm.max(NORMALIZATION_EPSILON);
    vector.iter().map(|value| value / denominator).collect()
}

/// Fails with [`ParityError::DegenerateInput`] for an all-zero embedding.
pub fn ensure_non_degenerate(vector: &[f32]) -> Result<(), ParityError> {
    if vector.iter().all(|&value| value == 0.0) {
        return Err(ParityError::DegenerateInput(format!(
            "embedding of dimension {} has zero norm",
            vector.len()
        )));
    }
    Ok(())
}
