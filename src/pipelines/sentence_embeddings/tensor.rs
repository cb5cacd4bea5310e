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

//! Tensor implementation of pooling and normalization, computed the way the reference
//! numeric pipeline does it (expanded mask, masked sum, clamped denominators). Used to
//! check the slice implementation against a tensor runtime.

use std::convert::TryFrom;

use tch::{Device, Kind, Tensor};

use crate::pipelines::sentence_embeddings::layers::{NORMALIZATION_EPSILON, POOLING_EPSILON};
use crate::pipelines::sentence_embeddings::{AttentionMask, Embedding, HiddenStateMatrix};
use crate::ParityError;

/// Masked mean pooling and L2 normalization on `tch` tensors.
pub struct TensorPooling {
    device: Device,
}

impl Default for TensorPooling {
    fn default() -> Self {
        TensorPooling::new(Device::Cpu)
    }
}

impl TensorPooling {
    pub fn new(device: Device) -> TensorPooling {
        TensorPooling { device }
    }

    pub fn forward(
        &self,
        hidden: &HiddenStateMatrix,
        attention_mask: &AttentionMask,
    ) -> Result<Embedding, ParityError> {
        if attention_mask.len() != hidden.seq_len() {
            return Err(ParityError::InputShapeMismatch {
                context: "attention mask vs hidden-state rows".to_string(),
                expected: hidden.seq_len(),
                actual: attention_mask.len(),
            });
        }
        let token_embeddings = Tensor::from_slice(hidden.as_slice())
            .view([hidden.seq_len() as i64, hidden.hidden_size() as i64])
            .to(self.device);
        let attention_mask = Tensor::from_slice(&attention_mask.to_i64()).to(self.device);

        let input_mask_expanded = attention_mask
            .unsqueeze(-1)
            .expand_as(&token_embeddings)
            .to_kind(Kind::Float);
        // Padding rows are zeroed before the masked sum
        let token_embeddings = token_embeddings.masked_fill(&input_mask_expanded.eq(0.0), 0.0);
        let sum_embeddings = (&token_embeddings * &input_mask_expanded).sum_dim_intlist(
            [0].as_slice(),
            false,
            Kind::Float,
        );
        let sum_mask = input_mask_expanded
            .sum_dim_intlist([0].as_slice(), false, Kind::Float)
            .clamp_min(POOLING_EPSILON as f64);

        let pooled = (sum_embeddings / sum_mask).to(Device::Cpu);
        Ok(Vec::<f32>::try_from(&pooled)?)
    }

    pub fn normalize(&self, vector: &[f32]) -> Result<Embedding, ParityError> {
        let vector = Tensor::from_slice(vector).to(self.device);
        let norm = vector
            .norm_scalaropt_dim(2, [0].as_slice(), true)
            .clamp_min(NORMALIZATION_EPSILON as f64)
            .expand_as(&vector);
        let normalized = (vector / norm).to(Device::Cpu);
        Ok(Vec::<f32>::try_from(&normalized)?)
    }

    /// Pooling followed by normalization.
    pub fn encode(
        &self,
        hidden: &HiddenStateMatrix,
        attention_mask: &AttentionMask,
    ) -> Result<Embedding, ParityError> {
        let pooled = self.forward(hidden, attention_mask)?;
        self.normalize(&pooled)
    }
}
