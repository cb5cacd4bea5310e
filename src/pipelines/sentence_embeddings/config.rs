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

use serde::{Deserialize, Serialize};

use crate::{Config, ParityError};

/// # Configuration for sentence embeddings
///
/// The sequence length differs between deployments (short-text testing vs production
/// embedding) and has no default: it must be supplied explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceEmbeddingsConfig {
    /// Fixed number of token positions produced by the tokenizer (padded/truncated)
    pub max_seq_length: usize,
    /// Expected width of the model hidden states, checked against the model output when set
    #[serde(default)]
    pub hidden_size: Option<usize>,
    /// Lower-case input text before tokenization
    #[serde(default)]
    pub do_lower_case: bool,
    /// Strip accents before tokenization
    #[serde(default)]
    pub strip_accents: bool,
}

impl Config for SentenceEmbeddingsConfig {}

impl SentenceEmbeddingsConfig {
    pub fn new(max_seq_length: usize) -> Self {
        SentenceEmbeddingsConfig {
            max_seq_length,
            hidden_size: None,
            do_lower_case: false,
            strip_accents: false,
        }
    }

    pub fn with_hidden_size(mut self, hidden_size: usize) -> Self {
        self.hidden_size = Some(hidden_size);
        self
    }

    pub fn validate(self) -> Result<Self, ParityError> {
        if self.max_seq_length == 0 {
            return Err(ParityError::InvalidConfigurationError(
                "max_seq_length must be greater than 0".to_string(),
            ));
        }
        if self.hidden_size == Some(0) {
            return Err(ParityError::InvalidConfigurationError(
                "hidden_size must be greater than 0 when set".to_string(),
            ));
        }
        Ok(self)
    }
}

/// Configuration for [`Pooling`](super::layers::Pooling) layer.
///
/// Field names follow the Sentence-Transformers `1_Pooling/config.json` file so that a
/// model's pooling configuration can be checked before it is used. Only mean pooling is
/// supported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolingConfig {
    /// Dimensions for the word embeddings
    #[serde(default)]
    pub word_embedding_dimension: Option<usize>,
    #[serde(default)]
    pub pooling_mode_cls_token: bool,
    #[serde(default)]
    pub pooling_mode_max_tokens: bool,
    #[serde(default = "default_true")]
    pub pooling_mode_mean_tokens: bool,
    #[serde(default)]
    pub pooling_mode_mean_sqrt_len_tokens: bool,
}

fn default_true() -> bool {
    true
}

impl Config for PoolingConfig {}

impl Default for PoolingConfig {
    fn default() -> Self {
        PoolingConfig {
            word_embedding_dimension: None,
            pooling_mode_cls_token: false,
            pooling_mode_max_tokens: false,
            pooling_mode_mean_tokens: true,
            pooling_mode_mean_sqrt_len_tokens: false,
        }
    }
}

impl PoolingConfig {
    pub fn validate(self) -> Result<Self, ParityError> {
        let unsupported = [
            (self.pooling_mode_cls_token, "pooling_mode_cls_token"),
            (self.pooling_mode_max_tokens, "pooling_mode_max_tokens"),
            (
                self.pooling_mode_mean_sqrt_len_tokens,
                "pooling_mode_mean_sqrt_len_tokens",
            ),
        ];
        if let Some((_, name)) = unsupported.iter().find(|(enabled, _)| *enabled) {
            return Err(ParityError::InvalidConfigurationError(format!(
                "{name} is not supported, only mean pooling is implemented"
            )));
        }
        if !self.pooling_mode_mean_tokens {
            return Err(ParityError::InvalidConfigurationError(
                "pooling_mode_mean_tokens must be enabled".to_string(),
            ));
        }
        Ok(self)
    }
}
