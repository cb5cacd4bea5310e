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

use std::path::Path;

use rust_tokenizers::tokenizer::{BertTokenizer, Tokenizer, TruncationStrategy};
use rust_tokenizers::vocab::Vocab;
use serde::{Deserialize, Serialize};

use crate::common::vector_io::format_int_list;
use crate::pipelines::sentence_embeddings::{
    AttentionMask, SentenceEmbeddingsConfig, TokenSequence,
};
use crate::ParityError;

const BERT_PAD_TOKEN: &str = "[PAD]";

/// # Fixed-length tokenizer output
///
/// Token ids, attention mask and token type ids all have the same length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedInput {
    pub token_ids: TokenSequence,
    pub attention_mask: AttentionMask,
    pub token_type_ids: Vec<i64>,
}

impl EncodedInput {
    pub fn new(
        token_ids: TokenSequence,
        attention_mask: AttentionMask,
        token_type_ids: Vec<i64>,
    ) -> Result<Self, ParityError> {
        if attention_mask.len() != token_ids.len() {
            return Err(ParityError::InputShapeMismatch {
                context: "attention mask vs token ids".to_string(),
                expected: token_ids.len(),
                actual: attention_mask.len(),
            });
        }
        if token_type_ids.len() != token_ids.len() {
            return Err(ParityError::InputShapeMismatch {
                context: "token type ids vs token ids".to_string(),
                expected: token_ids.len(),
                actual: token_type_ids.len(),
            });
        }
        Ok(EncodedInput {
            token_ids,
            attention_mask,
            token_type_ids,
        })
    }

    /// Ids and mask without token type ids (all zeros).
    pub fn from_ids_and_mask(
        token_ids: TokenSequence,
        attention_mask: AttentionMask,
    ) -> Result<Self, ParityError> {
        let token_type_ids = vec![0; token_ids.len()];
        EncodedInput::new(token_ids, attention_mask, token_type_ids)
    }

    pub fn len(&self) -> usize {
        self.token_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.token_ids.is_empty()
    }

    /// Three comma-joined lines: token ids, attention mask, token type ids.
    pub fn to_lines(&self) -> String {
        [
            format_int_list(self.token_ids.ids()),
            format_int_list(self.attention_mask.values()),
            format_int_list(&self.token_type_ids),
        ]
        .join("\n")
    }
}

/// # Text to fixed-length token ids
///
/// Implementations pad or truncate every input to exactly `max_seq_length` positions.
pub trait TokenEncoder: Send + Sync {
    fn encode(&self, text: &str, max_seq_length: usize) -> Result<EncodedInput, ParityError>;
}

/// # WordPiece encoder for BERT-family models
pub struct BertTokenEncoder {
    tokenizer: BertTokenizer,
    pad_id: i64,
}

impl BertTokenEncoder {
    /// Loads a BERT vocabulary file (one token per line).
    ///
    /// # Arguments
    ///
    /// * `vocab_path` - path to `vocab.txt`
    /// * `lower_case` - lower-case input text
    /// * `strip_accents` - strip accents from input text
    pub fn from_file<P: AsRef<Path>>(
        vocab_path: P,
        lower_case: bool,
        strip_accents: bool,
    ) -> Result<Self, ParityError> {
        let vocab_path = vocab_path.as_ref();
        let vocab_path = vocab_path.to_str().ok_or_else(|| {
            ParityError::ValueError(format!(
                "vocabulary path {} is not valid UTF-8",
                vocab_path.display()
            ))
        })?;
        let tokenizer = BertTokenizer::from_file(vocab_path, lower_case, strip_accents)?;
        let pad_id = tokenizer.vocab().token_to_id(BERT_PAD_TOKEN);
        Ok(BertTokenEncoder { tokenizer, pad_id })
    }

    /// Loads a vocabulary with the casing and accent options of a `SentenceEmbeddingsConfig`.
    pub fn from_config<P: AsRef<Path>>(
        vocab_path: P,
        config: &SentenceEmbeddingsConfig,
    ) -> Result<Self, ParityError> {
        BertTokenEncoder::from_file(vocab_path, config.do_lower_case, config.strip_accents)
    }

    pub fn pad_id(&self) -> i64 {
        self.pad_id
    }
}

impl TokenEncoder for BertTokenEncoder {
    fn encode(&self, text: &str, max_seq_length: usize) -> Result<EncodedInput, ParityError> {
        if max_seq_length < 2 {
            return Err(ParityError::InvalidConfigurationError(format!(
                "max_seq_length {max_seq_length} cannot hold the [CLS] and [SEP] tokens"
            )));
        }
        let tokenized_input = self.tokenizer.encode(
            text,
            None,
            max_seq_length,
            &TruncationStrategy::LongestFirst,
            0,
        );

        let mut token_ids = tokenized_input.token_ids;
        token_ids.truncate(max_seq_length);
        let real_tokens = token_ids.len();
        token_ids.resize(max_seq_length, self.pad_id);

        let mut token_type_ids = tokenized_input
            .segment_ids
            .into_iter()
            .take(real_tokens)
            .map(i64::from)
            .collect::<Vec<_>>();
        token_type_ids.resize(max_seq_length, 0);

        EncodedInput::new(
            TokenSequence::new(token_ids),
            AttentionMask::right_padded(real_tokens, max_seq_length),
            token_type_ids,
        )
    }
}
