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

use rust_tokenizers::error::TokenizerError;
#[cfg(feature = "tch")]
use tch::TchError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParityError {
    /// The attention mask and the hidden-state matrix disagree on the sequence length.
    #[error(
        "Input shape mismatch for {context}: expected {expected} positions, got {actual} \
         (model and tokenizer disagree on the sequence length)"
    )]
    InputShapeMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    /// Two vectors of different hidden dimension were compared.
    #[error(
        "Dimension mismatch for {context}: expected {expected} components, got {actual} \
         (the runtimes were most likely configured with different models)"
    )]
    DimensionMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    #[error(
        "Tolerance exceeded: max absolute deviation {max_abs_diff:e} at index {index:?}, \
         cosine similarity {cosine}, tolerance {tolerance:e}"
    )]
    ToleranceExceeded {
        max_abs_diff: f32,
        index: Option<usize>,
        cosine: f32,
        tolerance: f32,
    },

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("Invalid configuration error: {0}")]
    InvalidConfigurationError(String),

    #[error("Value error: {0}")]
    ValueError(String),

    #[error("Tokenizer error: {0}")]
    TokenizerError(String),

    #[cfg(feature = "tch")]
    #[error("Tch tensor error: {0}")]
    TchError(String),
}

impl From<std::io::Error> for ParityError {
    fn from(error: std::io::Error) -> Self {
        ParityError::IOError(error.to_string())
    }
}

impl From<serde_json::Error> for ParityError {
    fn from(error: serde_json::Error) -> Self {
        ParityError::InvalidConfigurationError(error.to_string())
    }
}

impl From<TokenizerError> for ParityError {
    fn from(error: TokenizerError) -> Self {
        ParityError::TokenizerError(error.to_string())
    }
}

#[cfg(feature = "tch")]
impl From<TchError> for ParityError {
    fn from(error: TchError) -> Self {
        ParityError::TchError(error.to_string())
    }
}
