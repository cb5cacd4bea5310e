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

use std::convert::TryFrom;

use serde::{Deserialize, Serialize};

use crate::ParityError;

/// # Fixed-length sequence of token ids, padded with the tokenizer pad id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSequence(Vec<i64>);

impl TokenSequence {
    pub fn new(ids: Vec<i64>) -> Self {
        TokenSequence(ids)
    }

    pub fn ids(&self) -> &[i64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<i64>> for TokenSequence {
    fn from(ids: Vec<i64>) -> Self {
        TokenSequence(ids)
    }
}

/// # Binary attention mask
///
/// `1` marks a real token, `0` marks padding. Any other value is rejected on construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct AttentionMask(Vec<u8>);

impl AttentionMask {
    pub fn new(values: Vec<u8>) -> Result<Self, ParityError> {
        if let Some((position, value)) = values.iter().enumerate().find(|(_, v)| **v > 1) {
            return Err(ParityError::ValueError(format!(
                "attention mask values must be 0 or 1, found {value} at position {position}"
            )));
        }
        Ok(AttentionMask(values))
    }

    /// Mask with `real_tokens` ones followed by zeros up to `seq_len`.
    pub fn right_padded(real_tokens: usize, seq_len: usize) -> Self {
        let real_tokens = real_tokens.min(seq_len);
        let mut values = vec![1u8; real_tokens];
        values.resize(seq_len, 0);
        AttentionMask(values)
    }

    pub fn values(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of non-padding positions.
    pub fn real_tokens(&self) -> usize {
        self.0.iter().filter(|&&v| v == 1).count()
    }

    pub fn is_all_padding(&self) -> bool {
        self.real_tokens() == 0
    }

    pub fn to_i64(&self) -> Vec<i64> {
        self.0.iter().map(|&v| i64::from(v)).collect()
    }
}

impl TryFrom<Vec<u8>> for AttentionMask {
    type Error = ParityError;

    fn try_from(values: Vec<u8>) -> Result<Self, Self::Error> {
        AttentionMask::new(values)
    }
}

impl TryFrom<&[i64]> for AttentionMask {
    type Error = ParityError;

    fn try_from(values: &[i64]) -> Result<Self, Self::Error> {
        values
            .iter()
            .enumerate()
            .map(|(position, &v)| match v {
                0 => Ok(0u8),
                1 => Ok(1u8),
                _ => Err(ParityError::ValueError(format!(
                    "attention mask values must be 0 or 1, found {v} at position {position}"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(AttentionMask)
    }
}

impl From<AttentionMask> for Vec<u8> {
    fn from(mask: AttentionMask) -> Self {
        mask.0
    }
}

/// # Per-token hidden states produced by the transformer forward pass
///
/// Row-major `seq_len x hidden_size` matrix of `f32`; row `i` holds the hidden state of
/// token `i`. Both dimensions are runtime values.
#[derive(Debug, Clone, PartialEq)]
pub struct HiddenStateMatrix {
    data: Vec<f32>,
    seq_len: usize,
    hidden_size: usize,
}

impl HiddenStateMatrix {
    /// Wraps a flat row-major buffer.
    ///
    /// # Arguments
    ///
    /// * `data` - flat buffer of `seq_len * hidden_size` values
    /// * `seq_len` - number of token rows
    /// * `hidden_size` - width of each row
    pub fn new(data: Vec<f32>, seq_len: usize, hidden_size: usize) -> Result<Self, ParityError> {
        if seq_len == 0 || hidden_size == 0 {
            return Err(ParityError::ValueError(format!(
                "hidden-state matrix dimensions must be non-zero, got {seq_len}x{hidden_size}"
            )));
        }
        if data.len() != seq_len * hidden_size {
            return Err(ParityError::InputShapeMismatch {
                context: format!("hidden-state buffer of a {seq_len}x{hidden_size} matrix"),
                expected: seq_len * hidden_size,
                actual: data.len(),
            });
        }
        Ok(HiddenStateMatrix {
            data,
            seq_len,
            hidden_size,
        })
    }

    /// Builds a matrix from token rows, all of which must have the same width.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self, ParityError> {
        let seq_len = rows.len();
        let hidden_size = rows.first().map(Vec::len).unwrap_or(0);
        let mut data = Vec::with_capacity(seq_len * hidden_size);
        for (position, row) in rows.into_iter().enumerate() {
            if row.len() != hidden_size {
                return Err(ParityError::DimensionMismatch {
                    context: format!("hidden state of token {position}"),
                    expected: hidden_size,
                    actual: row.len(),
                });
            }
            data.extend(row);
        }
        HiddenStateMatrix::new(data, seq_len, hidden_size)
    }

    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn row(&self, index: usize) -> &[f32] {
        let start = index * self.hidden_size;
        &self.data[start..start + self.hidden_size]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.hidden_size)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mask_rejects_non_binary_values() {
        assert!(AttentionMask::new(vec![1, 0, 2]).is_err());
        assert!(AttentionMask::try_from([1i64, -1].as_slice()).is_err());
        let mask = AttentionMask::try_from([1i64, 1, 0].as_slice()).unwrap();
        assert_eq!(mask.real_tokens(), 2);
        assert_eq!(mask.to_i64(), vec![1, 1, 0]);
    }

    #[test]
    fn right_padded_mask() {
        let mask = AttentionMask::right_padded(3, 5);
        assert_eq!(mask.values(), &[1, 1, 1, 0, 0]);
        assert!(!mask.is_all_padding());
        assert!(AttentionMask::right_padded(0, 4).is_all_padding());
    }

    #[test]
    fn matrix_shape_is_checked() {
        assert!(matches!(
            HiddenStateMatrix::new(vec![0.0; 5], 2, 3),
            Err(ParityError::InputShapeMismatch {
                expected: 6,
                actual: 5,
                ..
            })
        ));
        assert!(HiddenStateMatrix::new(vec![], 0, 3).is_err());
        assert!(HiddenStateMatrix::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).is_err());
    }

    #[test]
    fn matrix_rows() {
        let hidden = HiddenStateMatrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let rows: Vec<&[f32]> = hidden.rows().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], &[3.0, 4.0]);
    }
}
