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

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::ParityError;

/// # Score of a single candidate against a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    /// Candidate identifier
    pub id: String,
    /// Cosine similarity with the query
    pub score: f32,
}

/// Cosine similarity of two unit-normalized embeddings, computed as their dot product.
///
/// The inputs are not re-normalized: for non-unit vectors this is a plain inner product.
pub fn cosine(a: &[f32], b: &[f32]) -> Result<f32, ParityError> {
    if a.len() != b.len() {
        return Err(ParityError::DimensionMismatch {
            context: "cosine similarity operands".to_string(),
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(a.iter().zip(b).map(|(x, y)| x * y).sum())
}

/// Sort key placing NaN scores below every number.
fn score_key(score: f32) -> (bool, OrderedFloat<f32>) {
    (!score.is_nan(), OrderedFloat(score))
}

/// Ranks candidates by descending cosine similarity with the query.
///
/// Candidates with equal scores keep their input order and NaN scores rank last. An empty
/// candidate list yields an empty ranking.
///
/// # Arguments
///
/// * `query` - unit-normalized query embedding
/// * `candidates` - `(identifier, embedding)` pairs
///
/// # Example
///
/// ```
/// use embedding_parity::pipelines::sentence_embeddings::rank;
///
/// # fn main() -> Result<(), embedding_parity::ParityError> {
/// let candidates = [("a", vec![0.0f32, 1.0]), ("b", vec![1.0, 0.0])];
/// let ranking = rank(&[1.0, 0.0], &candidates)?;
/// assert_eq!(ranking[0].id, "b");
/// # Ok(())
/// # }
/// ```
pub fn rank<S, E>(query: &[f32], candidates: &[(S, E)]) -> Result<Vec<SimilarityResult>, ParityError>
where
    S: AsRef<str>,
    E: AsRef<[f32]>,
{
    let mut results = candidates
        .iter()
        .map(|(id, embedding)| {
            cosine(query, embedding.as_ref())
                .map_err(|_| ParityError::DimensionMismatch {
                    context: format!("candidate `{}` vs query", id.as_ref()),
                    expected: query.len(),
                    actual: embedding.as_ref().len(),
                })
                .map(|score| SimilarityResult {
                    id: id.as_ref().to_string(),
                    score,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    // `sort_by` is stable: ties keep the candidate order
    results.sort_by(|a, b| score_key(b.score).cmp(&score_key(a.score)));
    Ok(results)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ranks_by_descending_score() {
        let candidates = vec![
            ("a", vec![0.0f32, 1.0]),
            ("b", vec![1.0, 0.0]),
            ("c", vec![0.7071, 0.7071]),
        ];
        let ranking = rank(&[1.0, 0.0], &candidates).unwrap();
        let ids: Vec<&str> = ranking.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
        assert!((ranking[0].score - 1.0).abs() < 1e-6);
        assert!((ranking[1].score - 0.7071).abs() < 1e-6);
        assert!(ranking[2].score.abs() < 1e-6);
    }

    #[test]
    fn ties_keep_input_order() {
        let candidates = vec![
            ("first", vec![0.6f32, 0.8]),
            ("second", vec![0.6, 0.8]),
            ("best", vec![1.0, 0.0]),
            ("third", vec![0.6, 0.8]),
        ];
        let ranking = rank(&[1.0, 0.0], &candidates).unwrap();
        let ids: Vec<&str> = ranking.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["best", "first", "second", "third"]);
    }

    #[test]
    fn nan_scores_rank_last() {
        let candidates = vec![
            ("broken", vec![f32::NAN, 0.0]),
            ("opposite", vec![-1.0, 0.0]),
            ("good", vec![1.0f32, 0.0]),
            ("also broken", vec![0.0, f32::NAN]),
        ];
        let ranking = rank(&[1.0, 0.0], &candidates).unwrap();
        let ids: Vec<&str> = ranking.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["good", "opposite", "broken", "also broken"]);
        assert!(ranking[2].score.is_nan());
    }

    #[test]
    fn empty_candidates() {
        let candidates: Vec<(String, Vec<f32>)> = vec![];
        assert!(rank(&[1.0, 0.0], &candidates).unwrap().is_empty());
    }

    #[test]
    fn dimension_mismatch() {
        assert!(matches!(
            cosine(&[1.0, 0.0], &[1.0, 0.0, 0.0]),
            Err(ParityError::DimensionMismatch { .. })
        ));
        let candidates = vec![("short", vec![1.0f32])];
        assert!(rank(&[1.0, 0.0], &candidates).is_err());
    }
}
