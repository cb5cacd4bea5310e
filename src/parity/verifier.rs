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

use std::collections::HashMap;

use ordered_float::OrderedFloat;
use tracing::{debug, warn};

use crate::parity::{
    ComponentDivergence, ParityConfig, ParityReport, ParityWarning, RankingReport, Side,
};
use crate::pipelines::sentence_embeddings::SimilarityResult;
use crate::ParityError;

const COSINE_NORM_EPSILON: f64 = 1e-12;

/// # Compares embeddings and rankings produced by two independent runtimes
///
/// A vector comparison passes when both the largest absolute per-component deviation is
/// within the tolerance and the cosine similarity is at least `1 - tolerance`. A ranking
/// comparison passes when the candidate order is identical; score deviations beyond the
/// score tolerance are reported as warnings only.
///
/// Tolerance failures are returned as report data. Shape problems (vectors of different
/// dimension) are errors.
#[derive(Debug, Clone, Default)]
pub struct ParityVerifier {
    config: ParityConfig,
}

impl ParityVerifier {
    pub fn new(config: ParityConfig) -> Result<ParityVerifier, ParityError> {
        Ok(ParityVerifier {
            config: config.validate()?,
        })
    }

    pub fn config(&self) -> &ParityConfig {
        &self.config
    }

    /// Compares a reference embedding with a candidate embedding.
    ///
    /// # Arguments
    ///
    /// * `reference` - embedding computed by the reference runtime
    /// * `candidate` - embedding computed by the runtime under test
    pub fn compare_vectors(
        &self,
        reference: &[f32],
        candidate: &[f32],
    ) -> Result<ParityReport, ParityError> {
        if reference.len() != candidate.len() {
            return Err(ParityError::DimensionMismatch {
                context: "candidate embedding vs reference embedding".to_string(),
                expected: reference.len(),
                actual: candidate.len(),
            });
        }
        let tolerance = self.config.tolerance;

        let mut warnings = Vec::new();
        for (side, vector) in [(Side::Reference, reference), (Side::Candidate, candidate)] {
            if let Some(index) = vector.iter().position(|value| !value.is_finite()) {
                warnings.push(ParityWarning::NonFiniteComponent { side, index });
            } else if !vector.is_empty() && vector.iter().all(|&value| value == 0.0) {
                warnings.push(ParityWarning::ZeroNormEmbedding { side });
            }
        }

        let mut max_abs_diff = 0f32;
        let mut max_abs_diff_index = None;
        let mut sum_abs_diff = 0f64;
        let mut divergences = Vec::new();
        for (index, (&r, &c)) in reference.iter().zip(candidate).enumerate() {
            let abs_diff = match (r - c).abs() {
                diff if diff.is_nan() => f32::INFINITY,
                diff => diff,
            };
            if max_abs_diff_index.is_none() || abs_diff > max_abs_diff {
                max_abs_diff = abs_diff;
                max_abs_diff_index = Some(index);
            }
            sum_abs_diff += f64::from(abs_diff);
            if abs_diff > tolerance {
                divergences.push(ComponentDivergence {
                    index,
                    reference: r,
                    candidate: c,
                    abs_diff,
                });
            }
        }
        let mean_abs_diff = if reference.is_empty() {
            0.0
        } else {
            (sum_abs_diff / reference.len() as f64) as f32
        };

        let divergent_components = divergences.len();
        divergences.sort_by_key(|divergence| std::cmp::Reverse(OrderedFloat(divergence.abs_diff)));
        divergences.truncate(self.config.max_reported_divergences);

        let cosine = cosine_similarity(reference, candidate);
        let passed = max_abs_diff <= tolerance && cosine >= 1.0 - tolerance;

        let report = ParityReport {
            dimension: reference.len(),
            max_abs_diff,
            max_abs_diff_index,
            mean_abs_diff,
            cosine,
            tolerance,
            passed,
            divergent_components,
            divergences,
            warnings,
        };
        debug!(
            passed = report.passed,
            max_abs_diff = report.max_abs_diff,
            cosine = report.cosine,
            "compared embeddings"
        );
        Ok(report)
    }

    /// Detailed comparison of two rankings of the same candidates.
    pub fn ranking_report(
        &self,
        reference: &[SimilarityResult],
        candidate: &[SimilarityResult],
    ) -> RankingReport {
        ranking_report(reference, candidate, self.config.score_tolerance)
    }

    /// Returns `true` when both rankings list the candidates in the same order.
    pub fn compare_rankings(
        &self,
        reference: &[SimilarityResult],
        candidate: &[SimilarityResult],
    ) -> bool {
        self.ranking_report(reference, candidate).passed
    }
}

/// Direction agreement of two vectors of any norm, accumulated in `f64`.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0f64, 0f64, 0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denominator = norm_a.sqrt().max(COSINE_NORM_EPSILON) * norm_b.sqrt().max(COSINE_NORM_EPSILON);
    ((dot / denominator) as f32).clamp(-1.0, 1.0)
}

fn ranking_report(
    reference: &[SimilarityResult],
    candidate: &[SimilarityResult],
    score_tolerance: f32,
) -> RankingReport {
    let reference_order: Vec<String> = reference.iter().map(|r| r.id.clone()).collect();
    let candidate_order: Vec<String> = candidate.iter().map(|r| r.id.clone()).collect();
    let order_matches = reference_order == candidate_order;
    let first_divergence = if order_matches {
        None
    } else {
        Some(
            reference_order
                .iter()
                .zip(&candidate_order)
                .position(|(r, c)| r != c)
                .unwrap_or_else(|| reference_order.len().min(candidate_order.len())),
        )
    };

    let candidate_scores: HashMap<&str, f32> = candidate
        .iter()
        .map(|result| (result.id.as_str(), result.score))
        .collect();
    let mut max_score_deviation = 0f32;
    let mut warnings = Vec::new();
    for result in reference {
        let Some(&candidate_score) = candidate_scores.get(result.id.as_str()) else {
            continue;
        };
        let deviation = match (result.score - candidate_score).abs() {
            diff if diff.is_nan() => f32::INFINITY,
            diff => diff,
        };
        max_score_deviation = max_score_deviation.max(deviation);
        if deviation > score_tolerance {
            warn!(
                id = %result.id,
                reference = result.score,
                candidate = candidate_score,
                deviation,
                "similarity score deviates beyond tolerance"
            );
            warnings.push(ParityWarning::ScoreDeviation {
                id: result.id.clone(),
                reference: result.score,
                candidate: candidate_score,
                deviation,
            });
        }
    }

    if let Some(position) = first_divergence {
        debug!(position, "rankings diverge");
    }
    RankingReport {
        reference_order,
        candidate_order,
        order_matches,
        first_divergence,
        score_tolerance,
        max_score_deviation,
        warnings,
        passed: order_matches,
    }
}

/// Compares two embeddings with the given tolerance.
///
/// # Example
///
/// ```
/// use embedding_parity::parity::compare_vectors;
///
/// # fn main() -> Result<(), embedding_parity::ParityError> {
/// let report = compare_vectors(&[0.5, 0.5], &[0.5000001, 0.4999999], 1e-4)?;
/// assert!(report.passed);
///
/// let report = compare_vectors(&[1.0, 0.0], &[0.0, 1.0], 0.01)?;
/// assert!(!report.passed);
/// assert_eq!(report.cosine, 0.0);
/// # Ok(())
/// # }
/// ```
pub fn compare_vectors(a: &[f32], b: &[f32], tol: f32) -> Result<ParityReport, ParityError> {
    ParityVerifier::new(ParityConfig::default().with_tolerance(tol))?.compare_vectors(a, b)
}

/// Returns `true` when both rankings have the same candidate order. Score deviations
/// beyond `score_tol` are logged as warnings.
pub fn compare_rankings(
    ranked_a: &[SimilarityResult],
    ranked_b: &[SimilarityResult],
    score_tol: f32,
) -> bool {
    ranking_report(ranked_a, ranked_b, score_tol).passed
}

#[cfg(test)]
mod test {
    use super::*;

    fn result(id: &str, score: f32) -> SimilarityResult {
        SimilarityResult {
            id: id.to_string(),
            score,
        }
    }

    #[test]
    fn nearly_identical_vectors_pass() {
        let report = compare_vectors(&[0.5, 0.5], &[0.5000001, 0.4999999], 1e-4).unwrap();
        assert!(report.passed);
        assert!(report.max_abs_diff < 1e-6);
        assert!(report.max_abs_diff > 0.0);
        assert!(report.divergences.is_empty());
        assert!((report.cosine - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_fail() {
        let report = compare_vectors(&[1.0, 0.0], &[0.0, 1.0], 0.01).unwrap();
        assert!(!report.passed);
        assert_eq!(report.cosine, 0.0);
        assert_eq!(report.max_abs_diff, 1.0);
        assert_eq!(report.max_abs_diff_index, Some(0));
        assert_eq!(report.divergent_components, 2);
        assert!(matches!(
            report.into_result(),
            Err(ParityError::ToleranceExceeded { .. })
        ));
    }

    #[test]
    fn uniform_scale_error_fails_absolute_check() {
        // Same direction, so cosine is 1, but every component is off by 10%.
        let reference = [0.6, 0.8];
        let candidate = [0.66, 0.88];
        let report = compare_vectors(&reference, &candidate, 1e-3).unwrap();
        assert!((report.cosine - 1.0).abs() < 1e-6);
        assert!(!report.passed);
    }

    #[test]
    fn worst_divergences_first() {
        let verifier = ParityVerifier::new(ParityConfig {
            tolerance: 0.01,
            score_tolerance: 0.01,
            max_reported_divergences: 2,
        })
        .unwrap();
        let reference = [0.1, 0.2, 0.3, 0.4];
        let candidate = [0.15, 0.2, 0.5, 0.3];
        let report = verifier.compare_vectors(&reference, &candidate).unwrap();
        assert_eq!(report.divergent_components, 3);
        let indices: Vec<usize> = report.divergences.iter().map(|d| d.index).collect();
        assert_eq!(indices, vec![2, 3]);
        assert_eq!(report.max_abs_diff_index, Some(2));
        let text = report.to_string();
        assert!(text.starts_with("FAIL"));
        assert!(text.contains("[2]"));
    }

    #[test]
    fn non_finite_components_fail() {
        let report = compare_vectors(&[0.6, 0.8], &[0.6, f32::NAN], 1e-3).unwrap();
        assert!(!report.passed);
        assert_eq!(report.max_abs_diff, f32::INFINITY);
        assert_eq!(
            report.warnings,
            vec![ParityWarning::NonFiniteComponent {
                side: Side::Candidate,
                index: 1
            }]
        );
    }

    #[test]
    fn zero_embedding_is_flagged() {
        let report = compare_vectors(&[0.0, 0.0], &[0.0, 0.0], 1e-3).unwrap();
        assert!(!report.passed);
        assert_eq!(report.warnings.len(), 2);
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        assert!(matches!(
            compare_vectors(&[1.0, 0.0], &[1.0, 0.0, 0.0], 1e-3),
            Err(ParityError::DimensionMismatch {
                expected: 2,
                actual: 3,
                ..
            })
        ));
    }

    #[test]
    fn invalid_tolerance_is_rejected() {
        assert!(matches!(
            compare_vectors(&[1.0], &[1.0], -1.0),
            Err(ParityError::InvalidConfigurationError(_))
        ));
    }

    #[test]
    fn matching_rankings_with_score_drift() {
        let reference = vec![result("b", 1.0), result("c", 0.7071), result("a", 0.0)];
        let candidate = vec![result("b", 0.999), result("c", 0.69), result("a", 0.0)];
        assert!(compare_rankings(&reference, &candidate, 1e-3));

        let report = ranking_report(&reference, &candidate, 1e-3);
        assert!(report.order_matches);
        assert_eq!(report.first_divergence, None);
        assert_eq!(report.warnings.len(), 1);
        assert!(matches!(
            &report.warnings[0],
            ParityWarning::ScoreDeviation { id, .. } if id == "c"
        ));
    }

    #[test]
    fn reordered_rankings_fail() {
        let reference = vec![result("b", 1.0), result("c", 0.71), result("a", 0.70)];
        let candidate = vec![result("b", 1.0), result("a", 0.71), result("c", 0.70)];
        assert!(!compare_rankings(&reference, &candidate, 0.1));

        let report = ParityVerifier::default().ranking_report(&reference, &candidate);
        assert_eq!(report.first_divergence, Some(1));
        assert!(report.to_string().contains("orders diverge at position 1"));
    }

    #[test]
    fn truncated_ranking_diverges_at_shorter_length() {
        let reference = vec![result("b", 1.0), result("c", 0.5)];
        let candidate = vec![result("b", 1.0)];
        let report = ranking_report(&reference, &candidate, 0.1);
        assert!(!report.passed);
        assert_eq!(report.first_divergence, Some(1));
    }

    #[test]
    fn empty_rankings_match() {
        assert!(compare_rankings(&[], &[], 0.0));
    }
}
