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

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ParityError;

/// Which of the two compared runtimes a value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Reference,
    Candidate,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Reference => f.write_str("reference"),
            Side::Candidate => f.write_str("candidate"),
        }
    }
}

/// Data-quality findings that do not by themselves decide pass/fail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParityWarning {
    /// One side is an all-zero embedding
    ZeroNormEmbedding { side: Side },
    /// A component is NaN or infinite
    NonFiniteComponent { side: Side, index: usize },
    /// A candidate score differs between rankings by more than the score tolerance
    ScoreDeviation {
        id: String,
        reference: f32,
        candidate: f32,
        deviation: f32,
    },
}

impl fmt::Display for ParityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParityWarning::ZeroNormEmbedding { side } => {
                write!(f, "{side} embedding has zero norm")
            }
            ParityWarning::NonFiniteComponent { side, index } => {
                write!(f, "{side} embedding has a non-finite value at index {index}")
            }
            ParityWarning::ScoreDeviation {
                id,
                reference,
                candidate,
                deviation,
            } => write!(
                f,
                "score of `{id}` deviates by {deviation:e} (reference {reference:.6}, candidate {candidate:.6})"
            ),
        }
    }
}

/// A component whose absolute deviation exceeds the tolerance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDivergence {
    pub index: usize,
    pub reference: f32,
    pub candidate: f32,
    pub abs_diff: f32,
}

/// # Outcome of a vector comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParityReport {
    /// Number of components compared
    pub dimension: usize,
    /// Largest absolute per-component deviation (infinite when a component is not finite)
    pub max_abs_diff: f32,
    /// Index of the largest deviation, `None` for empty vectors
    pub max_abs_diff_index: Option<usize>,
    pub mean_abs_diff: f32,
    /// Cosine similarity between the two vectors
    pub cosine: f32,
    pub tolerance: f32,
    pub passed: bool,
    /// Number of components whose deviation exceeds the tolerance
    pub divergent_components: usize,
    /// Worst offending components, largest deviation first
    pub divergences: Vec<ComponentDivergence>,
    pub warnings: Vec<ParityWarning>,
}

impl ParityReport {
    /// Maps a failed report to [`ParityError::ToleranceExceeded`].
    pub fn into_result(self) -> Result<ParityReport, ParityError> {
        if self.passed {
            Ok(self)
        } else {
            Err(ParityError::ToleranceExceeded {
                max_abs_diff: self.max_abs_diff,
                index: self.max_abs_diff_index,
                cosine: self.cosine,
                tolerance: self.tolerance,
            })
        }
    }
}

impl fmt::Display for ParityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} dimension={} max_abs_diff={:e}",
            if self.passed { "PASS" } else { "FAIL" },
            self.dimension,
            self.max_abs_diff
        )?;
        if let Some(index) = self.max_abs_diff_index {
            write!(f, " (index {index})")?;
        }
        write!(
            f,
            " mean_abs_diff={:e} cosine={:.8} tolerance={:e}",
            self.mean_abs_diff, self.cosine, self.tolerance
        )?;
        if self.divergent_components > 0 {
            write!(
                f,
                "\n  {} component(s) beyond tolerance, worst {}:",
                self.divergent_components,
                self.divergences.len()
            )?;
            for divergence in &self.divergences {
                write!(
                    f,
                    "\n    [{}] reference={:.9e} candidate={:.9e} |diff|={:e}",
                    divergence.index,
                    divergence.reference,
                    divergence.candidate,
                    divergence.abs_diff
                )?;
            }
        }
        for warning in &self.warnings {
            write!(f, "\n  warning: {warning}")?;
        }
        Ok(())
    }
}

/// # Outcome of a ranking comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingReport {
    pub reference_order: Vec<String>,
    pub candidate_order: Vec<String>,
    /// Whether both candidate-id sequences are identical
    pub order_matches: bool,
    /// First position at which the two orders differ
    pub first_divergence: Option<usize>,
    pub score_tolerance: f32,
    /// Largest score difference among candidates present in both rankings
    pub max_score_deviation: f32,
    pub warnings: Vec<ParityWarning>,
    pub passed: bool,
}

impl fmt::Display for RankingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ranking of {} candidate(s), max score deviation {:e} (tolerance {:e})",
            if self.passed { "PASS" } else { "FAIL" },
            self.reference_order.len().max(self.candidate_order.len()),
            self.max_score_deviation,
            self.score_tolerance
        )?;
        if let Some(position) = self.first_divergence {
            write!(f, "\n  orders diverge at position {position}:")?;
            let rows = self.reference_order.len().max(self.candidate_order.len());
            for row in 0..rows {
                let reference = self.reference_order.get(row).map_or("-", String::as_str);
                let candidate = self.candidate_order.get(row).map_or("-", String::as_str);
                let marker = if reference == candidate { " " } else { "*" };
                write!(f, "\n  {marker} {row:>3}  {reference:<24} {candidate}")?;
            }
        }
        for warning in &self.warnings {
            write!(f, "\n  warning: {warning}")?;
        }
        Ok(())
    }
}
