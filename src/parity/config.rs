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

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{Config, ParityError};

pub const DEFAULT_TOLERANCE: f32 = 1e-4;
pub const DEFAULT_SCORE_TOLERANCE: f32 = 1e-3;
pub const DEFAULT_MAX_REPORTED_DIVERGENCES: usize = 10;

/// # Tolerance policy for parity checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParityConfig {
    /// Maximum absolute per-component deviation, also bounds `1 - cosine`
    pub tolerance: f32,
    /// Score deviation above which ranking comparisons emit a warning
    pub score_tolerance: f32,
    /// Number of worst offending components listed in a report
    pub max_reported_divergences: usize,
}

impl Default for ParityConfig {
    fn default() -> Self {
        ParityConfig {
            tolerance: DEFAULT_TOLERANCE,
            score_tolerance: DEFAULT_SCORE_TOLERANCE,
            max_reported_divergences: DEFAULT_MAX_REPORTED_DIVERGENCES,
        }
    }
}

impl Config for ParityConfig {}

impl ParityConfig {
    pub fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_score_tolerance(mut self, score_tolerance: f32) -> Self {
        self.score_tolerance = score_tolerance;
        self
    }

    pub fn validate(self) -> Result<Self, ParityError> {
        for (name, value) in [
            ("tolerance", self.tolerance),
            ("score_tolerance", self.score_tolerance),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ParityError::InvalidConfigurationError(format!(
                    "{name} must be a finite non-negative number, got {value}"
                )));
            }
        }
        Ok(self)
    }
}

/// Pair of embedding files for the same input, one per runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingSourcesConfig {
    pub reference: PathBuf,
    pub candidate: PathBuf,
}

/// Named candidate of a parity suite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteCandidateConfig {
    pub id: String,
    #[serde(flatten)]
    pub sources: EmbeddingSourcesConfig,
}

/// # Manifest of a parity suite
///
/// Relative paths are resolved against the directory containing the manifest.
///
/// ```json
/// {
///   "parity": { "tolerance": 1e-4, "score_tolerance": 1e-3 },
///   "normalize_inputs": true,
///   "query": { "reference": "ref/query.txt", "candidate": "target/query.txt" },
///   "candidates": [
///     { "id": "hot dogs", "reference": "ref/0.txt", "candidate": "target/0.txt" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParitySuiteConfig {
    #[serde(default)]
    pub parity: ParityConfig,
    /// Normalize every embedding before comparison and ranking
    #[serde(default)]
    pub normalize_inputs: bool,
    pub query: EmbeddingSourcesConfig,
    pub candidates: Vec<SuiteCandidateConfig>,
}

impl Config for ParitySuiteConfig {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config: ParityConfig = serde_json::from_str(r#"{"tolerance": 0.01}"#).unwrap();
        assert_eq!(config.tolerance, 0.01);
        assert_eq!(config.score_tolerance, DEFAULT_SCORE_TOLERANCE);
        assert_eq!(
            config.max_reported_divergences,
            DEFAULT_MAX_REPORTED_DIVERGENCES
        );
    }

    #[test]
    fn rejects_invalid_tolerances() {
        assert!(ParityConfig::default().with_tolerance(-1.0).validate().is_err());
        assert!(ParityConfig::default()
            .with_score_tolerance(f32::NAN)
            .validate()
            .is_err());
        assert!(ParityConfig::default().with_tolerance(0.0).validate().is_ok());
    }

    #[test]
    fn suite_manifest() {
        let config: ParitySuiteConfig = serde_json::from_str(
            r#"{
                "query": {"reference": "q_ref.txt", "candidate": "q_target.txt"},
                "candidates": [{"id": "a", "reference": "a_ref.txt", "candidate": "a_target.txt"}]
            }"#,
        )
        .unwrap();
        assert_eq!(config.parity, ParityConfig::default());
        assert!(!config.normalize_inputs);
        assert_eq!(config.candidates[0].id, "a");
        assert_eq!(
            config.candidates[0].sources.candidate,
            PathBuf::from("a_target.txt")
        );
    }
}
