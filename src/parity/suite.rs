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

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::common::vector_io::read_vector_file;
use crate::parity::{
    EmbeddingSourcesConfig, ParityReport, ParitySuiteConfig, ParityVerifier, RankingReport,
};
use crate::pipelines::sentence_embeddings::{normalize, rank, Embedding, SimilarityResult};
use crate::ParityError;

/// Embeddings of the same input computed by both runtimes.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingPair {
    pub reference: Embedding,
    pub candidate: Embedding,
}

impl EmbeddingPair {
    pub fn new(reference: Embedding, candidate: Embedding) -> Self {
        EmbeddingPair {
            reference,
            candidate,
        }
    }

    fn from_sources(sources: &EmbeddingSourcesConfig, base_dir: &Path) -> Result<Self, ParityError> {
        Ok(EmbeddingPair {
            reference: read_vector_file(base_dir.join(&sources.reference))?,
            candidate: read_vector_file(base_dir.join(&sources.candidate))?,
        })
    }

    fn normalized(&self) -> Self {
        EmbeddingPair {
            reference: normalize(&self.reference),
            candidate: normalize(&self.candidate),
        }
    }
}

/// Vector report of one named candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateReport {
    pub id: String,
    pub report: ParityReport,
}

/// # Outcome of a parity suite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteReport {
    pub query: ParityReport,
    pub candidates: Vec<CandidateReport>,
    pub reference_ranking: Vec<SimilarityResult>,
    pub candidate_ranking: Vec<SimilarityResult>,
    pub ranking: RankingReport,
    pub passed: bool,
}

/// # Query and candidates embedded by two runtimes
///
/// Running the suite compares every embedding pair, ranks the candidates against the query
/// in each runtime and compares the two rankings. The suite passes only if every vector
/// comparison and the ranking comparison pass.
#[derive(Debug, Clone)]
pub struct ParitySuite {
    query: EmbeddingPair,
    candidates: Vec<(String, EmbeddingPair)>,
    normalize_inputs: bool,
}

impl ParitySuite {
    pub fn new(query: EmbeddingPair, candidates: Vec<(String, EmbeddingPair)>) -> Self {
        ParitySuite {
            query,
            candidates,
            normalize_inputs: false,
        }
    }

    /// Normalize every embedding before comparison, for runtimes that emit pooled vectors.
    pub fn with_normalized_inputs(mut self, normalize_inputs: bool) -> Self {
        self.normalize_inputs = normalize_inputs;
        self
    }

    /// Loads every embedding named in the manifest, resolving paths against `base_dir`.
    pub fn from_config(config: &ParitySuiteConfig, base_dir: &Path) -> Result<Self, ParityError> {
        let query = EmbeddingPair::from_sources(&config.query, base_dir)?;
        let candidates = config
            .candidates
            .iter()
            .map(|candidate| {
                EmbeddingPair::from_sources(&candidate.sources, base_dir)
                    .map(|pair| (candidate.id.clone(), pair))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ParitySuite::new(query, candidates).with_normalized_inputs(config.normalize_inputs))
    }

    pub fn run(&self, verifier: &ParityVerifier) -> Result<SuiteReport, ParityError> {
        let query = if self.normalize_inputs {
            self.query.normalized()
        } else {
            self.query.clone()
        };
        let candidates = self
            .candidates
            .iter()
            .map(|(id, pair)| {
                let pair = if self.normalize_inputs {
                    pair.normalized()
                } else {
                    pair.clone()
                };
                (id.as_str(), pair)
            })
            .collect::<Vec<_>>();

        let query_report = verifier
            .compare_vectors(&query.reference, &query.candidate)
            .map_err(|error| with_context(error, "query"))?;
        let candidate_reports = candidates
            .iter()
            .map(|(id, pair)| {
                verifier
                    .compare_vectors(&pair.reference, &pair.candidate)
                    .map(|report| CandidateReport {
                        id: id.to_string(),
                        report,
                    })
                    .map_err(|error| with_context(error, id))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let reference_candidates = candidates
            .iter()
            .map(|(id, pair)| (*id, pair.reference.as_slice()))
            .collect::<Vec<_>>();
        let target_candidates = candidates
            .iter()
            .map(|(id, pair)| (*id, pair.candidate.as_slice()))
            .collect::<Vec<_>>();
        let reference_ranking = rank(&query.reference, &reference_candidates)?;
        let candidate_ranking = rank(&query.candidate, &target_candidates)?;
        let ranking = verifier.ranking_report(&reference_ranking, &candidate_ranking);

        let passed = query_report.passed
            && candidate_reports.iter().all(|candidate| candidate.report.passed)
            && ranking.passed;
        info!(
            passed,
            candidates = candidate_reports.len(),
            "parity suite completed"
        );
        Ok(SuiteReport {
            query: query_report,
            candidates: candidate_reports,
            reference_ranking,
            candidate_ranking,
            ranking,
            passed,
        })
    }
}

fn with_context(error: ParityError, id: &str) -> ParityError {
    match error {
        ParityError::DimensionMismatch {
            context,
            expected,
            actual,
        } => ParityError::DimensionMismatch {
            context: format!("{id}: {context}"),
            expected,
            actual,
        },
        other => other,
    }
}
