//! # Cross-runtime parity verification
//!
//! Two runtimes (for example a reference numeric pipeline and an embedded/mobile runtime)
//! compute embeddings for the same inputs. This module turns "do they agree?" into an
//! automatable check with quantified deviations:
//!
//! - [`compare_vectors`] / [`ParityVerifier::compare_vectors`]: per-component deviation and
//!   cosine similarity against a tolerance, producing a [`ParityReport`]
//! - [`compare_rankings`] / [`ParityVerifier::ranking_report`]: candidate order agreement,
//!   producing a [`RankingReport`]
//! - [`ParitySuite`]: a query and named candidates embedded by both runtimes, checked
//!   end to end
//!
//! ```
//! use embedding_parity::parity::{ParityConfig, ParityVerifier};
//!
//! # fn main() -> Result<(), embedding_parity::ParityError> {
//! let verifier = ParityVerifier::new(ParityConfig::default().with_tolerance(1e-4))?;
//! let report = verifier.compare_vectors(&[0.6, 0.8], &[0.6, 0.8000001])?;
//! assert!(report.passed);
//! # Ok(())
//! # }
//! ```

mod config;
mod report;
mod suite;
mod verifier;

pub use config::{
    EmbeddingSourcesConfig, ParityConfig, ParitySuiteConfig, SuiteCandidateConfig,
    DEFAULT_MAX_REPORTED_DIVERGENCES, DEFAULT_SCORE_TOLERANCE, DEFAULT_TOLERANCE,
};
pub use report::{ComponentDivergence, ParityReport, ParityWarning, RankingReport, Side};
pub use suite::{CandidateReport, EmbeddingPair, ParitySuite, SuiteReport};
pub use verifier::{compare_rankings, compare_vectors, ParityVerifier};
