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

//! Command-line parity checks between two embedding runtimes.
//!
//! Structured results (JSON reports, vectors, token lines) go to stdout; logs and
//! human-readable summaries go to stderr.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use embedding_parity::common::vector_io::{
    parse_int_list, read_hidden_states, read_vector, write_vector,
};
use embedding_parity::parity::{ParityConfig, ParitySuite, ParitySuiteConfig, ParityVerifier};
use embedding_parity::pipelines::sentence_embeddings::{
    ensure_non_degenerate, normalize, rank, AttentionMask, BertTokenEncoder, Pooling,
    PoolingConfig, SentenceEmbeddingsConfig, TokenEncoder,
};
use embedding_parity::Config;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "parity-check",
    about = "Pool, normalize, rank and compare sentence embeddings across runtimes"
)]
struct Args {
    /// Increase log verbosity (-v: debug, -vv: trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compare a candidate embedding with a reference embedding.
    Compare {
        /// Reference embedding file, `-` for stdin
        #[arg(long)]
        reference: PathBuf,
        /// Candidate embedding file, `-` for stdin
        #[arg(long)]
        candidate: PathBuf,
        /// Maximum absolute per-component deviation, overrides the config file
        #[arg(long)]
        tolerance: Option<f32>,
        /// JSON parity configuration
        #[arg(long)]
        config: Option<PathBuf>,
        /// Fail on all-zero embeddings
        #[arg(long, default_value_t = false)]
        strict: bool,
    },
    /// Rank candidate embeddings against a query embedding.
    Rank {
        /// Query embedding file
        #[arg(long)]
        query: PathBuf,
        /// Candidate as `ID=FILE`, repeatable
        #[arg(long = "candidate", value_parser = parse_candidate)]
        candidates: Vec<(String, PathBuf)>,
        /// Normalize every embedding before scoring
        #[arg(long, default_value_t = false)]
        normalize: bool,
    },
    /// Run a parity suite described by a JSON manifest.
    Suite {
        #[arg(long)]
        manifest: PathBuf,
    },
    /// Mean-pool a hidden-state matrix (one token row per line).
    Pool {
        /// Hidden-state file, `-` for stdin
        #[arg(long)]
        hidden_states: PathBuf,
        /// Attention mask as a comma-separated list, or a file containing one
        #[arg(long)]
        mask: String,
        /// Sentence-Transformers pooling configuration to check against
        #[arg(long)]
        pooling_config: Option<PathBuf>,
        /// Output the raw pooled vector instead of the normalized embedding
        #[arg(long, default_value_t = false)]
        no_normalize: bool,
        /// Fail on an all-padding mask
        #[arg(long, default_value_t = false)]
        strict: bool,
    },
    /// Tokenize a text to fixed-length ids, mask and token type ids.
    Tokenize {
        /// BERT vocabulary file
        #[arg(long)]
        vocab: PathBuf,
        /// Number of token positions after padding/truncation
        #[arg(long, required_unless_present = "config", conflicts_with = "config")]
        max_length: Option<usize>,
        #[arg(long, default_value_t = false, conflicts_with = "config")]
        lower_case: bool,
        #[arg(long, default_value_t = false, conflicts_with = "config")]
        strip_accents: bool,
        /// JSON sentence-embeddings configuration (sequence length, casing, accents)
        #[arg(long)]
        config: Option<PathBuf>,
        text: String,
    },
}

fn parse_candidate(value: &str) -> Result<(String, PathBuf), String> {
    match value.split_once('=') {
        Some((id, path)) if !id.is_empty() && !path.is_empty() => {
            Ok((id.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected ID=FILE, got `{value}`")),
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn open_input(path: &Path) -> Result<Box<dyn BufRead>> {
    if path == Path::new("-") {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(path).with_context(|| format!("could not open {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

fn load_vector(path: &Path) -> Result<Vec<f32>> {
    let vector = read_vector(open_input(path)?)
        .with_context(|| format!("could not read embedding from {}", path.display()))?;
    info!(path = %path.display(), dimension = vector.len(), "loaded embedding");
    Ok(vector)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer_pretty(&mut handle, value)?;
    writeln!(handle)?;
    Ok(())
}

fn exit_code(passed: bool) -> ExitCode {
    if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn compare(
    reference: &Path,
    candidate: &Path,
    tolerance: Option<f32>,
    config: Option<&Path>,
    strict: bool,
) -> Result<ExitCode> {
    if reference == Path::new("-") && candidate == Path::new("-") {
        bail!("only one of --reference and --candidate can read from stdin");
    }
    let mut parity_config = match config {
        Some(path) => ParityConfig::from_file(path)?,
        None => ParityConfig::default(),
    };
    if let Some(tolerance) = tolerance {
        parity_config = parity_config.with_tolerance(tolerance);
    }
    let verifier = ParityVerifier::new(parity_config)?;

    let reference = load_vector(reference)?;
    let candidate = load_vector(candidate)?;
    if strict {
        ensure_non_degenerate(&reference).context("reference embedding")?;
        ensure_non_degenerate(&candidate).context("candidate embedding")?;
    }

    let report = verifier.compare_vectors(&reference, &candidate)?;
    for warning in &report.warnings {
        warn!("{warning}");
    }
    eprintln!("{report}");
    print_json(&report)?;
    Ok(exit_code(report.passed))
}

fn rank_candidates(
    query: &Path,
    candidates: &[(String, PathBuf)],
    normalize_inputs: bool,
) -> Result<ExitCode> {
    let prepare = |vector: Vec<f32>| {
        if normalize_inputs {
            normalize(&vector)
        } else {
            vector
        }
    };
    let query = prepare(load_vector(query)?);
    let candidates = candidates
        .iter()
        .map(|(id, path)| load_vector(path).map(|vector| (id.as_str(), prepare(vector))))
        .collect::<Result<Vec<_>>>()?;
    let ranking = rank(&query, &candidates)?;
    for result in &ranking {
        eprintln!("  {:8.4}%  {}", result.score * 100.0, result.id);
    }
    print_json(&ranking)?;
    Ok(ExitCode::SUCCESS)
}

fn suite(manifest: &Path) -> Result<ExitCode> {
    let config = ParitySuiteConfig::from_file(manifest)?;
    let base_dir = manifest.parent().unwrap_or_else(|| Path::new("."));
    let verifier = ParityVerifier::new(config.parity.clone())?;
    let report = ParitySuite::from_config(&config, base_dir)?.run(&verifier)?;

    eprintln!("query: {}", report.query);
    for candidate in &report.candidates {
        eprintln!("{}: {}", candidate.id, candidate.report);
    }
    eprintln!("{}", report.ranking);
    print_json(&report)?;
    Ok(exit_code(report.passed))
}

fn load_mask(mask: &str) -> Result<AttentionMask> {
    let path = Path::new(mask);
    let values = if path.is_file() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("could not read mask from {}", path.display()))?;
        parse_int_list(&content)?
    } else {
        parse_int_list(mask)?
    };
    Ok(AttentionMask::try_from(values.as_slice())?)
}

fn pool(
    hidden_states: &Path,
    mask: &str,
    pooling_config: Option<&Path>,
    no_normalize: bool,
    strict: bool,
) -> Result<ExitCode> {
    let hidden = read_hidden_states(open_input(hidden_states)?)?;
    let mask = load_mask(mask)?;
    if strict && mask.is_all_padding() {
        bail!("attention mask has no real tokens");
    }
    let pooling_config = match pooling_config {
        Some(path) => PoolingConfig::from_file(path)?,
        None => PoolingConfig::default(),
    };
    let pooled = Pooling::new(pooling_config)?.forward(&hidden, &mask)?;
    info!(
        seq_len = hidden.seq_len(),
        hidden_size = hidden.hidden_size(),
        real_tokens = mask.real_tokens(),
        "pooled hidden states"
    );
    let output = if no_normalize {
        pooled
    } else {
        normalize(&pooled)
    };
    write_vector(io::stdout().lock(), &output)?;
    Ok(ExitCode::SUCCESS)
}

fn tokenize(
    vocab: &Path,
    max_length: Option<usize>,
    lower_case: bool,
    strip_accents: bool,
    config: Option<&Path>,
    text: &str,
) -> Result<ExitCode> {
    let config = match (config, max_length) {
        (Some(path), _) => SentenceEmbeddingsConfig::from_file(path)?,
        (None, Some(max_length)) => SentenceEmbeddingsConfig {
            do_lower_case: lower_case,
            strip_accents,
            ..SentenceEmbeddingsConfig::new(max_length)
        },
        (None, None) => bail!("either --max-length or --config is required"),
    }
    .validate()?;
    let encoder = BertTokenEncoder::from_config(vocab, &config)?;
    let encoded = encoder.encode(text, config.max_seq_length)?;
    println!("{}", encoded.to_lines());
    Ok(ExitCode::SUCCESS)
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Command::Compare {
            reference,
            candidate,
            tolerance,
            config,
            strict,
        } => compare(&reference, &candidate, tolerance, config.as_deref(), strict),
        Command::Rank {
            query,
            candidates,
            normalize,
        } => rank_candidates(&query, &candidates, normalize),
        Command::Suite { manifest } => suite(&manifest),
        Command::Pool {
            hidden_states,
            mask,
            pooling_config,
            no_normalize,
            strict,
        } => pool(
            &hidden_states,
            &mask,
            pooling_config.as_deref(),
            no_normalize,
            strict,
        ),
        Command::Tokenize {
            vocab,
            max_length,
            lower_case,
            strip_accents,
            config,
            text,
        } => tokenize(
            &vocab,
            max_length,
            lower_case,
            strip_accents,
            config.as_deref(),
            &text,
        ),
    }
}
