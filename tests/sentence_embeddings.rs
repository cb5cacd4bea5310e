use std::io::Write;
use std::rc::Rc;

use embedding_parity::parity::compare_vectors;
use embedding_parity::pipelines::sentence_embeddings::{
    l2_norm, normalize, pool, rank, AttentionMask, BertTokenEncoder, EncodedInput,
    HiddenStateMatrix, HiddenStateProducer, SentenceEmbeddingsConfig,
    SentenceEmbeddingsPipeline, TokenEncoder, TokenSequence,
};
use embedding_parity::ParityError;

/// Deterministic stand-in for a transformer: each row only depends on its token id.
struct LookupProducer {
    hidden_size: usize,
}

impl HiddenStateProducer for LookupProducer {
    fn forward(&self, input: &EncodedInput) -> Result<HiddenStateMatrix, ParityError> {
        let data = input
            .token_ids
            .ids()
            .iter()
            .flat_map(|&id| {
                (0..self.hidden_size).map(move |j| ((id as f32 + 1.0) * (j as f32 + 1.0)).cos())
            })
            .collect();
        HiddenStateMatrix::new(data, input.len(), self.hidden_size)
    }
}

/// Producer returning a fixed number of rows regardless of the input.
struct TruncatingProducer;

impl HiddenStateProducer for TruncatingProducer {
    fn forward(&self, _input: &EncodedInput) -> Result<HiddenStateMatrix, ParityError> {
        HiddenStateMatrix::new(vec![1.0; 6], 3, 2)
    }
}

/// Whitespace tokenizer with ids derived from the word length.
struct LengthEncoder;

impl TokenEncoder for LengthEncoder {
    fn encode(&self, text: &str, max_seq_length: usize) -> Result<EncodedInput, ParityError> {
        let mut ids = text
            .split_whitespace()
            .map(|word| word.len() as i64)
            .take(max_seq_length)
            .collect::<Vec<_>>();
        let real_tokens = ids.len();
        ids.resize(max_seq_length, 0);
        EncodedInput::from_ids_and_mask(
            TokenSequence::new(ids),
            AttentionMask::right_padded(real_tokens, max_seq_length),
        )
    }
}

fn write_vocab() -> anyhow::Result<tempfile::NamedTempFile> {
    let mut vocab = tempfile::NamedTempFile::new()?;
    for token in [
        "[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]", "hello", "world", "eating", "food",
    ] {
        writeln!(vocab, "{token}")?;
    }
    vocab.flush()?;
    Ok(vocab)
}

#[test]
fn pooling_scenario() -> anyhow::Result<()> {
    let hidden = HiddenStateMatrix::from_rows(vec![
        vec![1.0, 0.0],
        vec![0.0, 1.0],
        vec![5.0, 5.0],
        vec![9.0, 9.0],
    ])?;
    let mask = AttentionMask::new(vec![1, 1, 0, 0])?;

    let pooled = pool(&hidden, &mask)?;
    assert_eq!(pooled, vec![0.5, 0.5]);

    let normalized = normalize(&pooled);
    assert!((normalized[0] - 0.7071).abs() < 1e-4);
    assert!((normalized[1] - 0.7071).abs() < 1e-4);
    assert!((l2_norm(&normalized) - 1.0).abs() < 1e-5);
    Ok(())
}

#[test]
fn ranking_scenario() -> anyhow::Result<()> {
    let candidates = vec![
        ("a".to_string(), vec![0.0f32, 1.0]),
        ("b".to_string(), vec![1.0, 0.0]),
        ("c".to_string(), vec![0.7071, 0.7071]),
    ];
    let ranking = rank(&[1.0, 0.0], &candidates)?;

    let ids: Vec<&str> = ranking.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["b", "c", "a"]);
    assert!((ranking[0].score - 1.0).abs() < 1e-6);
    assert!((ranking[1].score - 0.7071).abs() < 1e-4);
    assert!(ranking[2].score.abs() < 1e-6);
    Ok(())
}

#[test]
fn pipeline_encodes_normalized_embeddings() -> anyhow::Result<()> {
    let pipeline = SentenceEmbeddingsPipeline::new(
        SentenceEmbeddingsConfig::new(8).with_hidden_size(16),
        LengthEncoder,
        LookupProducer { hidden_size: 16 },
    )?;

    let embeddings = pipeline.encode_batch(&["We ate hot dogs", "I woke up"])?;
    assert_eq!(embeddings.len(), 2);
    for embedding in &embeddings {
        assert_eq!(embedding.len(), 16);
        assert!((l2_norm(embedding) - 1.0).abs() < 1e-5);
    }
    // Same tokens, different padding length: padding must not change the embedding
    let short = SentenceEmbeddingsPipeline::new(
        SentenceEmbeddingsConfig::new(4),
        LengthEncoder,
        LookupProducer { hidden_size: 16 },
    )?;
    let report = compare_vectors(&embeddings[1], &short.encode("I woke up")?, 1e-6)?;
    assert!(report.passed, "{}", report);
    Ok(())
}

#[test]
fn pipeline_checks_model_output_shape() -> anyhow::Result<()> {
    let pipeline = SentenceEmbeddingsPipeline::new(
        SentenceEmbeddingsConfig::new(4),
        LengthEncoder,
        TruncatingProducer,
    )?;
    assert!(matches!(
        pipeline.encode("Eating food"),
        Err(ParityError::InputShapeMismatch {
            expected: 4,
            actual: 3,
            ..
        })
    ));

    let pipeline = SentenceEmbeddingsPipeline::new(
        SentenceEmbeddingsConfig::new(4).with_hidden_size(768),
        LengthEncoder,
        LookupProducer { hidden_size: 384 },
    )?;
    assert!(matches!(
        pipeline.encode("Eating food"),
        Err(ParityError::DimensionMismatch {
            expected: 768,
            actual: 384,
            ..
        })
    ));

    let wrong_length = EncodedInput::from_ids_and_mask(
        TokenSequence::new(vec![1, 2]),
        AttentionMask::right_padded(2, 2),
    )?;
    assert!(pipeline.encode_tokens(&wrong_length).is_err());
    Ok(())
}

#[test]
fn pipeline_requires_a_sequence_length() {
    let result = SentenceEmbeddingsPipeline::new(
        SentenceEmbeddingsConfig::new(0),
        LengthEncoder,
        LookupProducer { hidden_size: 4 },
    );
    assert!(matches!(
        result,
        Err(ParityError::InvalidConfigurationError(_))
    ));
}

#[test]
fn bert_encoder_pads_to_fixed_length() -> anyhow::Result<()> {
    let vocab = write_vocab()?;
    let encoder = BertTokenEncoder::from_file(vocab.path(), true, false)?;
    assert_eq!(encoder.pad_id(), 0);

    let encoded = encoder.encode("Hello world", 8)?;
    assert_eq!(encoded.token_ids.ids(), &[2, 5, 6, 3, 0, 0, 0, 0]);
    assert_eq!(encoded.attention_mask.values(), &[1, 1, 1, 1, 0, 0, 0, 0]);
    assert_eq!(encoded.token_type_ids, vec![0; 8]);
    assert_eq!(
        encoded.to_lines(),
        "2,5,6,3,0,0,0,0\n1,1,1,1,0,0,0,0\n0,0,0,0,0,0,0,0"
    );
    Ok(())
}

#[test]
fn bert_encoder_truncates_to_fixed_length() -> anyhow::Result<()> {
    let vocab = write_vocab()?;
    let encoder = BertTokenEncoder::from_file(vocab.path(), true, false)?;

    let encoded = encoder.encode("hello world", 3)?;
    assert_eq!(encoded.token_ids.ids(), &[2, 5, 3]);
    assert_eq!(encoded.attention_mask.real_tokens(), 3);

    let unknown = encoder.encode("goodbye", 4)?;
    assert_eq!(unknown.token_ids.ids(), &[2, 1, 3, 0]);

    assert!(encoder.encode("hello", 1).is_err());
    Ok(())
}

#[test]
fn bert_encoder_follows_config_casing() -> anyhow::Result<()> {
    let vocab = write_vocab()?;
    let lower_case = SentenceEmbeddingsConfig {
        do_lower_case: true,
        ..SentenceEmbeddingsConfig::new(5)
    };
    let cased = SentenceEmbeddingsConfig::new(5);

    let encoder = BertTokenEncoder::from_config(vocab.path(), &lower_case)?;
    assert_eq!(encoder.encode("HELLO World", 5)?.token_ids.ids(), &[2, 5, 6, 3, 0]);

    let encoder = BertTokenEncoder::from_config(vocab.path(), &cased)?;
    assert_eq!(encoder.encode("HELLO World", 5)?.token_ids.ids(), &[2, 1, 1, 3, 0]);
    Ok(())
}

#[test]
fn pipeline_encodes_batches_of_shared_strings() -> anyhow::Result<()> {
    let pipeline = SentenceEmbeddingsPipeline::new(
        SentenceEmbeddingsConfig::new(6),
        LengthEncoder,
        LookupProducer { hidden_size: 8 },
    )?;
    let inputs: Vec<Rc<str>> = vec![Rc::from("eating food"), Rc::from("flying kites")];

    let embeddings = pipeline.encode_batch(&inputs)?;
    assert_eq!(embeddings.len(), 2);
    assert_eq!(embeddings[0], pipeline.encode("eating food")?);
    Ok(())
}

#[test]
fn pooling_fans_out_across_threads() -> anyhow::Result<()> {
    let inputs = (0..8)
        .map(|seed| {
            let rows = (0..16)
                .map(|i| (0..32).map(|j| ((seed * 512 + i * 32 + j) as f32).sin()).collect())
                .collect::<Vec<Vec<f32>>>();
            HiddenStateMatrix::from_rows(rows)
                .map(|hidden| (hidden, AttentionMask::right_padded(seed + 1, 16)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let sequential = inputs
        .iter()
        .map(|(hidden, mask)| pool(hidden, mask).map(|pooled| normalize(&pooled)))
        .collect::<Result<Vec<_>, _>>()?;
    let parallel = std::thread::scope(|scope| {
        let handles = inputs
            .iter()
            .map(|(hidden, mask)| {
                scope.spawn(move || pool(hidden, mask).map(|pooled| normalize(&pooled)))
            })
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("pooling thread panicked"))
            .collect::<Result<Vec<_>, _>>()
    })?;

    assert_eq!(sequential, parallel);
    Ok(())
}
