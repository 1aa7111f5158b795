//! Embedding-based metrics: semantic similarity and factual consistency

use langcheck_core::{Error, Language, MetricValue, Result};
use langcheck_models::SentenceEmbedder;

/// Cosine similarity between each output and its reference, in `[-1, 1]`
pub fn semantic_similarity<E, S, R>(
    embedder: &E,
    generated_outputs: &[S],
    reference_outputs: &[R],
    language: Language,
) -> Result<MetricValue>
where
    E: SentenceEmbedder + ?Sized,
    S: AsRef<str>,
    R: AsRef<str>,
{
    if generated_outputs.len() != reference_outputs.len() {
        return Err(Error::invalid_input(format!(
            "{} generated outputs but {} reference outputs",
            generated_outputs.len(),
            reference_outputs.len()
        )));
    }

    let values = generated_outputs
        .iter()
        .zip(reference_outputs)
        .map(|(output, reference)| {
            let a = embedder.embed(output.as_ref())?;
            let b = embedder.embed(reference.as_ref())?;
            Ok(cosine_similarity(&a, &b))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(MetricValue::new("semantic_similarity", language, values))
}

/// Consistency of each output with its source, in `[0, 1]`
///
/// Scores the cosine similarity between the encoder representations of the
/// source and the output, clamped at 0. An output unrelated to its source
/// scores 0; a restatement of the source scores close to 1.
pub fn factual_consistency<E, S, R>(
    encoder: &E,
    generated_outputs: &[S],
    sources: &[R],
    language: Language,
) -> Result<MetricValue>
where
    E: SentenceEmbedder + ?Sized,
    S: AsRef<str>,
    R: AsRef<str>,
{
    if generated_outputs.len() != sources.len() {
        return Err(Error::invalid_input(format!(
            "{} generated outputs but {} sources",
            generated_outputs.len(),
            sources.len()
        )));
    }

    let values = generated_outputs
        .iter()
        .zip(sources)
        .map(|(output, source)| {
            let output = encoder.embed(output.as_ref())?;
            let source = encoder.embed(source.as_ref())?;
            Ok(cosine_similarity(&source, &output).map(|score| score.clamp(0.0, 1.0)))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(MetricValue::new("factual_consistency", language, values))
}

/// Cosine similarity, `None` for mismatched or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let (dot, norm_a, norm_b) = a.iter().zip(b).fold((0.0f64, 0.0f64, 0.0f64), |acc, (&x, &y)| {
        let (x, y) = (x as f64, y as f64);
        (acc.0 + x * y, acc.1 + x * x, acc.2 + y * y)
    });

    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Embeds text as (length, count of 'a')
    struct CharEmbedder;

    impl SentenceEmbedder for CharEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let len = text.chars().count() as f32;
            let a = text.chars().filter(|c| *c == 'a').count() as f32;
            Ok(vec![len, a])
        }
    }

    #[test]
    fn test_identical_texts() {
        let value =
            semantic_similarity(&CharEmbedder, &["banana"], &["banana"], Language::En).unwrap();
        assert!((value.metric_values[0].unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_orthogonal_and_empty() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), Some(0.0));
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[0.0, 1.0]), None);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), None);

        let value = semantic_similarity(&CharEmbedder, &[""], &["abc"], Language::En).unwrap();
        assert_eq!(value.metric_values, vec![None]);
    }

    /// Embeds text as signed counts of 'a' and 'b'
    struct SignedEmbedder;

    impl SentenceEmbedder for SignedEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let a = text.chars().filter(|c| *c == 'a').count() as f32;
            let b = text.chars().filter(|c| *c == 'b').count() as f32;
            Ok(vec![a - b])
        }
    }

    #[test]
    fn test_factual_consistency_is_clamped() {
        let value = factual_consistency(
            &SignedEmbedder,
            &["aa", "bb", "xyz"],
            &["a", "a", "a"],
            Language::Zh,
        )
        .unwrap();

        assert_eq!(value.metric_name, "factual_consistency");
        assert_eq!(value.metric_values, vec![Some(1.0), Some(0.0), None]);
    }

    #[test]
    fn test_factual_consistency_length_mismatch() {
        let err = factual_consistency(&CharEmbedder, &["a"], &["a", "b"], Language::En).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_length_mismatch() {
        let err =
            semantic_similarity(&CharEmbedder, &["a", "b"], &["a"], Language::Ja).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
