//! Metrics computed with the model configured for their language

use crate::classification;
use crate::similarity;
use langcheck_core::{Error, Language, Metric, MetricValue, Result};
use langcheck_models::{CandleModelLoader, HubClient, ModelManager};
use tracing::debug;

type CandleManager<H> = ModelManager<CandleModelLoader, H>;

/// Toxicity using the configured toxicity classifier for `language`
pub fn toxicity_with_manager<H, S>(
    manager: &mut CandleManager<H>,
    generated_outputs: &[S],
    language: Language,
) -> Result<MetricValue>
where
    H: HubClient,
    S: AsRef<str>,
{
    let model = manager.fetch_model(language, Metric::Toxicity)?;
    let classifier = model
        .as_classifier()
        .ok_or_else(|| wrong_kind(language, Metric::Toxicity, model.name()))?;
    classification::toxicity(classifier, generated_outputs, language)
}

/// Sentiment using the configured sentiment classifier for `language`
pub fn sentiment_with_manager<H, S>(
    manager: &mut CandleManager<H>,
    generated_outputs: &[S],
    language: Language,
) -> Result<MetricValue>
where
    H: HubClient,
    S: AsRef<str>,
{
    let model = manager.fetch_model(language, Metric::Sentiment)?;
    let classifier = model
        .as_classifier()
        .ok_or_else(|| wrong_kind(language, Metric::Sentiment, model.name()))?;
    classification::sentiment(classifier, generated_outputs, language)
}

/// Semantic similarity using the configured embedding model for `language`
pub fn semantic_similarity_with_manager<H, S, R>(
    manager: &mut CandleManager<H>,
    generated_outputs: &[S],
    reference_outputs: &[R],
    language: Language,
) -> Result<MetricValue>
where
    H: HubClient,
    S: AsRef<str>,
    R: AsRef<str>,
{
    let model = manager.fetch_model(language, Metric::SemanticSimilarity)?;
    let embedder = model
        .as_embedder()
        .ok_or_else(|| wrong_kind(language, Metric::SemanticSimilarity, model.name()))?;
    similarity::semantic_similarity(embedder, generated_outputs, reference_outputs, language)
}

/// Factual consistency using the configured seq2seq model for `language`
pub fn factual_consistency_with_manager<H, S, R>(
    manager: &mut CandleManager<H>,
    generated_outputs: &[S],
    sources: &[R],
    language: Language,
) -> Result<MetricValue>
where
    H: HubClient,
    S: AsRef<str>,
    R: AsRef<str>,
{
    let model = manager.fetch_model(language, Metric::FactualConsistency)?;
    let encoder = model
        .as_seq2seq()
        .ok_or_else(|| wrong_kind(language, Metric::FactualConsistency, model.name()))?;
    debug!(
        "Scoring factual consistency with {} ({})",
        model.name(),
        encoder.architecture()
    );
    similarity::factual_consistency(encoder, generated_outputs, sources, language)
}

fn wrong_kind(language: Language, metric: Metric, model: &str) -> Error {
    Error::model(format!(
        "Model '{}' configured for {} {} cannot compute this metric",
        model, language, metric
    ))
}
