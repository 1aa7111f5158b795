//! LangCheck Metrics
//!
//! Text quality metrics computed with managed models or an evaluator LLM.
//!
//! Model-backed metrics take any [`TextClassifier`](langcheck_models::TextClassifier)
//! or [`SentenceEmbedder`](langcheck_models::SentenceEmbedder); with the
//! `ml-models` feature the `*_with_manager` variants fetch the configured
//! model from a [`ModelManager`](langcheck_models::ModelManager).

pub mod classification;
pub mod eval_client;
pub mod pairwise;
pub mod similarity;

#[cfg(feature = "ml-models")]
pub mod managed;

pub use classification::{normalize_toxicity_label, sentiment, toxicity};
pub use eval_client::{EvalClient, PairwiseVerdict};
pub use pairwise::{pairwise_comparison, PairwiseRequest};
pub use similarity::{cosine_similarity, factual_consistency, semantic_similarity};

#[cfg(feature = "ml-models")]
pub use managed::{
    factual_consistency_with_manager, semantic_similarity_with_manager, sentiment_with_manager,
    toxicity_with_manager,
};
