//! Loader strategies and the traits metric code uses to run loaded models

use crate::config::ModelSpec;
use langcheck_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Strategy used to instantiate a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoaderFunc {
    /// Encoder with a sequence classification head, plus tokenizer
    #[serde(rename = "load_auto_model_for_text_classification")]
    AutoModelForTextClassification,

    /// Encoder-decoder model, plus tokenizer
    #[serde(rename = "load_auto_model_for_seq2seq")]
    AutoModelForSeq2Seq,

    /// Sentence embedding model
    #[serde(rename = "load_sentence_transformers")]
    SentenceTransformers,
}

impl LoaderFunc {
    /// All registered strategies
    pub const ALL: [LoaderFunc; 3] = [
        Self::AutoModelForTextClassification,
        Self::AutoModelForSeq2Seq,
        Self::SentenceTransformers,
    ];

    /// Name as used in configuration files
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AutoModelForTextClassification => "load_auto_model_for_text_classification",
            Self::AutoModelForSeq2Seq => "load_auto_model_for_seq2seq",
            Self::SentenceTransformers => "load_sentence_transformers",
        }
    }
}

impl fmt::Display for LoaderFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoaderFunc {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|loader| loader.as_str() == s)
            .ok_or_else(|| Error::UnsupportedLoader(s.to_string()))
    }
}

/// Instantiates models from validated specs
///
/// The manager dispatches every cache miss through this trait, so tests and
/// alternative runtimes can swap the heavyweight Candle backend out.
pub trait ModelLoader {
    /// What a successful load produces
    type Model;

    /// Load the model described by `spec` using `spec.loader`
    fn load(&self, spec: &ModelSpec) -> Result<Self::Model>;
}

/// Sequence classifier producing one logit per label
pub trait TextClassifier {
    /// Label names, indexed like the logits
    fn labels(&self) -> &[String];

    /// Raw logits for a single text
    fn logits(&self, text: &str) -> Result<Vec<f32>>;
}

/// Sentence embedding model
pub trait SentenceEmbedder {
    /// Pooled embedding for a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
