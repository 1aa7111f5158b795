//! Core types for LangCheck

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Language a metric is evaluated in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Ja,
    De,
    Zh,
}

impl Language {
    /// All languages known to LangCheck
    pub const ALL: [Language; 4] = [Self::En, Self::Ja, Self::De, Self::Zh];

    /// ISO 639-1 code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ja => "ja",
            Self::De => "de",
            Self::Zh => "zh",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|lang| lang.as_str() == s)
            .ok_or_else(|| Error::UnsupportedLanguage(s.to_string()))
    }
}

/// Model-backed text-quality metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    SemanticSimilarity,
    Sentiment,
    Toxicity,
    FactualConsistency,
}

impl Metric {
    /// All model-backed metrics
    pub const ALL: [Metric; 4] = [
        Self::SemanticSimilarity,
        Self::Sentiment,
        Self::Toxicity,
        Self::FactualConsistency,
    ];

    /// Name as used in configuration files
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SemanticSimilarity => "semantic_similarity",
            Self::Sentiment => "sentiment",
            Self::Toxicity => "toxicity",
            Self::FactualConsistency => "factual_consistency",
        }
    }

    /// Parse a metric name in the context of a language (for error reporting)
    pub fn parse_for(language: Language, s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|metric| metric.as_str() == s)
            .ok_or_else(|| Error::unsupported_metric(language, s))
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|metric| metric.as_str() == s)
            .ok_or_else(|| Error::unsupported_metric("any", s))
    }
}

/// Per-instance scores produced by a metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    /// Metric name (e.g. "toxicity", "pairwise_comparison")
    pub metric_name: String,

    /// Language the metric was computed in
    pub language: Language,

    /// One value per input; `None` when no consistent score exists
    pub metric_values: Vec<Option<f64>>,
}

impl MetricValue {
    /// Create a new metric value
    pub fn new(
        metric_name: impl Into<String>,
        language: Language,
        metric_values: Vec<Option<f64>>,
    ) -> Self {
        Self {
            metric_name: metric_name.into(),
            language,
            metric_values,
        }
    }

    /// Mean over the computed values
    pub fn mean(&self) -> Option<f64> {
        let computed: Vec<f64> = self.metric_values.iter().flatten().copied().collect();
        if computed.is_empty() {
            return None;
        }
        Some(computed.iter().sum::<f64>() / computed.len() as f64)
    }

    /// Number of inputs
    pub fn len(&self) -> usize {
        self.metric_values.len()
    }

    /// Whether there are no inputs
    pub fn is_empty(&self) -> bool {
        self.metric_values.is_empty()
    }

    /// Whether every input produced a value
    pub fn all_computed(&self) -> bool {
        self.metric_values.iter().all(Option::is_some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_parse() {
        assert_eq!("zh".parse::<Language>().unwrap(), Language::Zh);
        assert_eq!(Language::Ja.to_string(), "ja");

        let err = "fr".parse::<Language>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedLanguage(ref l) if l == "fr"));
    }

    #[test]
    fn test_metric_parse() {
        assert_eq!(
            Metric::parse_for(Language::Zh, "factual_consistency").unwrap(),
            Metric::FactualConsistency
        );

        let err = Metric::parse_for(Language::Zh, "fluency").unwrap_err();
        assert!(err.is_lookup());
        assert!(err.to_string().contains("fluency"));
    }

    #[test]
    fn test_language_serde_key() {
        let yaml = "zh: 1\nen: 2\n";
        let map: std::collections::BTreeMap<Language, u32> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(map.get(&Language::Zh), Some(&1));
        assert_eq!(map.keys().next(), Some(&Language::En));
    }

    #[test]
    fn test_metric_value_mean_skips_missing() {
        let value = MetricValue::new("toxicity", Language::En, vec![Some(0.2), None, Some(0.4)]);
        assert!((value.mean().unwrap() - 0.3).abs() < 1e-9);
        assert!(!value.all_computed());
        assert_eq!(value.len(), 3);

        let empty = MetricValue::new("toxicity", Language::En, vec![None]);
        assert_eq!(empty.mean(), None);
    }
}
