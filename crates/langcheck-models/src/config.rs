//! Metric model configuration: per-language, per-metric model settings
//!
//! The configuration file maps `language → metric → setting`:
//!
//! ```yaml
//! zh:
//!   toxicity:
//!     model_name: alibaba-pai/pai-bert-base-zh-llm-risk-detection
//!     loader_func: load_auto_model_for_text_classification
//!     revision: main
//! ```

use crate::loader::LoaderFunc;
use langcheck_core::{Error, Language, Metric, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Bundled default configuration
pub const DEFAULT_METRIC_CONFIG: &str = include_str!("../config/metric_config.yaml");

/// Model setting for one `(language, metric)` pair, as written in configuration
///
/// Required attributes are optional here so that a missing attribute surfaces
/// as a validation error with context rather than a parse error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelSetting {
    /// Model identifier on the model hub
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,

    /// Loader strategy name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loader_func: Option<String>,

    /// Tokenizer identifier, when it differs from the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokenizer_name: Option<String>,

    /// Pinned model revision
    #[serde(default, alias = "model_revision", skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

impl ModelSetting {
    /// Create a setting with the two required attributes
    pub fn new(model_name: impl Into<String>, loader_func: impl Into<String>) -> Self {
        Self {
            model_name: Some(model_name.into()),
            loader_func: Some(loader_func.into()),
            ..Default::default()
        }
    }

    /// Set the tokenizer name
    pub fn with_tokenizer(mut self, tokenizer_name: impl Into<String>) -> Self {
        self.tokenizer_name = Some(tokenizer_name.into());
        self
    }

    /// Pin a model revision
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    /// Check required attributes and the loader name
    pub fn resolve(&self, language: Language, metric: Metric) -> Result<ModelSpec> {
        let model_name = self
            .model_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| missing(language, metric, "model_name"))?;

        let loader_func = self
            .loader_func
            .as_deref()
            .ok_or_else(|| missing(language, metric, "loader_func"))?;

        Ok(ModelSpec {
            loader: loader_func.parse()?,
            model_name: model_name.to_string(),
            tokenizer_name: self.tokenizer_name.clone().filter(|t| !t.is_empty()),
            revision: self.revision.clone().filter(|r| !r.is_empty()),
        })
    }
}

fn missing(language: Language, metric: Metric, field: &'static str) -> Error {
    Error::MissingField {
        language: language.to_string(),
        metric: metric.to_string(),
        field,
    }
}

/// Validated model setting, ready to hand to a loader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub loader: LoaderFunc,
    pub model_name: String,
    pub tokenizer_name: Option<String>,
    pub revision: Option<String>,
}

impl ModelSpec {
    /// Tokenizer to load: the explicit tokenizer or the model itself
    pub fn tokenizer(&self) -> &str {
        self.tokenizer_name.as_deref().unwrap_or(&self.model_name)
    }

    /// Revision to download, defaulting to the hub's main branch
    pub fn revision_or_main(&self) -> &str {
        self.revision.as_deref().unwrap_or("main")
    }
}

/// All model settings, keyed by language then metric
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricConfig {
    languages: BTreeMap<Language, BTreeMap<Metric, ModelSetting>>,
}

impl MetricConfig {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the setting for a pair
    pub fn get(&self, language: Language, metric: Metric) -> Option<&ModelSetting> {
        self.languages.get(&language)?.get(&metric)
    }

    /// Settings configured for a language
    pub fn language(&self, language: Language) -> Option<&BTreeMap<Metric, ModelSetting>> {
        self.languages.get(&language)
    }

    /// Insert or replace the setting for a pair
    pub fn insert(&mut self, language: Language, metric: Metric, setting: ModelSetting) {
        self.languages
            .entry(language)
            .or_default()
            .insert(metric, setting);
    }

    /// Iterate over all entries in language, then metric order
    pub fn entries(&self) -> impl Iterator<Item = (Language, Metric, &ModelSetting)> + '_ {
        self.languages.iter().flat_map(|(lang, metrics)| {
            metrics
                .iter()
                .map(move |(metric, setting)| (*lang, *metric, setting))
        })
    }

    /// Configured languages
    pub fn languages(&self) -> Vec<Language> {
        self.languages.keys().copied().collect()
    }

    /// Total number of entries
    pub fn len(&self) -> usize {
        self.languages.values().map(BTreeMap::len).sum()
    }

    /// Whether there are no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialize to the configuration file format
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Parse a configuration document into entries, sorted by language then metric name
///
/// Keys are parsed as strings first so that an unknown language or metric
/// is reported with the matching error rather than a generic parse error.
pub fn parse_entries(yaml: &str) -> Result<Vec<(Language, Metric, ModelSetting)>> {
    let raw: Option<BTreeMap<String, Option<BTreeMap<String, ModelSetting>>>> =
        serde_yaml::from_str(yaml)?;

    let mut entries = Vec::new();
    for (lang, metrics) in raw.unwrap_or_default() {
        let language: Language = lang.parse()?;
        for (metric_name, setting) in metrics.unwrap_or_default() {
            let metric = Metric::parse_for(language, &metric_name)?;
            entries.push((language, metric, setting));
        }
    }

    Ok(entries)
}

/// Read and parse a configuration file
pub fn read_entries(path: impl AsRef<Path>) -> Result<Vec<(Language, Metric, ModelSetting)>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| {
        Error::config(format!(
            "Failed to read metric config {}: {}",
            path.display(),
            e
        ))
    })?;
    parse_entries(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_config() {
        let entries = parse_entries(DEFAULT_METRIC_CONFIG).unwrap();
        assert_eq!(entries.len(), 4);
        assert!(entries.iter().all(|(lang, _, _)| *lang == Language::Zh));

        for (lang, metric, setting) in &entries {
            setting.resolve(*lang, *metric).unwrap();
        }
    }

    #[test]
    fn test_model_revision_alias() {
        let yaml = r#"
zh:
  sentiment:
    model_name: IDEA-CCNL/Erlangshen-Roberta-110M-Sentiment
    loader_func: load_auto_model_for_text_classification
    model_revision: v1.0
"#;
        let entries = parse_entries(yaml).unwrap();
        assert_eq!(entries[0].2.revision.as_deref(), Some("v1.0"));
    }

    #[test]
    fn test_unknown_keys() {
        let err = parse_entries("fr:\n  toxicity:\n    model_name: x\n").unwrap_err();
        assert!(matches!(err, Error::UnsupportedLanguage(_)));

        let err = parse_entries("zh:\n  fluency:\n    model_name: x\n").unwrap_err();
        assert!(matches!(err, Error::UnsupportedMetric { .. }));

        let err = parse_entries("zh:\n  toxicity:\n    model: x\n").unwrap_err();
        assert!(matches!(err, Error::Yaml(_)));
    }

    #[test]
    fn test_resolve_missing_fields() {
        let setting = ModelSetting {
            loader_func: Some("load_sentence_transformers".to_string()),
            ..Default::default()
        };
        let err = setting
            .resolve(Language::Zh, Metric::SemanticSimilarity)
            .unwrap_err();
        assert!(matches!(err, Error::MissingField { field: "model_name", .. }));

        let setting = ModelSetting {
            model_name: Some("BAAI/bge-base-zh-v1.5".to_string()),
            ..Default::default()
        };
        let err = setting
            .resolve(Language::Zh, Metric::SemanticSimilarity)
            .unwrap_err();
        assert!(matches!(err, Error::MissingField { field: "loader_func", .. }));
    }

    #[test]
    fn test_resolve_spec_defaults() {
        let spec = ModelSetting::new("BAAI/bge-base-zh-v1.5", "load_sentence_transformers")
            .resolve(Language::Zh, Metric::SemanticSimilarity)
            .unwrap();

        assert_eq!(spec.loader, LoaderFunc::SentenceTransformers);
        assert_eq!(spec.tokenizer(), "BAAI/bge-base-zh-v1.5");
        assert_eq!(spec.revision_or_main(), "main");
    }

    #[test]
    fn test_metric_config_roundtrip_order() {
        let mut config = MetricConfig::new();
        config.insert(
            Language::Zh,
            Metric::Toxicity,
            ModelSetting::new("a/toxic", "load_auto_model_for_text_classification"),
        );
        config.insert(
            Language::En,
            Metric::Sentiment,
            ModelSetting::new("b/sentiment", "load_auto_model_for_text_classification")
                .with_revision("abc123"),
        );

        let langs: Vec<_> = config.entries().map(|(l, _, _)| l).collect();
        assert_eq!(langs, vec![Language::En, Language::Zh]);

        let yaml = config.to_yaml().unwrap();
        let parsed: MetricConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }
}
