//! Model configuration and lifecycle management
//!
//! `ModelManager` maps `(language, metric)` pairs to model settings, checks
//! every change against the model hub before committing it, and memoizes the
//! loaded model per pair until the configuration changes again.

use crate::config::{self, MetricConfig, ModelSetting, ModelSpec, DEFAULT_METRIC_CONFIG};
use crate::hub::HubClient;
use crate::loader::ModelLoader;
use langcheck_core::{Error, Language, Metric, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Counter of `fetch_model` calls served from the cache
pub const CACHE_HITS_COUNTER: &str = "langcheck_model_cache_hits_total";
/// Counter of models loaded by the loader
pub const MODEL_LOADS_COUNTER: &str = "langcheck_model_loads_total";
/// Counter of configuration changes rolled back after failing validation
pub const CONFIG_ROLLBACKS_COUNTER: &str = "langcheck_config_rollbacks_total";

/// Entries a validation pass covers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationScope {
    /// Only this language, or all when `None`
    pub language: Option<Language>,
    /// Only this metric, or all when `None`
    pub metric: Option<Metric>,
}

impl ValidationScope {
    /// Every entry
    pub fn all() -> Self {
        Self::default()
    }

    /// A single `(language, metric)` entry
    pub fn only(language: Language, metric: Metric) -> Self {
        Self {
            language: Some(language),
            metric: Some(metric),
        }
    }

    fn matches(&self, language: Language, metric: Metric) -> bool {
        self.language.map_or(true, |l| l == language) && self.metric.map_or(true, |m| m == metric)
    }
}

/// Validate configuration entries within `scope`
///
/// Each entry must name a model and a registered loader, and the model (at its
/// pinned revision, if any) must exist on the hub.
pub fn validate_config<H: HubClient + ?Sized>(
    config: &MetricConfig,
    hub: &H,
    scope: ValidationScope,
) -> Result<()> {
    for (language, metric, setting) in config.entries() {
        if !scope.matches(language, metric) {
            continue;
        }

        let spec = setting.resolve(language, metric)?;
        if !hub.model_exists(&spec.model_name, spec.revision.as_deref())? {
            return Err(Error::ModelUnavailable {
                model: spec.model_name,
                revision: spec.revision,
            });
        }
    }

    Ok(())
}

/// Registry of metric models with validated mutation and memoized loading
///
/// Single-threaded by design: mutation and fetching take `&mut self`.
pub struct ModelManager<L: ModelLoader, H: HubClient> {
    config: MetricConfig,
    cache: HashMap<(Language, Metric), Arc<L::Model>>,
    hub: H,
    loader: L,
}

impl<L: ModelLoader, H: HubClient> ModelManager<L, H> {
    /// Create a manager with no configuration
    pub fn new(hub: H, loader: L) -> Self {
        Self {
            config: MetricConfig::new(),
            cache: HashMap::new(),
            hub,
            loader,
        }
    }

    /// Create a manager loaded with the bundled default configuration
    pub fn with_default_config(hub: H, loader: L) -> Result<Self> {
        let mut manager = Self::new(hub, loader);
        manager.load_config_str(DEFAULT_METRIC_CONFIG)?;
        Ok(manager)
    }

    /// Apply every entry of a configuration document
    ///
    /// Entries go through [`set_model_for_metric`](Self::set_model_for_metric)
    /// one by one; if any fails, the configuration from before the call is
    /// restored.
    pub fn load_config_str(&mut self, yaml: &str) -> Result<()> {
        let entries = config::parse_entries(yaml)?;
        self.apply_entries(entries)
    }

    /// Apply every entry of a configuration file
    pub fn load_config_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let entries = config::read_entries(path)?;
        self.apply_entries(entries)?;
        info!("Loaded metric config from {}", path.display());
        Ok(())
    }

    fn apply_entries(&mut self, entries: Vec<(Language, Metric, ModelSetting)>) -> Result<()> {
        let snapshot = self.config.clone();
        let count = entries.len();

        for (language, metric, setting) in entries {
            if let Err(e) = self.set_model_for_metric(language, metric, setting) {
                self.config = snapshot;
                return Err(e);
            }
        }

        info!("Configuration loaded with {} model settings", count);
        Ok(())
    }

    /// Set the model for a metric in a language
    ///
    /// The entry is applied, then validated against the hub. On success the
    /// model cache is cleared so the next fetch loads the new model; on any
    /// failure the configuration is restored to its previous state and the
    /// error is returned.
    pub fn set_model_for_metric(
        &mut self,
        language: Language,
        metric: Metric,
        setting: ModelSetting,
    ) -> Result<()> {
        let snapshot = self.config.clone();
        self.config.insert(language, metric, setting);

        match validate_config(&self.config, &self.hub, ValidationScope::only(language, metric)) {
            Ok(()) => {
                self.cache.clear();
                info!(
                    "Configured {} {} -> {}",
                    language,
                    metric,
                    self.config
                        .get(language, metric)
                        .and_then(|s| s.model_name.as_deref())
                        .unwrap_or_default()
                );
                Ok(())
            }
            Err(e) => {
                self.config = snapshot;
                warn!(
                    "Rolled back configuration for {} {}: {}",
                    language, metric, e
                );
                metrics::counter!(
                    CONFIG_ROLLBACKS_COUNTER,
                    "language" => language.as_str(),
                    "metric" => metric.as_str()
                )
                .increment(1);
                Err(e)
            }
        }
    }

    /// Validate the current configuration within `scope`
    pub fn validate(&self, scope: ValidationScope) -> Result<()> {
        validate_config(&self.config, &self.hub, scope)
    }

    /// Resolved settings for a pair
    pub fn model_spec(&self, language: Language, metric: Metric) -> Result<ModelSpec> {
        let metrics = self
            .config
            .language(language)
            .ok_or_else(|| Error::UnsupportedLanguage(language.to_string()))?;

        let setting = metrics
            .get(&metric)
            .ok_or_else(|| Error::unsupported_metric(language, metric))?;

        setting.resolve(language, metric)
    }

    /// Return the model for a metric in a language, loading it on first use
    ///
    /// Repeated calls without an intervening configuration change return the
    /// same instance.
    pub fn fetch_model(&mut self, language: Language, metric: Metric) -> Result<Arc<L::Model>> {
        if let Some(model) = self.cache.get(&(language, metric)) {
            debug!("Model cache hit for {} {}", language, metric);
            metrics::counter!(
                CACHE_HITS_COUNTER,
                "language" => language.as_str(),
                "metric" => metric.as_str()
            )
            .increment(1);
            return Ok(Arc::clone(model));
        }

        let spec = self.model_spec(language, metric)?;
        info!(
            "Loading {} model '{}' for {} via {}",
            metric, spec.model_name, language, spec.loader
        );

        let model = Arc::new(self.loader.load(&spec)?);
        metrics::counter!(
            MODEL_LOADS_COUNTER,
            "language" => language.as_str(),
            "metric" => metric.as_str()
        )
        .increment(1);

        self.cache.insert((language, metric), Arc::clone(&model));
        Ok(model)
    }

    /// Whether a loaded model is cached for the pair
    pub fn is_cached(&self, language: Language, metric: Metric) -> bool {
        self.cache.contains_key(&(language, metric))
    }

    /// Drop every cached model
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Current configuration
    pub fn config(&self) -> &MetricConfig {
        &self.config
    }

    /// Hub client in use
    pub fn hub(&self) -> &H {
        &self.hub
    }

    /// Model loader in use
    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Rows describing the models in use, optionally filtered
    pub fn current_models(&self, language: Option<Language>, metric: Option<Metric>) -> Vec<ModelRow> {
        let scope = ValidationScope { language, metric };
        self.config
            .entries()
            .filter(|(lang, m, _)| scope.matches(*lang, *m))
            .map(|(lang, m, setting)| ModelRow {
                language: lang,
                metric: m,
                loader: setting.loader_func.clone().unwrap_or_default(),
                model_name: setting.model_name.clone().unwrap_or_default(),
                tokenizer_name: setting.tokenizer_name.clone(),
                revision: setting.revision.clone(),
            })
            .collect()
    }

    /// Render the models in use as a GitHub-flavored markdown table
    pub fn list_current_model_in_use(
        &self,
        language: Option<Language>,
        metric: Option<Metric>,
    ) -> String {
        render_table(&self.current_models(language, metric))
    }
}

#[cfg(feature = "ml-models")]
impl ModelManager<crate::candle_loader::CandleModelLoader, crate::hub::HuggingFaceHub> {
    /// Default manager: Hugging Face hub from the environment, Candle loader,
    /// bundled configuration
    pub fn from_env() -> Result<Self> {
        Self::with_default_config(
            crate::hub::HuggingFaceHub::from_env()?,
            crate::candle_loader::CandleModelLoader::new(),
        )
    }
}

/// One configured model, as listed by [`ModelManager::current_models`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRow {
    pub language: Language,
    pub metric: Metric,
    pub loader: String,
    pub model_name: String,
    pub tokenizer_name: Option<String>,
    pub revision: Option<String>,
}

const TABLE_HEADERS: [&str; 6] = [
    "language",
    "metric_name",
    "loader",
    "model_name",
    "tokenizer_name",
    "revision",
];

/// Render rows as a GitHub-flavored markdown table
pub fn render_table(rows: &[ModelRow]) -> String {
    let cells: Vec<[String; 6]> = rows
        .iter()
        .map(|row| {
            [
                row.language.to_string(),
                row.metric.to_string(),
                row.loader.clone(),
                row.model_name.clone(),
                row.tokenizer_name.clone().unwrap_or_default(),
                row.revision.clone().unwrap_or_default(),
            ]
        })
        .collect();

    let mut widths = TABLE_HEADERS.map(|h| h.chars().count());
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let format_row = |values: &[&str]| {
        let padded: Vec<String> = values
            .iter()
            .zip(widths.iter())
            .map(|(value, width)| format!(" {:<width$} ", value, width = *width))
            .collect();
        format!("|{}|", padded.join("|"))
    };

    let mut lines = Vec::with_capacity(cells.len() + 2);
    lines.push(format_row(&TABLE_HEADERS));
    lines.push(format!(
        "|{}|",
        widths
            .iter()
            .map(|w| "-".repeat(w + 2))
            .collect::<Vec<_>>()
            .join("|")
    ));
    for row in &cells {
        let values: Vec<&str> = row.iter().map(String::as_str).collect();
        lines.push(format_row(&values));
    }

    lines.join("\n")
}
