//! LangCheck Models
//!
//! Model configuration and lifecycle management for model-backed metrics.
//!
//! - [`config`]: the `language → metric → setting` configuration format
//! - [`hub`]: model/revision availability checks against the model hub
//! - [`loader`]: the three loader strategies and the model traits metrics use
//! - [`manager`]: `ModelManager`, which validates configuration changes with
//!   rollback and caches loaded models
//! - `candle_loader` (feature `ml-models`): Candle implementation of the loaders

pub mod config;
pub mod hub;
pub mod loader;
pub mod manager;

#[cfg(feature = "ml-models")]
pub mod candle_loader;

pub use config::{MetricConfig, ModelSetting, ModelSpec, DEFAULT_METRIC_CONFIG};
pub use hub::{HubClient, HubSettings, HuggingFaceHub};
pub use loader::{LoaderFunc, ModelLoader, SentenceEmbedder, TextClassifier};
pub use manager::{
    validate_config, ModelManager, ModelRow, ValidationScope, CACHE_HITS_COUNTER,
    CONFIG_ROLLBACKS_COUNTER, MODEL_LOADS_COUNTER,
};

#[cfg(feature = "ml-models")]
pub use candle_loader::{CandleModelLoader, LoadedModel};

/// Manager backed by the Hugging Face hub and Candle
#[cfg(feature = "ml-models")]
pub type DefaultModelManager = ModelManager<CandleModelLoader, HuggingFaceHub>;
