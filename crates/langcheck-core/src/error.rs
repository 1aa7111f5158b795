//! Error types for LangCheck

/// Result type alias using LangCheck's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for LangCheck operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Language has no configuration or is not recognized
    #[error("language '{0}' is not supported yet")]
    UnsupportedLanguage(String),

    /// Metric has no configuration for the language or is not recognized
    #[error("metric '{metric}' is not supported for language '{language}' yet")]
    UnsupportedMetric { language: String, metric: String },

    /// Loader function outside the registered strategies
    #[error("unsupported loader function '{0}'")]
    UnsupportedLoader(String),

    /// Required configuration attribute is absent
    #[error("{language} metric {metric} requires '{field}', but found none")]
    MissingField {
        language: String,
        metric: String,
        field: &'static str,
    },

    /// Model or revision could not be found on the model hub
    #[error("cannot find model '{model}' with revision {revision:?} on the model hub")]
    ModelUnavailable {
        model: String,
        revision: Option<String>,
    },

    /// Model hub could not be reached
    #[error("model hub error: {0}")]
    Hub(String),

    /// Model loading or inference errors
    #[error("model error: {0}")]
    Model(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Caller supplied inconsistent arguments
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Evaluator (LLM judge) errors
    #[error("evaluation error: {0}")]
    Eval(String),

    /// IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Create a new unsupported-metric error
    pub fn unsupported_metric(language: impl ToString, metric: impl ToString) -> Self {
        Self::UnsupportedMetric {
            language: language.to_string(),
            metric: metric.to_string(),
        }
    }

    /// Create a new hub error
    pub fn hub(msg: impl Into<String>) -> Self {
        Self::Hub(msg.into())
    }

    /// Create a new model error
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new invalid-input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new evaluation error
    pub fn eval(msg: impl Into<String>) -> Self {
        Self::Eval(msg.into())
    }

    /// Whether this error came from looking up an unconfigured language or metric
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedLanguage(_) | Self::UnsupportedMetric { .. }
        )
    }
}
