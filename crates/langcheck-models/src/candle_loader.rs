//! Candle-backed model loading from the Hugging Face hub
//!
//! Each [`LoaderFunc`] maps to one loading routine:
//! - text classification: BERT-family encoder + classification head
//! - seq2seq: T5 or Marian encoder-decoder, embedding text by its mean-pooled
//!   encoder states
//! - sentence embedding: BERT-family encoder + masked mean pooling

use crate::config::ModelSpec;
use crate::loader::{LoaderFunc, ModelLoader, SentenceEmbedder, TextClassifier};
use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use candle_transformers::models::marian::{Config as MarianConfig, MTModel};
use candle_transformers::models::t5::{Config as T5Config, T5ForConditionalGeneration};
use hf_hub::api::sync::{Api, ApiRepo};
use hf_hub::{Repo, RepoType};
use langcheck_core::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokenizers::{Tokenizer, TruncationDirection};

const DEFAULT_MAX_LENGTH: usize = 512;

/// Loads metric models with Candle, downloading through `hf-hub`
pub struct CandleModelLoader {
    device: Device,
    max_length: usize,
}

impl CandleModelLoader {
    /// CPU loader
    pub fn new() -> Self {
        Self {
            device: Device::Cpu,
            max_length: DEFAULT_MAX_LENGTH,
        }
    }

    /// Run models on `device`
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Truncate inputs to `max_length` tokens
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    fn load_text_classification(&self, spec: &ModelSpec) -> Result<SequenceClassifier> {
        let files = download(spec)?;
        let tokenizer = load_tokenizer(spec, true)?.ok_or_else(|| missing_tokenizer(spec))?;
        let config_json: serde_json::Value = parse_json_config(&files.config)?;
        check_bert_architecture(&config_json, &spec.model_name)?;
        let bert_config: BertConfig = parse_json_config(&files.config)?;
        let vb = load_var_builder(&files.weights, &self.device)?;

        let (model, prefix) = load_bert_backbone(&vb, &bert_config)?;
        let labels = labels_from_config(&config_json);
        let pooler = prefix.and_then(|p| {
            candle_nn::linear(
                bert_config.hidden_size,
                bert_config.hidden_size,
                vb.pp(p).pp("pooler").pp("dense"),
            )
            .ok()
        });
        let head = load_classification_head(&vb, bert_config.hidden_size, labels.len())?;

        tracing::info!(
            "Loaded text classifier '{}' with {} labels: {:?}",
            spec.model_name,
            labels.len(),
            labels
        );

        Ok(SequenceClassifier {
            name: spec.model_name.clone(),
            tokenizer,
            model,
            pooler,
            head,
            device: self.device.clone(),
            labels,
            max_length: self.max_length,
        })
    }

    fn load_seq2seq(&self, spec: &ModelSpec) -> Result<Seq2SeqModel> {
        let files = download(spec)?;
        let tokenizer = load_tokenizer(spec, false)?;
        let config_json: serde_json::Value = parse_json_config(&files.config)?;
        let vb = load_var_builder(&files.weights, &self.device)?;

        let model_type = config_json
            .get("model_type")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let backbone = match model_type.as_str() {
            "t5" | "mt5" => {
                let config: T5Config = parse_json_config(&files.config)?;
                let model = T5ForConditionalGeneration::load(vb, &config)
                    .map_err(candle_err("Failed to load T5 model"))?;
                Seq2SeqBackbone::T5(Mutex::new(model))
            }
            "marian" => {
                let config: MarianConfig = parse_json_config(&files.config)?;
                let model =
                    MTModel::new(&config, vb).map_err(candle_err("Failed to load Marian model"))?;
                Seq2SeqBackbone::Marian(Mutex::new(model))
            }
            other => {
                return Err(Error::model(format!(
                    "Unsupported seq2seq architecture '{}' for {}",
                    other, spec.model_name
                )))
            }
        };

        tracing::info!(
            "Loaded seq2seq model '{}' ({})",
            spec.model_name,
            model_type
        );

        Ok(Seq2SeqModel {
            name: spec.model_name.clone(),
            tokenizer,
            backbone,
            device: self.device.clone(),
            max_length: self.max_length,
        })
    }

    fn load_sentence_embedding(&self, spec: &ModelSpec) -> Result<SentenceEncoder> {
        let files = download(spec)?;
        let tokenizer = load_tokenizer(spec, true)?.ok_or_else(|| missing_tokenizer(spec))?;
        let config_json: serde_json::Value = parse_json_config(&files.config)?;
        check_bert_architecture(&config_json, &spec.model_name)?;
        let bert_config: BertConfig = parse_json_config(&files.config)?;
        let vb = load_var_builder(&files.weights, &self.device)?;
        let (model, _) = load_bert_backbone(&vb, &bert_config)?;

        tracing::info!("Loaded sentence embedding model '{}'", spec.model_name);

        Ok(SentenceEncoder {
            name: spec.model_name.clone(),
            tokenizer,
            model,
            device: self.device.clone(),
            max_length: self.max_length,
        })
    }
}

impl Default for CandleModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelLoader for CandleModelLoader {
    type Model = LoadedModel;

    fn load(&self, spec: &ModelSpec) -> Result<LoadedModel> {
        match spec.loader {
            LoaderFunc::AutoModelForTextClassification => self
                .load_text_classification(spec)
                .map(LoadedModel::TextClassification),
            LoaderFunc::AutoModelForSeq2Seq => self.load_seq2seq(spec).map(LoadedModel::Seq2Seq),
            LoaderFunc::SentenceTransformers => self
                .load_sentence_embedding(spec)
                .map(LoadedModel::SentenceEmbedding),
        }
    }
}

/// A model produced by [`CandleModelLoader`]
pub enum LoadedModel {
    TextClassification(SequenceClassifier),
    Seq2Seq(Seq2SeqModel),
    SentenceEmbedding(SentenceEncoder),
}

impl LoadedModel {
    /// Strategy that produced this model
    pub fn loader(&self) -> LoaderFunc {
        match self {
            Self::TextClassification(_) => LoaderFunc::AutoModelForTextClassification,
            Self::Seq2Seq(_) => LoaderFunc::AutoModelForSeq2Seq,
            Self::SentenceEmbedding(_) => LoaderFunc::SentenceTransformers,
        }
    }

    /// Model identifier on the hub
    pub fn name(&self) -> &str {
        match self {
            Self::TextClassification(m) => &m.name,
            Self::Seq2Seq(m) => &m.name,
            Self::SentenceEmbedding(m) => &m.name,
        }
    }

    pub fn as_classifier(&self) -> Option<&SequenceClassifier> {
        match self {
            Self::TextClassification(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_seq2seq(&self) -> Option<&Seq2SeqModel> {
        match self {
            Self::Seq2Seq(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_embedder(&self) -> Option<&SentenceEncoder> {
        match self {
            Self::SentenceEmbedding(m) => Some(m),
            _ => None,
        }
    }
}

/// BERT-family encoder with a sequence classification head
pub struct SequenceClassifier {
    name: String,
    tokenizer: Tokenizer,
    model: BertModel,
    pooler: Option<Linear>,
    head: Linear,
    device: Device,
    labels: Vec<String>,
    max_length: usize,
}

impl TextClassifier for SequenceClassifier {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn logits(&self, text: &str) -> Result<Vec<f32>> {
        let inputs = encode(&self.tokenizer, text, self.max_length, &self.device)?;

        let hidden_states = self
            .model
            .forward(&inputs.input_ids, &inputs.token_type_ids, Some(&inputs.attention_mask))
            .map_err(candle_err("Model forward pass failed"))?;

        let mut cls = hidden_states
            .i((.., 0, ..))
            .map_err(candle_err("Failed to get CLS token"))?;

        if let Some(pooler) = &self.pooler {
            cls = pooler
                .forward(&cls)
                .and_then(|t| t.tanh())
                .map_err(candle_err("Pooler failed"))?;
        }

        self.head
            .forward(&cls)
            .and_then(|t| t.squeeze(0))
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(candle_err("Failed to read logits"))
    }
}

/// Encoder-decoder model for generation-based metrics
pub struct Seq2SeqModel {
    name: String,
    tokenizer: Option<Tokenizer>,
    backbone: Seq2SeqBackbone,
    device: Device,
    max_length: usize,
}

enum Seq2SeqBackbone {
    T5(Mutex<T5ForConditionalGeneration>),
    Marian(Mutex<MTModel>),
}

impl Seq2SeqModel {
    /// Architecture name ("t5" or "marian")
    pub fn architecture(&self) -> &'static str {
        match self.backbone {
            Seq2SeqBackbone::T5(_) => "t5",
            Seq2SeqBackbone::Marian(_) => "marian",
        }
    }

    /// Encoder hidden states for a single text, shape `(1, seq_len, d_model)`
    fn encoder_states(&self, inputs: &EncodedInput) -> Result<Tensor> {
        match &self.backbone {
            Seq2SeqBackbone::T5(model) => model
                .lock()
                .map_err(|_| Error::model("T5 model lock poisoned"))?
                .encode(&inputs.input_ids)
                .map_err(candle_err("T5 encoder failed")),
            Seq2SeqBackbone::Marian(model) => model
                .lock()
                .map_err(|_| Error::model("Marian model lock poisoned"))?
                .encoder()
                .forward(&inputs.input_ids, 0)
                .map_err(candle_err("Marian encoder failed")),
        }
    }
}

/// Mean-pooled encoder states
impl SentenceEmbedder for Seq2SeqModel {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let tokenizer = self.tokenizer.as_ref().ok_or_else(|| {
            Error::model(format!("No tokenizer.json available for {}", self.name))
        })?;
        let inputs = encode(tokenizer, text, self.max_length, &self.device)?;

        let sequence_embeddings: Vec<Vec<f32>> = self
            .encoder_states(&inputs)?
            .squeeze(0)
            .and_then(|t| t.to_vec2())
            .map_err(candle_err("Failed to convert encoder states to matrix"))?;

        Ok(mean_pool(&sequence_embeddings, &inputs.mask))
    }
}

/// BERT-family encoder with attention-masked mean pooling
pub struct SentenceEncoder {
    name: String,
    tokenizer: Tokenizer,
    model: BertModel,
    device: Device,
    max_length: usize,
}

impl SentenceEmbedder for SentenceEncoder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let inputs = encode(&self.tokenizer, text, self.max_length, &self.device)?;

        let hidden_states = self
            .model
            .forward(&inputs.input_ids, &inputs.token_type_ids, Some(&inputs.attention_mask))
            .map_err(candle_err("Model forward pass failed"))?;

        let sequence_embeddings: Vec<Vec<f32>> = hidden_states
            .squeeze(0)
            .and_then(|t| t.to_vec2())
            .map_err(candle_err("Failed to convert embeddings to matrix"))?;

        Ok(mean_pool(&sequence_embeddings, &inputs.mask))
    }
}

struct EncodedInput {
    input_ids: Tensor,
    token_type_ids: Tensor,
    attention_mask: Tensor,
    mask: Vec<u32>,
}

fn encode(tokenizer: &Tokenizer, text: &str, max_length: usize, device: &Device) -> Result<EncodedInput> {
    let mut encoding = tokenizer
        .encode(text, true)
        .map_err(|e| Error::model(format!("Tokenization failed: {}", e)))?;
    encoding.truncate(max_length, 0, TruncationDirection::Right);

    let row = |values: &[u32]| {
        Tensor::new(values, device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(candle_err("Failed to create input tensor"))
    };

    let mask = encoding.get_attention_mask().to_vec();
    Ok(EncodedInput {
        input_ids: row(encoding.get_ids())?,
        token_type_ids: row(encoding.get_type_ids())?,
        attention_mask: row(&mask)?,
        mask,
    })
}

struct ModelFiles {
    config: PathBuf,
    weights: PathBuf,
}

fn hub_repo(api: &Api, model_id: &str, revision: &str) -> ApiRepo {
    api.repo(Repo::with_revision(
        model_id.to_string(),
        RepoType::Model,
        revision.to_string(),
    ))
}

fn download(spec: &ModelSpec) -> Result<ModelFiles> {
    tracing::info!(
        "Downloading model from HuggingFace: {} @ {}",
        spec.model_name,
        spec.revision_or_main()
    );

    let api = Api::new()
        .map_err(|e| Error::model(format!("Failed to initialize HuggingFace API: {}", e)))?;
    let repo = hub_repo(&api, &spec.model_name, spec.revision_or_main());

    let config = repo
        .get("config.json")
        .map_err(|e| Error::model(format!("Failed to download config.json: {}", e)))?;

    let weights = ["model.safetensors", "pytorch_model.bin"]
        .iter()
        .find_map(|file| match repo.get(file) {
            Ok(path) => {
                tracing::debug!("Found weight file: {}", file);
                Some(path)
            }
            Err(_) => None,
        })
        .ok_or_else(|| {
            Error::model(format!(
                "No model weights found for {} (tried model.safetensors, pytorch_model.bin)",
                spec.model_name
            ))
        })?;

    Ok(ModelFiles { config, weights })
}

fn load_tokenizer(spec: &ModelSpec, vocab_fallback: bool) -> Result<Option<Tokenizer>> {
    let api = Api::new()
        .map_err(|e| Error::model(format!("Failed to initialize HuggingFace API: {}", e)))?;
    let revision = if spec.tokenizer_name.is_some() {
        "main"
    } else {
        spec.revision_or_main()
    };
    let repo = hub_repo(&api, spec.tokenizer(), revision);

    if let Ok(path) = repo.get("tokenizer.json") {
        tracing::debug!("Loading tokenizer from tokenizer.json");
        return Tokenizer::from_file(&path)
            .map(Some)
            .map_err(|e| Error::model(format!("Failed to load tokenizer.json: {}", e)));
    }

    if !vocab_fallback {
        return Ok(None);
    }

    match repo.get("vocab.txt") {
        Ok(path) => wordpiece_tokenizer(&path).map(Some),
        Err(_) => Ok(None),
    }
}

fn wordpiece_tokenizer(vocab_path: &Path) -> Result<Tokenizer> {
    use tokenizers::models::wordpiece::WordPiece;
    use tokenizers::normalizers::BertNormalizer;
    use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
    use tokenizers::processors::bert::BertProcessing;

    tracing::debug!("Building tokenizer from vocab.txt");

    let wordpiece = WordPiece::from_file(vocab_path.to_string_lossy().as_ref())
        .unk_token("[UNK]".to_string())
        .build()
        .map_err(|e| Error::model(format!("Failed to build WordPiece model: {}", e)))?;

    let cls_id = wordpiece_id(&wordpiece, "[CLS]", 101);
    let sep_id = wordpiece_id(&wordpiece, "[SEP]", 102);

    let mut tokenizer = Tokenizer::new(wordpiece);
    tokenizer.with_normalizer(Some(BertNormalizer::default()));
    tokenizer.with_pre_tokenizer(Some(BertPreTokenizer));
    tokenizer.with_post_processor(Some(BertProcessing::new(
        ("[SEP]".to_string(), sep_id),
        ("[CLS]".to_string(), cls_id),
    )));

    Ok(tokenizer)
}

fn wordpiece_id(wordpiece: &tokenizers::models::wordpiece::WordPiece, token: &str, fallback: u32) -> u32 {
    use tokenizers::Model;
    wordpiece.token_to_id(token).unwrap_or(fallback)
}

fn missing_tokenizer(spec: &ModelSpec) -> Error {
    Error::model(format!(
        "No tokenizer found for {} (tried tokenizer.json, vocab.txt)",
        spec.tokenizer()
    ))
}

fn parse_json_config<T: DeserializeOwned>(config_path: &Path) -> Result<T> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        Error::model(format!(
            "Failed to read config {}: {}",
            config_path.display(),
            e
        ))
    })?;

    serde_json::from_str(&config_str).map_err(|e| {
        Error::model(format!(
            "Failed to parse config {}: {}",
            config_path.display(),
            e
        ))
    })
}

fn load_var_builder(weights_path: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let is_safetensors = weights_path
        .extension()
        .map_or(false, |ext| ext == "safetensors");

    if is_safetensors {
        // SAFETY: the file is a hub-cached artifact that is not modified while mapped.
        unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, device)
                .map_err(candle_err("Failed to load SafeTensors weights"))
        }
    } else {
        VarBuilder::from_pth(weights_path, DType::F32, device)
            .map_err(candle_err("Failed to load PyTorch weights"))
    }
}

/// RoBERTa-family models offset position ids by `padding_idx + 1`, which
/// `BertModel` does not, so they are refused instead of scored wrongly.
fn check_bert_architecture(config: &serde_json::Value, model_name: &str) -> Result<()> {
    match config.get("model_type").and_then(|v| v.as_str()) {
        None => Ok(()),
        Some("bert") => Ok(()),
        Some(model_type) => Err(Error::model(format!(
            "Unsupported encoder architecture '{}' for {}: only BERT models are supported",
            model_type, model_name
        ))),
    }
}

fn load_bert_backbone(
    vb: &VarBuilder,
    config: &BertConfig,
) -> Result<(BertModel, Option<&'static str>)> {
    let mut errors = Vec::new();

    for prefix in [Some("bert"), None] {
        let vb_prefix = match prefix {
            Some(p) => vb.pp(p),
            None => vb.clone(),
        };

        match BertModel::load(vb_prefix, config) {
            Ok(model) => {
                tracing::info!("Loaded BERT backbone from '{}'", prefix.unwrap_or("<root>"));
                return Ok((model, prefix));
            }
            Err(e) => errors.push(format!("{}: {}", prefix.unwrap_or("<root>"), e)),
        }
    }

    Err(Error::model(format!(
        "Failed to load BERT backbone with tried prefixes [{}]",
        errors.join(" | ")
    )))
}

fn load_classification_head(vb: &VarBuilder, hidden_size: usize, num_labels: usize) -> Result<Linear> {
    candle_nn::linear(hidden_size, num_labels, vb.pp("classifier")).map_err(|e| {
        Error::model(format!(
            "No classification head found (hidden_size={}, num_labels={}): {}",
            hidden_size, num_labels, e
        ))
    })
}

/// Label names from `id2label`, ordered by id
fn labels_from_config(config: &serde_json::Value) -> Vec<String> {
    let mut labels: Vec<(usize, String)> = config
        .get("id2label")
        .and_then(|v| v.as_object())
        .map(|map| {
            map.iter()
                .filter_map(|(id, label)| Some((id.parse().ok()?, label.as_str()?.to_string())))
                .collect()
        })
        .unwrap_or_default();

    if labels.is_empty() {
        let num_labels = config
            .get("num_labels")
            .and_then(|v| v.as_u64())
            .unwrap_or(2) as usize;
        return (0..num_labels).map(|idx| format!("LABEL_{}", idx)).collect();
    }

    labels.sort_by_key(|(id, _)| *id);
    labels.into_iter().map(|(_, label)| label).collect()
}

fn mean_pool(sequence_embeddings: &[Vec<f32>], attention_mask: &[u32]) -> Vec<f32> {
    let Some(first) = sequence_embeddings.first() else {
        return Vec::new();
    };

    let mut pooled = vec![0.0f32; first.len()];
    let mut token_count = 0.0f32;

    for (idx, embedding) in sequence_embeddings.iter().enumerate() {
        if attention_mask.get(idx).copied().unwrap_or(0) == 0 {
            continue;
        }
        token_count += 1.0;
        for (acc, value) in pooled.iter_mut().zip(embedding) {
            *acc += value;
        }
    }

    if token_count == 0.0 {
        return pooled;
    }

    for value in &mut pooled {
        *value /= token_count;
    }
    pooled
}

fn candle_err(context: &'static str) -> impl Fn(candle_core::Error) -> Error {
    move |e| Error::model(format!("{}: {}", context, e))
}
