//! Local embeddings via a BERT sentence-transformer on candle
//!
//! Weights are fetched from the HuggingFace Hub on first use and cached by
//! `hf-hub`. Inference is CPU-bound and runs on the blocking pool.
//! Output vectors are mean-pooled and L2-normalised.

use async_trait::async_trait;
use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, DTYPE};
use hf_hub::{api::sync::Api, Repo, RepoType};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::info;

use crate::embedding::Embedder;
use crate::errors::{QaError, Result};

/// Default sentence-transformer
pub const DEFAULT_LOCAL_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// BERT context limit
const MAX_SEQUENCE_TOKENS: usize = 512;

fn service_error(context: &str) -> impl Fn(candle_core::Error) -> QaError + '_ {
    move |e| QaError::EmbeddingService(format!("{}: {}", context, e))
}

struct Inner {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    hidden_size: usize,
}

/// Fail with `Timeout` when `future` outlives `timeout`
async fn within<T>(
    operation: &str,
    timeout: Duration,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| QaError::timeout(operation, timeout))?
}

/// In-process embedding model
#[derive(Clone)]
pub struct LocalEmbedder {
    inner: Arc<Inner>,
    model_id: String,
    timeout: Duration,
}

impl LocalEmbedder {
    /// Download (if needed) and load `model_id` from the HuggingFace Hub.
    /// `load_timeout` bounds the download and load; `timeout` bounds each embedding.
    pub async fn load(model_id: &str, load_timeout: Duration, timeout: Duration) -> Result<Self> {
        let id = model_id.to_string();
        let loading = async move {
            tokio::task::spawn_blocking(move || Self::load_blocking(&id))
                .await
                .map_err(|e| QaError::EmbeddingService(format!("Model loader crashed: {}", e)))?
        };
        let inner = within("embedding model load", load_timeout, loading).await?;

        info!(model = model_id, dim = inner.hidden_size, "local embedding model ready");
        Ok(Self {
            inner: Arc::new(inner),
            model_id: model_id.to_string(),
            timeout,
        })
    }

    fn load_blocking(model_id: &str) -> Result<Inner> {
        let device = Device::Cpu;

        let api = Api::new().map_err(|e| {
            QaError::EmbeddingService(format!("Failed to create HuggingFace API client: {}", e))
        })?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

        let fetch = |file: &str| {
            repo.get(file).map_err(|e| {
                QaError::EmbeddingService(format!("Failed to download {}: {}", file, e))
            })
        };
        let config_path = fetch("config.json")?;
        let tokenizer_path = fetch("tokenizer.json")?;
        let weights_path = fetch("model.safetensors")?;

        let config_contents = std::fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_contents).map_err(|e| {
            QaError::EmbeddingService(format!("Failed to parse model config: {}", e))
        })?;

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| QaError::EmbeddingService(format!("Failed to load tokenizer: {}", e)))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQUENCE_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| QaError::EmbeddingService(format!("Failed to configure tokenizer: {}", e)))?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DTYPE, &device)
                .map_err(service_error("Failed to load model weights"))?
        };
        let model = BertModel::load(vb, &config).map_err(service_error("Failed to create BERT model"))?;

        Ok(Inner {
            model,
            tokenizer,
            device,
            hidden_size: config.hidden_size,
        })
    }

    /// Embedding dimension (the model's hidden size)
    pub fn dimension(&self) -> usize {
        self.inner.hidden_size
    }

    /// Embed several texts in one forward pass
    pub async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let inner = self.inner.clone();
        let inference = async move {
            tokio::task::spawn_blocking(move || inner.embed_batch(&texts))
                .await
                .map_err(|e| QaError::EmbeddingService(format!("Embedding task crashed: {}", e)))?
        };
        within("embedding", self.timeout, inference).await
    }
}

impl Inner {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.iter().map(String::as_str).collect::<Vec<_>>(), true)
            .map_err(|e| QaError::EmbeddingService(format!("Tokenization failed: {}", e)))?;

        let max_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);
        let batch_size = encodings.len();

        let mut flat_ids = vec![0u32; batch_size * max_len];
        let mut flat_mask = vec![0u32; batch_size * max_len];
        for (row, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let offset = row * max_len;
            flat_ids[offset..offset + ids.len()].copy_from_slice(ids);
            flat_mask[offset..offset + mask.len()].copy_from_slice(mask);
        }

        let token_ids = Tensor::from_vec(flat_ids, (batch_size, max_len), &self.device)
            .map_err(service_error("Failed to build input tensor"))?;
        let attention_mask = Tensor::from_vec(flat_mask, (batch_size, max_len), &self.device)
            .map_err(service_error("Failed to build mask tensor"))?;
        let token_type_ids = token_ids
            .zeros_like()
            .map_err(service_error("Failed to build type tensor"))?;

        let hidden = self
            .model
            .forward(&token_ids, &token_type_ids, Some(&attention_mask))
            .map_err(service_error("Forward pass failed"))?;

        let pooled = mean_pool(&hidden, &attention_mask).map_err(service_error("Pooling failed"))?;
        let normalized = l2_normalize(&pooled).map_err(service_error("Normalisation failed"))?;

        normalized
            .to_vec2::<f32>()
            .map_err(service_error("Failed to read embeddings"))
    }
}

/// Mean over the sequence axis, ignoring padding
fn mean_pool(hidden: &Tensor, attention_mask: &Tensor) -> candle_core::Result<Tensor> {
    let mask = attention_mask
        .unsqueeze(2)?
        .expand(hidden.shape())?
        .to_dtype(hidden.dtype())?;

    let summed = (hidden * &mask)?.sum(1)?;
    let counts = mask.sum(1)?.clamp(1e-9, f64::MAX)?;
    summed.broadcast_div(&counts)
}

fn l2_normalize(v: &Tensor) -> candle_core::Result<Tensor> {
    let norms = v.sqr()?.sum_keepdim(1)?.sqrt()?.clamp(1e-12, f64::MAX)?;
    v.broadcast_div(&norms)
}

#[async_trait]
impl Embedder for LocalEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(vec![text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| QaError::EmbeddingService("model returned no embedding".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}
