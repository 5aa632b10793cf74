//! Sentence-transformer embedder (BERT family, e.g. all-MiniLM-L6-v2).
//!
//! Loads `config.json`, `tokenizer.json` and `model.safetensors` from a model
//! directory and runs on the CPU. Token states are mean pooled under the
//! attention mask and L2 normalized.

use std::fs;
use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use tokenizers::Tokenizer;
use tracing::info;

use super::embedding::EmbeddingProvider;
use super::error::{RetrievalError, RetrievalResult};

/// Longer inputs are truncated; MiniLM was trained on 256 word pieces.
const MAX_TOKENS: usize = 256;

pub struct SentenceEmbedder {
    id: String,
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
}

fn model_error(message: impl std::fmt::Display) -> RetrievalError {
    RetrievalError::Embedding {
        provider: "sentence".to_string(),
        message: message.to_string(),
    }
}

impl SentenceEmbedder {
    pub fn load(model_dir: &Path) -> RetrievalResult<Self> {
        let device = Device::Cpu;

        let config_path = model_dir.join("config.json");
        let config_content = fs::read_to_string(&config_path)
            .map_err(|e| model_error(format!("{}: {}", config_path.display(), e)))?;
        let config: Config = serde_json::from_str(&config_content)
            .map_err(|e| model_error(format!("failed to parse config: {}", e)))?;

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| model_error(format!("{}: {}", tokenizer_path.display(), e)))?;

        let weights_path = model_dir.join("model.safetensors");
        // SAFETY: the weights file is not modified while mapped.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)
        }
        .map_err(model_error)?;
        let model = BertModel::load(vb, &config).map_err(model_error)?;

        let name = model_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "model".to_string());
        let dim = config.hidden_size;
        info!(model = %name, dim, "sentence embedder loaded");

        Ok(Self {
            id: format!("sentence-{}-d{}", name, dim),
            model,
            tokenizer,
            device,
            dim,
        })
    }

    fn forward(&self, text: &str) -> candle_core::Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| candle_core::Error::Msg(format!("tokenization failed: {}", e)))?;

        let mut ids = encoding.get_ids().to_vec();
        let mut mask = encoding.get_attention_mask().to_vec();
        ids.truncate(MAX_TOKENS);
        mask.truncate(MAX_TOKENS);

        let input_ids = Tensor::new(ids.as_slice(), &self.device)?.unsqueeze(0)?;
        let token_type_ids = input_ids.zeros_like()?;
        let attention_mask = Tensor::new(mask.as_slice(), &self.device)?.unsqueeze(0)?;

        // (1, tokens, hidden)
        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        let weights = attention_mask.to_dtype(DType::F32)?.unsqueeze(2)?;
        let summed = hidden.broadcast_mul(&weights)?.sum(1)?;
        let counts = weights.sum(1)?;
        let pooled = summed.broadcast_div(&counts)?;

        let norm = pooled.sqr()?.sum_keepdim(1)?.sqrt()?;
        pooled.broadcast_div(&norm)?.squeeze(0)?.to_vec1::<f32>()
    }
}

impl EmbeddingProvider for SentenceEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> RetrievalResult<Vec<f32>> {
        self.forward(text).map_err(model_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_dir_is_an_embedding_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SentenceEmbedder::load(dir.path()).err().unwrap();
        assert!(matches!(err, RetrievalError::Embedding { .. }));
    }
}
