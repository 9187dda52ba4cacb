use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;

use ragline_core::traits::Embedder;

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::tokenize_on_device;

/// XLM-RoBERTa encoder (e.g. BGE-M3) loaded from a local model directory
/// holding `tokenizer.json`, `config.json` and `pytorch_model.bin`.
pub struct CandleEmbedder {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    id: String,
    dim: usize,
    max_len: usize,
}

impl CandleEmbedder {
    pub fn load(model_dir: &Path, model_name: &str, max_len: usize) -> Result<Self> {
        let device = select_device();
        tracing::info!(model = model_name, dir = %model_dir.display(), "loading embedding model");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;

        let config_path = model_dir.join("config.json");
        let raw_config = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let config: XLMRobertaConfig = serde_json::from_str(&raw_config)?;
        let dim = serde_json::from_str::<serde_json::Value>(&raw_config)?
            .get("hidden_size")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| anyhow!("config.json has no hidden_size"))? as usize;

        let weights_path = model_dir.join("pytorch_model.bin");
        let weights = candle_core::pickle::read_all(&weights_path)
            .with_context(|| format!("Failed to read weights from {}", weights_path.display()))?;
        let weights_map: HashMap<String, Tensor> = weights.into_iter().collect();
        let vb = VarBuilder::from_tensors(weights_map, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;
        tracing::info!(dim, "embedding model loaded");

        Ok(Self { model, tokenizer, device, id: format!("candle:{model_name}:d{dim}"), dim, max_len })
    }
}

impl Embedder for CandleEmbedder {
    fn model_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }

    fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize_on_device(&self.tokenizer, text, self.max_len, &self.device)?;
        let token_type_ids = Tensor::zeros((1, self.max_len), DType::I64, &self.device)?;
        let hidden_states = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden_states, &attention_mask)?;
        let emb: Vec<f32> = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1()?;
        anyhow::ensure!(emb.len() == self.dim, "expected {} dims, model produced {}", self.dim, emb.len());
        if start.elapsed().as_millis() > 100 { tracing::debug!(elapsed_ms = start.elapsed().as_millis() as u64, "slow embedding"); }
        Ok(emb)
    }
}
