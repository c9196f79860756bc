//! Candle-based scoring backend.
//!
//! Pure-Rust transformer encoder with a per-token classification head. Provides
//! [`CandleScorer`], the bundled [`ScoringOracle`], plus model file download and
//! device selection helpers.

use std::path::{Path, PathBuf};

use candle_core::{DType, Device, Tensor};
use candle_nn::{Embedding, LayerNorm, Linear, Module, VarBuilder, VarMap};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::inference::{ScoreOutput, ScoringOracle, TokenBatch};
use crate::LarkError;

const WEIGHTS_FILE: &str = "model.safetensors";
const LABELS_FILE: &str = "all_dataset_labels.json";
const TOKENIZER_FILE: &str = "tokenizer.json";

/// Paths to downloaded model files from HuggingFace Hub.
pub struct ModelFiles {
    /// Absent when the weights could not be fetched; the encoder then runs on default weights.
    pub weights_path: Option<PathBuf>,
    pub labels_path: PathBuf,
    /// Absent when the repository ships no `tokenizer.json` (byte-level models).
    pub tokenizer_path: Option<PathBuf>,
}

/// Download model files from HuggingFace Hub.
///
/// Uses `hf_hub::api::sync::Api` which caches at `~/.cache/huggingface/hub/`.
pub fn download_model(repo_id: &str) -> Result<ModelFiles, LarkError> {
    let api = hf_hub::api::sync::Api::new()
        .map_err(|e| LarkError::Config(format!("Failed to initialize HuggingFace Hub API: {}", e)))?;
    let repo = api.model(repo_id.to_string());

    let weights_path = match repo.get(WEIGHTS_FILE) {
        Ok(path) => Some(path),
        Err(e) => {
            warn!("Failed to download {} from {}: {}", WEIGHTS_FILE, repo_id, e);
            None
        }
    };
    let labels_path = repo
        .get(LABELS_FILE)
        .map_err(|e| LarkError::Config(format!("Failed to download {}: {}", LABELS_FILE, e)))?;
    let tokenizer_path = repo.get(TOKENIZER_FILE).ok();

    Ok(ModelFiles {
        weights_path,
        labels_path,
        tokenizer_path,
    })
}

/// Select the best available compute device.
///
/// Tries Metal (macOS) or CUDA (with the `cuda` feature). Probes layer-norm
/// support and falls back to CPU if the GPU backend lacks the kernel.
pub fn select_device() -> Device {
    #[cfg(target_os = "macos")]
    {
        if let Ok(device) = Device::new_metal(0) {
            if probe_layer_norm(&device) {
                info!("Using Metal GPU for inference");
                return device;
            }
            warn!("Metal GPU available but layer-norm not supported, falling back to CPU");
        }
    }
    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::new_cuda(0) {
            if probe_layer_norm(&device) {
                info!("Using CUDA GPU for inference");
                return device;
            }
            warn!("CUDA GPU available but layer-norm not supported, falling back to CPU");
        }
    }
    info!("Using CPU for inference");
    Device::Cpu
}

#[cfg_attr(not(any(target_os = "macos", feature = "cuda")), allow(dead_code))]
fn probe_layer_norm(device: &Device) -> bool {
    (|| -> candle_core::Result<()> {
        let weight = Tensor::ones(4, DType::F32, device)?;
        let bias = Tensor::zeros(4, DType::F32, device)?;
        let ln = LayerNorm::new(weight, bias, 1e-5);
        let input = Tensor::randn(0f32, 1.0, (1, 4), device)?;
        let _ = ln.forward(&input)?;
        Ok(())
    })()
    .is_ok()
}

/// Encoder hyperparameters. These must match the weights artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub d_model: usize,
    pub n_layers: usize,
    pub n_heads: usize,
    pub ff: usize,
    pub label_size: usize,
    pub max_len: usize,
    pub vocab_size: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            d_model: 256,
            n_layers: 4,
            n_heads: 8,
            ff: 512,
            label_size: 102,
            max_len: 1024,
            vocab_size: 258,
        }
    }
}

impl EncoderConfig {
    fn validate(&self) -> Result<(), LarkError> {
        if self.n_heads == 0 || self.d_model % self.n_heads != 0 {
            return Err(LarkError::Validation(format!(
                "d_model ({}) must be a positive multiple of n_heads ({})",
                self.d_model, self.n_heads
            )));
        }
        if self.label_size == 0 || self.max_len == 0 || self.vocab_size == 0 {
            return Err(LarkError::Validation(
                "label_size, max_len and vocab_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Pre-norm self-attention block.
struct EncoderLayer {
    q: Linear,
    k: Linear,
    v: Linear,
    o: Linear,
    ln1: LayerNorm,
    ln2: LayerNorm,
    ff_up: Linear,
    ff_down: Linear,
    n_heads: usize,
    head_dim: usize,
}

impl EncoderLayer {
    fn load(vb: VarBuilder, config: &EncoderConfig) -> candle_core::Result<Self> {
        let d = config.d_model;
        let attn = vb.pp("attn");
        Ok(Self {
            q: candle_nn::linear(d, d, attn.pp("q"))?,
            k: candle_nn::linear(d, d, attn.pp("k"))?,
            v: candle_nn::linear(d, d, attn.pp("v"))?,
            o: candle_nn::linear(d, d, attn.pp("o"))?,
            ln1: candle_nn::layer_norm(d, 1e-5, vb.pp("ln1"))?,
            ln2: candle_nn::layer_norm(d, 1e-5, vb.pp("ln2"))?,
            ff_up: candle_nn::linear(d, config.ff, vb.pp("ff").pp("up"))?,
            ff_down: candle_nn::linear(config.ff, d, vb.pp("ff").pp("down"))?,
            n_heads: config.n_heads,
            head_dim: d / config.n_heads,
        })
    }

    /// `x`: `[batch, seq, d_model]`; `mask`: additive, `[batch, 1, 1, seq]`.
    fn forward(&self, x: &Tensor, mask: &Tensor) -> candle_core::Result<Tensor> {
        let (b, t, d) = x.dims3()?;
        let heads = |xs: Tensor| -> candle_core::Result<Tensor> {
            xs.reshape((b, t, self.n_heads, self.head_dim))?
                .transpose(1, 2)?
                .contiguous()
        };

        let h = self.ln1.forward(x)?;
        let q = heads(self.q.forward(&h)?)?;
        let k = heads(self.k.forward(&h)?)?;
        let v = heads(self.v.forward(&h)?)?;

        let scale = 1.0 / (self.head_dim as f64).sqrt();
        let att = q
            .matmul(&k.t()?.contiguous()?)?
            .affine(scale, 0.0)?
            .broadcast_add(mask)?;
        let att = candle_nn::ops::softmax_last_dim(&att)?;
        let ctx = att
            .matmul(&v)?
            .transpose(1, 2)?
            .contiguous()?
            .reshape((b, t, d))?;
        let x = x.add(&self.o.forward(&ctx)?)?;

        let h = self.ln2.forward(&x)?;
        let h = self.ff_down.forward(&self.ff_up.forward(&h)?.gelu()?)?;
        x.add(&h)
    }
}

/// Transformer encoder producing per-token label scores `[batch, seq, labels]`.
pub struct CandleScorer {
    embed: Embedding,
    pos_embed: Embedding,
    layers: Vec<EncoderLayer>,
    final_norm: LayerNorm,
    head: Linear,
    config: EncoderConfig,
    device: Device,
    weights_loaded: bool,
}

impl CandleScorer {
    fn build(
        vb: VarBuilder,
        config: EncoderConfig,
        device: Device,
        weights_loaded: bool,
    ) -> candle_core::Result<Self> {
        let embed = candle_nn::embedding(config.vocab_size, config.d_model, vb.pp("embed"))?;
        let pos_embed = candle_nn::embedding(config.max_len, config.d_model, vb.pp("pos_embed"))?;
        let layers = (0..config.n_layers)
            .map(|i| EncoderLayer::load(vb.pp("layers").pp(i), &config))
            .collect::<candle_core::Result<Vec<_>>>()?;
        let final_norm = candle_nn::layer_norm(config.d_model, 1e-5, vb.pp("final_norm"))?;
        let head = candle_nn::linear(config.d_model, config.label_size, vb.pp("head"))?;

        Ok(Self {
            embed,
            pos_embed,
            layers,
            final_norm,
            head,
            config,
            device,
            weights_loaded,
        })
    }

    /// Load weights from a safetensors file.
    pub fn from_safetensors(
        path: &Path,
        config: EncoderConfig,
        device: Device,
    ) -> Result<Self, LarkError> {
        config.validate()?;
        let weights_error = |e: candle_core::Error| LarkError::WeightsLoad {
            path: path.display().to_string(),
            message: e.to_string(),
        };

        // SAFETY: mmap'd safetensors file, safe as long as the file is not modified
        // while the model is in use.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[path], DType::F32, &device)
                .map_err(weights_error)?
        };
        Self::build(vb, config, device, true).map_err(weights_error)
    }

    /// Default-initialised encoder. Predictions are effectively random.
    pub fn with_default_weights(config: EncoderConfig, device: Device) -> Result<Self, LarkError> {
        config.validate()?;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        Ok(Self::build(vb, config, device, false)?)
    }

    /// Load weights if possible, otherwise fall back to default initialisation.
    ///
    /// The weights failure is returned alongside the scorer rather than aborting.
    pub fn load_or_init(
        weights: Option<&Path>,
        config: EncoderConfig,
        device: Device,
    ) -> Result<(Self, Option<LarkError>), LarkError> {
        let failure = match weights {
            Some(path) => match Self::from_safetensors(path, config.clone(), device.clone()) {
                Ok(scorer) => {
                    info!("Loaded encoder weights from {}", path.display());
                    return Ok((scorer, None));
                }
                Err(e) => e,
            },
            None => LarkError::WeightsLoad {
                path: "<none>".to_string(),
                message: "no weights file configured".to_string(),
            },
        };

        warn!(
            "{}. Falling back to default-initialised weights; predictions will be unreliable.",
            failure
        );
        let scorer = Self::with_default_weights(config, device)?;
        Ok((scorer, Some(failure)))
    }

    pub fn weights_loaded(&self) -> bool {
        self.weights_loaded
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    fn forward(&self, batch: &TokenBatch) -> candle_core::Result<Tensor> {
        let (b, t) = (batch.batch_size(), batch.max_len());
        let ids = Tensor::from_vec(batch.ids().to_vec(), (b, t), &self.device)?;
        let mask = Tensor::from_vec(batch.mask().to_vec(), (b, t), &self.device)?
            .to_dtype(DType::F32)?
            .affine(1e9, -1e9)?
            .reshape((b, 1, 1, t))?;

        let positions = Tensor::arange(0u32, t as u32, &self.device)?;
        let mut x = self
            .embed
            .forward(&ids)?
            .broadcast_add(&self.pos_embed.forward(&positions)?)?;
        for layer in &self.layers {
            x = layer.forward(&x, &mask)?;
        }

        self.head.forward(&self.final_norm.forward(&x)?)
    }
}

impl ScoringOracle for CandleScorer {
    fn score(&self, batch: &TokenBatch) -> Result<ScoreOutput, LarkError> {
        if batch.is_empty() {
            return Ok(ScoreOutput::PerToken(Vec::new()));
        }
        if batch.max_len() > self.config.max_len {
            return Err(LarkError::scoring(format!(
                "Batch length {} exceeds encoder max_len {}",
                batch.max_len(),
                self.config.max_len
            )));
        }

        let logits = self.forward(batch)?;
        Ok(ScoreOutput::PerToken(logits.to_vec3::<f32>()?))
    }

    fn num_labels(&self) -> usize {
        self.config.label_size
    }

    fn max_sequence_length(&self) -> usize {
        self.config.max_len
    }
}
