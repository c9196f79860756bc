//! Detector configuration and loading.
//!
//! Loaded from `{data_path}/lark.toml`, the `LARK_CONFIG` env var (JSON), or defaults,
//! in that order. A source that fails to parse is logged and skipped.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::inference::candle_backend::EncoderConfig;

pub const CONFIG_FILE: &str = "lark.toml";
pub const CONFIG_ENV: &str = "LARK_CONFIG";
pub const DATA_PATH_ENV: &str = "LARK_DATA_PATH";

/// Where model artifacts come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ModelSource {
    /// Files on disk. Relative paths resolve against the data directory.
    Local {
        #[serde(default = "default_weights")]
        weights: PathBuf,
        #[serde(default = "default_labels")]
        labels: PathBuf,
        /// `tokenizer.json`; byte-level tokenization when absent.
        #[serde(default)]
        tokenizer: Option<PathBuf>,
    },
    /// Files fetched from a HuggingFace Hub repository.
    Hub { repo: String },
}

fn default_weights() -> PathBuf {
    PathBuf::from("model.safetensors")
}

fn default_labels() -> PathBuf {
    PathBuf::from("all_dataset_labels.json")
}

impl Default for ModelSource {
    fn default() -> Self {
        Self::Local {
            weights: default_weights(),
            labels: default_labels(),
            tokenizer: None,
        }
    }
}

/// Runtime settings for the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Tokens per sequence; longer texts are truncated.
    pub max_len: usize,
    /// Texts per backend call in batch detection.
    pub chunk_size: usize,
    pub top_k: usize,
    pub confidence_threshold: f32,
    /// Chunks scored concurrently by the async service.
    pub concurrency: usize,
    pub model: ModelSource,
    pub encoder: EncoderConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_len: 1024,
            chunk_size: 50,
            top_k: 5,
            confidence_threshold: 0.5,
            concurrency: 1,
            model: ModelSource::default(),
            encoder: EncoderConfig::default(),
        }
    }
}

/// Resolve the data directory.
///
/// Priority: explicit path > `LARK_DATA_PATH` env > `./.lark` (if exists) > `~/.lark`.
pub fn resolve_data_path(explicit_path: Option<PathBuf>) -> PathBuf {
    explicit_path
        .or_else(|| std::env::var(DATA_PATH_ENV).ok().map(PathBuf::from))
        .or_else(|| {
            let local_path = Path::new(".lark");
            if local_path.is_dir() {
                Some(local_path.to_path_buf())
            } else {
                None
            }
        })
        .unwrap_or_else(|| {
            dirs::home_dir()
                .map(|h| h.join(".lark"))
                .unwrap_or_else(|| PathBuf::from(".lark"))
        })
}

/// Load detector config with priority:
/// 1. `{data_path}/lark.toml` file
/// 2. `LARK_CONFIG` env var (JSON)
/// 3. Default
pub fn load_config(data_path: &Path) -> DetectorConfig {
    let config_path = data_path.join(CONFIG_FILE);
    if config_path.exists() {
        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str::<DetectorConfig>(&contents) {
                Ok(config) => {
                    info!("Loaded detector config from {}", config_path.display());
                    return config;
                }
                Err(e) => {
                    warn!(
                        "Failed to parse {}: {}. Using default.",
                        config_path.display(),
                        e
                    );
                }
            },
            Err(e) => {
                warn!(
                    "Failed to read {}: {}. Using default.",
                    config_path.display(),
                    e
                );
            }
        }
    }

    if let Ok(json) = std::env::var(CONFIG_ENV) {
        match serde_json::from_str::<DetectorConfig>(&json) {
            Ok(config) => {
                info!("Loaded detector config from {} env", CONFIG_ENV);
                return config;
            }
            Err(e) => {
                warn!("Failed to parse {}: {}. Using default.", CONFIG_ENV, e);
            }
        }
    }

    DetectorConfig::default()
}
