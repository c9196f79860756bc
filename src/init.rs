//! Shared initialization logic for the CLI and library callers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{load_config, resolve_data_path, DetectorConfig, ModelSource};
use crate::detector::LarkDetector;
use crate::inference::candle_backend::{
    download_model, select_device, CandleScorer, EncoderConfig, ModelFiles,
};
use crate::inference::{ByteTokenizer, HfTokenizer, TextTokenizer};
use crate::labels::LabelVocabulary;
use crate::LarkError;

/// Application context holding the configured detector.
pub struct AppContext {
    pub data_path: PathBuf,
    pub config: DetectorConfig,
    pub detector: Arc<LarkDetector>,
    /// Set when weights failed to load and the encoder runs on default weights.
    pub weights_error: Option<LarkError>,
}

impl AppContext {
    /// Initialize application context.
    ///
    /// Data path priority: explicit path > LARK_DATA_PATH env > ./.lark (if exists) > ~/.lark
    pub fn new(explicit_path: Option<PathBuf>) -> Result<Self, LarkError> {
        let data_path = resolve_data_path(explicit_path);
        tracing::info!("Using data path: {}", data_path.display());

        let config = load_config(&data_path);
        let (detector, weights_error) = build_detector(&config, &data_path)?;

        Ok(Self {
            data_path,
            config,
            detector: Arc::new(detector),
            weights_error,
        })
    }

    pub fn weights_loaded(&self) -> bool {
        self.weights_error.is_none()
    }
}

/// Build a detector from configuration.
///
/// Missing or unreadable weights do not fail the build: the encoder falls back to
/// default initialisation and the weights error is returned alongside.
pub fn build_detector(
    config: &DetectorConfig,
    data_path: &Path,
) -> Result<(LarkDetector, Option<LarkError>), LarkError> {
    let files = match &config.model {
        ModelSource::Local {
            weights,
            labels,
            tokenizer,
        } => ModelFiles {
            weights_path: Some(data_path.join(weights)),
            labels_path: data_path.join(labels),
            tokenizer_path: tokenizer.as_ref().map(|t| data_path.join(t)),
        },
        ModelSource::Hub { repo } => {
            tracing::info!("Fetching model files from {}", repo);
            download_model(repo)?
        }
    };

    build_from_files(config, &files)
}

/// Build a detector from resolved model files.
///
/// Only the labels file is required; without weights the encoder is default-initialised.
pub fn build_from_files(
    config: &DetectorConfig,
    files: &ModelFiles,
) -> Result<(LarkDetector, Option<LarkError>), LarkError> {
    let vocab = LabelVocabulary::from_file(&files.labels_path)?;

    let tokenizer: Arc<dyn TextTokenizer> = match &files.tokenizer_path {
        Some(path) => Arc::new(HfTokenizer::from_file(path)?),
        None => Arc::new(ByteTokenizer),
    };

    if tokenizer.vocab_size() > config.encoder.vocab_size {
        return Err(LarkError::Validation(format!(
            "Tokenizer emits {} ids but the encoder embeds only {}",
            tokenizer.vocab_size(),
            config.encoder.vocab_size
        )));
    }

    if config.encoder.label_size != vocab.len() {
        tracing::warn!(
            "Encoder label_size {} differs from {} labels in {}; using the label file",
            config.encoder.label_size,
            vocab.len(),
            files.labels_path.display()
        );
    }
    let encoder = EncoderConfig {
        label_size: vocab.len(),
        ..config.encoder.clone()
    };

    let (scorer, weights_error) =
        CandleScorer::load_or_init(files.weights_path.as_deref(), encoder, select_device())?;

    let detector = LarkDetector::new(Arc::new(vocab), Arc::new(scorer), tokenizer, config.max_len)?;
    tracing::info!(
        "Detector ready ({} languages, max_len {})",
        detector.supported_languages().len(),
        detector.max_len()
    );

    Ok((detector, weights_error))
}
