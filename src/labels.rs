//! Label vocabulary: the ordered list of language codes the model can emit.
//!
//! A label's id is its position in the list. The vocabulary is built once and
//! shared read-only (behind `Arc`) for the lifetime of the detector.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::LarkError;

/// Key holding the ordered label list in the labels file.
const LABELS_KEY: &str = "all_labels";

#[derive(Debug, Deserialize)]
struct LabelsFile {
    #[serde(rename = "all_labels")]
    all_labels: Vec<String>,
}

/// Immutable bidirectional mapping between label ids and language codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelVocabulary {
    codes: Vec<String>,
    ids: HashMap<String, usize>,
}

impl LabelVocabulary {
    /// Build a vocabulary from an ordered list of codes.
    ///
    /// Rejects an empty list and duplicate codes.
    pub fn new(codes: Vec<String>) -> Result<Self, LarkError> {
        if codes.is_empty() {
            return Err(LarkError::Validation(
                "Label vocabulary must contain at least one label".to_string(),
            ));
        }

        let mut ids = HashMap::with_capacity(codes.len());
        for (idx, code) in codes.iter().enumerate() {
            if ids.insert(code.clone(), idx).is_some() {
                return Err(LarkError::Validation(format!(
                    "Duplicate label '{}' in vocabulary",
                    code
                )));
            }
        }

        Ok(Self { codes, ids })
    }

    /// Parse a labels document: a JSON object with the list under `all_labels`.
    pub fn from_json_str(json: &str) -> Result<Self, LarkError> {
        let file: LabelsFile = serde_json::from_str(json).map_err(|e| {
            LarkError::Config(format!("Invalid labels file (expected '{}'): {}", LABELS_KEY, e))
        })?;
        Self::new(file.all_labels)
    }

    /// Load a labels file from disk.
    pub fn from_file(path: &Path) -> Result<Self, LarkError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            LarkError::Config(format!("Failed to read labels file {}: {}", path.display(), e))
        })?;
        let vocab = Self::from_json_str(&contents)?;
        tracing::info!("Loaded {} labels from {}", vocab.len(), path.display());
        Ok(vocab)
    }

    /// Code for a label id.
    pub fn code(&self, id: usize) -> Option<&str> {
        self.codes.get(id).map(String::as_str)
    }

    /// Id for a language code.
    pub fn id(&self, code: &str) -> Option<usize> {
        self.ids.get(code).copied()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// All codes in id order.
    pub fn codes(&self) -> &[String] {
        &self.codes
    }
}
