//! Text-to-id tokenizers consumed by the batcher.

use std::path::Path;

use tokenizers::Tokenizer;

use crate::LarkError;

/// Converts a single text into token ids.
///
/// Implementations must be deterministic; the batcher handles truncation and padding.
pub trait TextTokenizer: Send + Sync {
    fn encode(&self, text: &str) -> Result<Vec<u32>, LarkError>;

    /// Id used for padded positions.
    fn pad_id(&self) -> u32;

    /// Number of distinct ids the tokenizer can emit.
    fn vocab_size(&self) -> usize;
}

/// Byte-level tokenizer: a CLS id followed by one id per UTF-8 byte.
///
/// Ids 0 and 1 are reserved for padding and CLS; byte `b` maps to `b + 2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteTokenizer;

impl ByteTokenizer {
    pub const PAD_ID: u32 = 0;
    pub const CLS_ID: u32 = 1;
    const RESERVED: u32 = 2;
}

impl TextTokenizer for ByteTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>, LarkError> {
        if let Some(pos) = text.find('\0') {
            return Err(LarkError::Tokenization(format!(
                "Text contains a NUL character at byte {}",
                pos
            )));
        }

        let mut ids = Vec::with_capacity(text.len() + 1);
        ids.push(Self::CLS_ID);
        ids.extend(text.bytes().map(|b| u32::from(b) + Self::RESERVED));
        Ok(ids)
    }

    fn pad_id(&self) -> u32 {
        Self::PAD_ID
    }

    fn vocab_size(&self) -> usize {
        256 + Self::RESERVED as usize
    }
}

/// Hugging Face `tokenizers` model loaded from a `tokenizer.json`.
pub struct HfTokenizer {
    tokenizer: Tokenizer,
    pad_id: u32,
}

impl HfTokenizer {
    pub fn from_file(path: &Path) -> Result<Self, LarkError> {
        let mut tokenizer = Tokenizer::from_file(path).map_err(|e| {
            LarkError::Config(format!("Failed to load tokenizer {}: {}", path.display(), e))
        })?;

        let pad_id = tokenizer
            .get_padding()
            .map(|p| p.pad_id)
            .or_else(|| tokenizer.token_to_id("<pad>"))
            .or_else(|| tokenizer.token_to_id("[PAD]"))
            .unwrap_or(0);

        // The batcher owns padding and truncation.
        tokenizer.with_padding(None);
        tokenizer
            .with_truncation(None)
            .map_err(|e| LarkError::Config(format!("Failed to reset truncation: {}", e)))?;

        Ok(Self { tokenizer, pad_id })
    }
}

impl TextTokenizer for HfTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>, LarkError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| LarkError::Tokenization(format!("Tokenization failed: {}", e)))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn pad_id(&self) -> u32 {
        self.pad_id
    }

    fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }
}
