//! Fixed-shape token batches.

use crate::inference::tokenizer::TextTokenizer;
use crate::LarkError;

/// Token ids and padding mask, both `[batch_size, max_len]`, stored row-major.
///
/// Every mask row is a run of 1s followed by 0s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBatch {
    ids: Vec<u32>,
    mask: Vec<u32>,
    batch_size: usize,
    max_len: usize,
}

impl TokenBatch {
    pub fn empty(max_len: usize) -> Self {
        Self {
            ids: Vec::new(),
            mask: Vec::new(),
            batch_size: 0,
            max_len,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn is_empty(&self) -> bool {
        self.batch_size == 0
    }

    /// Flattened ids, `batch_size * max_len` long.
    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    /// Flattened mask, `batch_size * max_len` long.
    pub fn mask(&self) -> &[u32] {
        &self.mask
    }

    pub fn row_ids(&self, row: usize) -> &[u32] {
        &self.ids[row * self.max_len..(row + 1) * self.max_len]
    }

    pub fn row_mask(&self, row: usize) -> &[u32] {
        &self.mask[row * self.max_len..(row + 1) * self.max_len]
    }

    /// Number of real (non-pad) tokens in a row.
    pub fn row_len(&self, row: usize) -> usize {
        self.row_mask(row).iter().take_while(|&&m| m == 1).count()
    }
}

/// Tokenize `texts` into a `[texts.len(), max_len]` batch.
///
/// Sequences are truncated to `max_len` or right-padded with the tokenizer's pad id.
/// Any text that fails to encode fails the whole batch.
pub fn tokenize<S: AsRef<str>>(
    tokenizer: &dyn TextTokenizer,
    texts: &[S],
    max_len: usize,
) -> Result<TokenBatch, LarkError> {
    if max_len == 0 {
        return Err(LarkError::Validation("max_len must be positive".to_string()));
    }
    if texts.is_empty() {
        return Ok(TokenBatch::empty(max_len));
    }

    let pad_id = tokenizer.pad_id();
    let mut ids = Vec::with_capacity(texts.len() * max_len);
    let mut mask = Vec::with_capacity(texts.len() * max_len);

    for text in texts {
        let mut encoded = tokenizer.encode(text.as_ref())?;
        encoded.truncate(max_len);
        let real = encoded.len();

        ids.extend(encoded);
        ids.extend(std::iter::repeat(pad_id).take(max_len - real));
        mask.extend(std::iter::repeat(1).take(real));
        mask.extend(std::iter::repeat(0).take(max_len - real));
    }

    Ok(TokenBatch {
        ids,
        mask,
        batch_size: texts.len(),
        max_len,
    })
}
