//! Language detector: tokenizer, scoring backend and decision layer behind one handle.
//!
//! [`LarkDetector`] is constructed explicitly and cloned cheaply; the label vocabulary,
//! tokenizer and backend are shared read-only behind `Arc`s.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decision::{self, Prediction, ProbabilityRow, RankedLabel};
use crate::inference::{tokenize, ScoreMatrix, ScoringOracle, TextTokenizer};
use crate::labels::LabelVocabulary;
use crate::LarkError;

/// Top-1 result for one text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
}

#[derive(Clone)]
pub struct LarkDetector {
    vocab: Arc<LabelVocabulary>,
    oracle: Arc<dyn ScoringOracle>,
    tokenizer: Arc<dyn TextTokenizer>,
    max_len: usize,
}

impl std::fmt::Debug for LarkDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LarkDetector")
            .field("labels", &self.vocab.len())
            .field("max_len", &self.max_len)
            .finish()
    }
}

impl LarkDetector {
    /// Assemble a detector.
    ///
    /// The backend must score exactly one value per vocabulary label, and `max_len`
    /// must not exceed what the backend accepts.
    pub fn new(
        vocab: Arc<LabelVocabulary>,
        oracle: Arc<dyn ScoringOracle>,
        tokenizer: Arc<dyn TextTokenizer>,
        max_len: usize,
    ) -> Result<Self, LarkError> {
        if oracle.num_labels() != vocab.len() {
            return Err(LarkError::Validation(format!(
                "Scoring backend emits {} labels but the vocabulary has {}",
                oracle.num_labels(),
                vocab.len()
            )));
        }
        if max_len == 0 || max_len > oracle.max_sequence_length() {
            return Err(LarkError::Validation(format!(
                "max_len must be between 1 and {}, got {}",
                oracle.max_sequence_length(),
                max_len
            )));
        }

        Ok(Self {
            vocab,
            oracle,
            tokenizer,
            max_len,
        })
    }

    pub fn labels(&self) -> &LabelVocabulary {
        &self.vocab
    }

    /// Language codes the detector can emit, in id order.
    pub fn supported_languages(&self) -> &[String] {
        self.vocab.codes()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// One tokenize/score/softmax round trip over `texts`.
    pub fn probabilities<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<ProbabilityRow>, LarkError> {
        let batch = tokenize(self.tokenizer.as_ref(), texts, self.max_len)?;
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let output = self.oracle.score(&batch)?;
        let scores = ScoreMatrix::from_output(output, batch.batch_size(), self.vocab.len())?;
        Ok(scores.rows().iter().map(|row| decision::decide(row)).collect())
    }

    fn single(&self, text: &str) -> Result<ProbabilityRow, LarkError> {
        self.probabilities(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| LarkError::scoring("Empty scoring result"))
    }

    /// Most probable language for one text.
    pub fn detect(&self, text: &str) -> Result<Detection, LarkError> {
        let (label, confidence) = decision::classify(&self.single(text)?, &self.vocab)?;
        Ok(Detection { label, confidence })
    }

    /// Top-1 plus the `k` most probable languages.
    pub fn detect_with_topk(
        &self,
        text: &str,
        k: usize,
    ) -> Result<(Detection, Vec<RankedLabel>), LarkError> {
        let probs = self.single(text)?;
        let (label, confidence) = decision::classify(&probs, &self.vocab)?;
        let ranked = decision::rank(&probs, k, &self.vocab)?;
        Ok((Detection { label, confidence }, ranked))
    }

    /// Top-1 gated by `threshold`: below it the label becomes `"unknown"`.
    pub fn detect_with_confidence(
        &self,
        text: &str,
        threshold: f32,
        k: usize,
    ) -> Result<Prediction, LarkError> {
        decision::validate_threshold(threshold)?;
        let probs = self.single(text)?;
        decision::classify_with_threshold(&probs, &self.vocab, threshold, k)
    }

    /// Detect every text, processing at most `chunk_size` texts per backend call.
    ///
    /// Results are in input order. The first failing chunk aborts the call.
    pub fn detect_batch<S: AsRef<str>>(
        &self,
        texts: &[S],
        chunk_size: usize,
    ) -> Result<Vec<Detection>, LarkError> {
        self.detect_batch_with_progress(texts, chunk_size, |_, _| {})
    }

    /// [`detect_batch`](Self::detect_batch) reporting `(processed, total)` after each chunk.
    pub fn detect_batch_with_progress<S, F>(
        &self,
        texts: &[S],
        chunk_size: usize,
        mut on_chunk: F,
    ) -> Result<Vec<Detection>, LarkError>
    where
        S: AsRef<str>,
        F: FnMut(usize, usize),
    {
        if chunk_size == 0 {
            return Err(LarkError::Validation(
                "chunk_size must be positive".to_string(),
            ));
        }

        let total = texts.len();
        let mut results = Vec::with_capacity(total);

        for (idx, chunk) in texts.chunks(chunk_size).enumerate() {
            debug!(chunk = idx, size = chunk.len(), "Scoring chunk");
            for probs in self.probabilities(chunk)? {
                let (label, confidence) = decision::classify(&probs, &self.vocab)?;
                results.push(Detection { label, confidence });
            }
            on_chunk(results.len(), total);
        }

        Ok(results)
    }
}
