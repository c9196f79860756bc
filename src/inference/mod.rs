//! Inference plumbing: tokenization, batching, and the scoring backend boundary.
//!
//! The [`ScoringOracle`] trait abstracts the model so the decision pipeline can run
//! against any backend that maps a [`TokenBatch`] to per-label scores. The candle
//! encoder in [`candle_backend`] is the bundled implementation.

pub mod batch;
pub mod candle_backend;
pub mod tokenizer;

pub use batch::{tokenize, TokenBatch};
pub use candle_backend::{download_model, select_device, CandleScorer, EncoderConfig, ModelFiles};
pub use tokenizer::{ByteTokenizer, HfTokenizer, TextTokenizer};

use crate::LarkError;

/// Raw backend output before reduction to one row per sample.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreOutput {
    /// `[batch, labels]`
    PerSample(Vec<Vec<f32>>),
    /// `[batch, positions, labels]`; only position 0 is read.
    PerToken(Vec<Vec<Vec<f32>>>),
}

/// Sample-level scores, `[batch, labels]`, unnormalised.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreMatrix {
    rows: Vec<Vec<f32>>,
}

impl ScoreMatrix {
    /// Reduce backend output to one score row per sample and check its shape.
    pub fn from_output(
        output: ScoreOutput,
        batch_size: usize,
        num_labels: usize,
    ) -> Result<Self, LarkError> {
        let rows = match output {
            ScoreOutput::PerSample(rows) => rows,
            ScoreOutput::PerToken(samples) => samples
                .into_iter()
                .map(|positions| {
                    positions.into_iter().next().ok_or_else(|| {
                        LarkError::scoring("Per-token scores have no positions")
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
        };

        if rows.len() != batch_size {
            return Err(LarkError::scoring(format!(
                "Expected {} score rows, got {}",
                batch_size,
                rows.len()
            )));
        }
        if let Some(bad) = rows.iter().find(|r| r.len() != num_labels) {
            return Err(LarkError::scoring(format!(
                "Expected {} scores per row, got {}",
                num_labels,
                bad.len()
            )));
        }
        if let Some(row) = rows.iter().position(|r| r.iter().any(|s| !s.is_finite())) {
            return Err(LarkError::scoring(format!(
                "Non-finite score in row {}",
                row
            )));
        }

        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[Vec<f32>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<f32>> {
        self.rows
    }
}

/// Scoring backend: a pure function from token batches to per-label scores.
pub trait ScoringOracle: Send + Sync {
    fn score(&self, batch: &TokenBatch) -> Result<ScoreOutput, LarkError>;

    /// Number of labels each score row carries.
    fn num_labels(&self) -> usize;

    /// Longest sequence the backend accepts.
    fn max_sequence_length(&self) -> usize;
}
