//! Shared fixtures: a recording scoring backend and detector builders.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use lark::detector::LarkDetector;
use lark::inference::{ByteTokenizer, ScoreOutput, ScoringOracle, TokenBatch};
use lark::labels::LabelVocabulary;
use lark::LarkError;

pub const LABELS: [&str; 3] = ["de", "en", "fr"];

/// Backend that records every batch it sees and scores by a keyword rule.
///
/// Rows whose text contains "Bonjour" favour `fr`, "Hallo" favours `de`,
/// anything else favours `en`.
#[derive(Default)]
pub struct RecordingOracle {
    calls: Mutex<Vec<Vec<String>>>,
}

impl RecordingOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Texts of every recorded call, in call order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().expect("calls lock").clone()
    }
}

/// Reverse the byte tokenizer: drop the leading CLS and trailing padding.
fn decode_row(batch: &TokenBatch, row: usize) -> String {
    let bytes: Vec<u8> = batch
        .row_ids(row)
        .iter()
        .zip(batch.row_mask(row))
        .skip(1)
        .filter(|(_, m)| **m == 1)
        .map(|(id, _)| (*id - 2) as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

impl ScoringOracle for RecordingOracle {
    fn score(&self, batch: &TokenBatch) -> Result<ScoreOutput, LarkError> {
        let texts: Vec<String> = (0..batch.batch_size())
            .map(|row| decode_row(batch, row))
            .collect();
        let rows = texts
            .iter()
            .map(|text| {
                if text.contains("Bonjour") {
                    vec![0.0, 1.0, 5.0]
                } else if text.contains("Hallo") {
                    vec![5.0, 1.0, 0.0]
                } else {
                    vec![0.0, 5.0, 1.0]
                }
            })
            .collect();
        self.calls.lock().expect("calls lock").push(texts);
        Ok(ScoreOutput::PerSample(rows))
    }

    fn num_labels(&self) -> usize {
        LABELS.len()
    }

    fn max_sequence_length(&self) -> usize {
        128
    }
}

/// Keyword backend that holds any batch containing [`SLOW_MARKER`] for a while
/// and logs the texts of each batch as it completes.
#[derive(Default)]
pub struct DelayedOracle {
    inner: RecordingOracle,
    finished: Mutex<Vec<Vec<String>>>,
}

pub const SLOW_MARKER: &str = "slow";

impl DelayedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Texts of every completed call, in completion order.
    pub fn finished(&self) -> Vec<Vec<String>> {
        self.finished.lock().expect("finished lock").clone()
    }
}

impl ScoringOracle for DelayedOracle {
    fn score(&self, batch: &TokenBatch) -> Result<ScoreOutput, LarkError> {
        let texts: Vec<String> = (0..batch.batch_size())
            .map(|row| decode_row(batch, row))
            .collect();
        if texts.iter().any(|t| t.contains(SLOW_MARKER)) {
            std::thread::sleep(Duration::from_millis(300));
        }
        let output = self.inner.score(batch)?;
        self.finished.lock().expect("finished lock").push(texts);
        Ok(output)
    }

    fn num_labels(&self) -> usize {
        LABELS.len()
    }

    fn max_sequence_length(&self) -> usize {
        128
    }
}

/// Backend that returns the same score row for every sample.
pub struct FixedOracle(pub Vec<f32>);

impl ScoringOracle for FixedOracle {
    fn score(&self, batch: &TokenBatch) -> Result<ScoreOutput, LarkError> {
        Ok(ScoreOutput::PerSample(vec![self.0.clone(); batch.batch_size()]))
    }

    fn num_labels(&self) -> usize {
        self.0.len()
    }

    fn max_sequence_length(&self) -> usize {
        128
    }
}

/// Backend that always fails.
pub struct FailingOracle;

impl ScoringOracle for FailingOracle {
    fn score(&self, _batch: &TokenBatch) -> Result<ScoreOutput, LarkError> {
        Err(LarkError::scoring("backend offline"))
    }

    fn num_labels(&self) -> usize {
        LABELS.len()
    }

    fn max_sequence_length(&self) -> usize {
        128
    }
}

pub fn vocabulary() -> Arc<LabelVocabulary> {
    Arc::new(
        LabelVocabulary::new(LABELS.iter().map(|s| s.to_string()).collect())
            .expect("test vocabulary"),
    )
}

pub fn detector_with(oracle: Arc<dyn ScoringOracle>) -> LarkDetector {
    LarkDetector::new(vocabulary(), oracle, Arc::new(ByteTokenizer), 64).expect("test detector")
}
