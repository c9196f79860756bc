//! Async language detection service.
//!
//! Runs the blocking detector on `spawn_blocking` workers. Batch detection can keep
//! several chunks in flight; results are buffered in input order before returning.

use std::sync::Arc;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use tracing::debug;

use crate::decision::Prediction;
use crate::detector::{Detection, LarkDetector};
use crate::LarkError;

/// Service trait for language detection.
#[async_trait]
pub trait LanguageDetectionService: Send + Sync {
    /// Most probable language for one text.
    async fn detect(&self, text: &str) -> Result<Detection, LarkError>;

    /// Threshold-gated prediction with a top-k ranking.
    async fn detect_with_confidence(
        &self,
        text: &str,
        threshold: f32,
        k: usize,
    ) -> Result<Prediction, LarkError>;

    /// Detect many texts in chunks of `chunk_size`, preserving input order.
    async fn detect_batch(
        &self,
        texts: &[String],
        chunk_size: usize,
    ) -> Result<Vec<Detection>, LarkError>;

    /// Whether a detector is loaded.
    fn is_available(&self) -> bool;
}

/// Local detection service backed by a [`LarkDetector`].
pub struct LocalDetectionService {
    detector: Arc<LarkDetector>,
    concurrency: usize,
}

impl LocalDetectionService {
    /// `concurrency` is the number of chunks scored at once (minimum 1).
    pub fn new(detector: Arc<LarkDetector>, concurrency: usize) -> Self {
        Self {
            detector,
            concurrency: concurrency.max(1),
        }
    }

    async fn run_blocking<T, F>(&self, f: F) -> Result<T, LarkError>
    where
        T: Send + 'static,
        F: FnOnce(&LarkDetector) -> Result<T, LarkError> + Send + 'static,
    {
        let detector = self.detector.clone();
        tokio::task::spawn_blocking(move || f(&detector))
            .await
            .map_err(|e| LarkError::ScoringUnavailable {
                message: format!("Task join error: {}", e),
                source: Some(Box::new(e)),
            })?
    }
}

#[async_trait]
impl LanguageDetectionService for LocalDetectionService {
    async fn detect(&self, text: &str) -> Result<Detection, LarkError> {
        let text = text.to_string();
        self.run_blocking(move |d| d.detect(&text)).await
    }

    async fn detect_with_confidence(
        &self,
        text: &str,
        threshold: f32,
        k: usize,
    ) -> Result<Prediction, LarkError> {
        let text = text.to_string();
        self.run_blocking(move |d| d.detect_with_confidence(&text, threshold, k))
            .await
    }

    async fn detect_batch(
        &self,
        texts: &[String],
        chunk_size: usize,
    ) -> Result<Vec<Detection>, LarkError> {
        if chunk_size == 0 {
            return Err(LarkError::Validation(
                "chunk_size must be positive".to_string(),
            ));
        }
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let chunks: Vec<Vec<String>> = texts.chunks(chunk_size).map(<[String]>::to_vec).collect();
        debug!(
            chunks = chunks.len(),
            concurrency = self.concurrency,
            "Dispatching batch"
        );

        // `buffered` yields in submission order even when later chunks finish first.
        let per_chunk: Vec<Vec<Detection>> = futures::stream::iter(chunks)
            .map(|chunk| {
                self.run_blocking(move |d| {
                    let size = chunk.len();
                    d.detect_batch(&chunk, size)
                })
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        Ok(per_chunk.into_iter().flatten().collect())
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// No-op detection service for contexts without a model.
pub struct NoopDetectionService;

impl Default for NoopDetectionService {
    fn default() -> Self {
        Self::new()
    }
}

impl NoopDetectionService {
    pub fn new() -> Self {
        Self
    }
}

fn unavailable() -> LarkError {
    LarkError::scoring("Detection service is not available (noop)")
}

#[async_trait]
impl LanguageDetectionService for NoopDetectionService {
    async fn detect(&self, _text: &str) -> Result<Detection, LarkError> {
        Err(unavailable())
    }

    async fn detect_with_confidence(
        &self,
        _text: &str,
        _threshold: f32,
        _k: usize,
    ) -> Result<Prediction, LarkError> {
        Err(unavailable())
    }

    async fn detect_batch(
        &self,
        _texts: &[String],
        _chunk_size: usize,
    ) -> Result<Vec<Detection>, LarkError> {
        Err(unavailable())
    }

    fn is_available(&self) -> bool {
        false
    }
}
