//! Classification report analysis.
//!
//! Parses per-language evaluation reports and recomputes accuracy without the
//! labels that have no validation samples.

pub mod analysis;
pub mod parser;

pub use analysis::{analyze, filtered_accuracy, AccuracyAnalysis, CONSISTENCY_TOLERANCE};
pub use parser::{classify_line, parse, parse_file, ReportLine};

use serde::{Deserialize, Serialize};

/// Metrics for one report row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetric {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: u64,
}

/// Parsed report: overall accuracy, aggregate rows, and per-label rows in report order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub overall_accuracy: f64,
    pub macro_avg: Option<ClassMetric>,
    pub weighted_avg: Option<ClassMetric>,
    labels: Vec<ClassMetric>,
}

impl ReportSummary {
    /// Build a summary from label rows; later duplicates replace earlier ones in place.
    pub fn from_labels(labels: impl IntoIterator<Item = ClassMetric>) -> Self {
        let mut summary = Self::default();
        for metric in labels {
            summary.upsert(metric);
        }
        summary
    }

    pub fn labels(&self) -> &[ClassMetric] {
        &self.labels
    }

    pub fn get(&self, label: &str) -> Option<&ClassMetric> {
        self.labels.iter().find(|m| m.label == label)
    }

    pub(crate) fn upsert(&mut self, metric: ClassMetric) {
        match self.labels.iter_mut().find(|m| m.label == metric.label) {
            Some(existing) => *existing = metric,
            None => self.labels.push(metric),
        }
    }
}
