//! Filtered accuracy and report diagnostics.
//!
//! Filtered accuracy uses `recall * support` as the correct-prediction count per label.
//! That matches micro accuracy only when recall is computed per class against its own
//! support; the figure is a mismatch diagnostic, not a corrected accuracy.

use serde::{Deserialize, Serialize};

use crate::report::{ClassMetric, ReportSummary};

/// Reported and filtered accuracy closer than this are considered consistent.
pub const CONSISTENCY_TOLERANCE: f64 = 1e-4;

/// `Σ(recall × support) / Σ support` over labels with support, plus the zero-support labels.
///
/// Returns 0.0 when no label has support.
pub fn filtered_accuracy(summary: &ReportSummary) -> (f64, Vec<String>) {
    let mut zero_support = Vec::new();
    let mut total_samples = 0u64;
    let mut total_correct = 0.0f64;

    for metric in summary.labels() {
        if metric.support > 0 {
            total_samples += metric.support;
            total_correct += metric.recall * metric.support as f64;
        } else {
            zero_support.push(metric.label.clone());
        }
    }

    let accuracy = if total_samples > 0 {
        total_correct / total_samples as f64
    } else {
        0.0
    };

    (accuracy, zero_support)
}

/// Comparison of the reported accuracy with the filtered recomputation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyAnalysis {
    pub reported_accuracy: f64,
    pub filtered_accuracy: f64,
    pub difference: f64,
    pub consistent: bool,
    pub macro_f1: Option<f64>,
    pub weighted_f1: Option<f64>,
    pub total_labels: usize,
    pub labels_with_samples: usize,
    pub zero_support_labels: Vec<String>,
    pub total_samples: u64,
    /// Σ recall × support, the estimated number of correct predictions.
    pub estimated_correct: f64,
    /// Labels with samples, most-supported first; ties keep report order.
    pub ranked_by_support: Vec<ClassMetric>,
}

pub fn analyze(summary: &ReportSummary) -> AccuracyAnalysis {
    let (filtered, zero_support_labels) = filtered_accuracy(summary);
    let difference = (summary.overall_accuracy - filtered).abs();

    let mut ranked_by_support: Vec<ClassMetric> = summary
        .labels()
        .iter()
        .filter(|m| m.support > 0)
        .cloned()
        .collect();
    ranked_by_support.sort_by(|a, b| b.support.cmp(&a.support));

    let total_samples = summary.labels().iter().map(|m| m.support).sum();
    let estimated_correct = ranked_by_support
        .iter()
        .map(|m| m.recall * m.support as f64)
        .sum();

    AccuracyAnalysis {
        reported_accuracy: summary.overall_accuracy,
        filtered_accuracy: filtered,
        difference,
        consistent: difference < CONSISTENCY_TOLERANCE,
        macro_f1: summary.macro_avg.as_ref().map(|m| m.f1),
        weighted_f1: summary.weighted_avg.as_ref().map(|m| m.f1),
        total_labels: summary.labels().len(),
        labels_with_samples: ranked_by_support.len(),
        zero_support_labels,
        total_samples,
        estimated_correct,
        ranked_by_support,
    }
}
