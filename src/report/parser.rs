//! Tolerant parser for per-class classification reports.
//!
//! Each line is offered to a fixed list of classifiers in precedence order; the
//! first one that claims the line decides what it is. Lines nobody claims are skipped.

use std::path::Path;

use crate::report::{ClassMetric, ReportSummary};
use crate::LarkError;

/// What a single report line contributes to the summary.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportLine {
    /// Blank or decorative line.
    Header,
    /// Overall accuracy line; `None` when no number follows the `accuracy` token.
    Accuracy(Option<f64>),
    MacroAvg(Option<ClassMetric>),
    WeightedAvg(Option<ClassMetric>),
    Label(ClassMetric),
    Unrecognized,
}

type LineClassifier = fn(&str) -> Option<ReportLine>;

/// Classifiers in precedence order.
const CLASSIFIERS: &[LineClassifier] = &[
    header_line,
    accuracy_line,
    macro_avg_line,
    weighted_avg_line,
    label_line,
];

pub fn header_line(line: &str) -> Option<ReportLine> {
    (line.is_empty() || line.starts_with('=') || line.starts_with("Detailed"))
        .then_some(ReportLine::Header)
}

pub fn accuracy_line(line: &str) -> Option<ReportLine> {
    if !line.contains("accuracy") || line.starts_with("macro") || line.starts_with("weighted") {
        return None;
    }

    let value = line
        .split_whitespace()
        .skip_while(|part| *part != "accuracy")
        .skip(1)
        .find_map(|part| part.parse::<f64>().ok());
    Some(ReportLine::Accuracy(value))
}

pub fn macro_avg_line(line: &str) -> Option<ReportLine> {
    line.strip_prefix("macro avg")
        .map(|rest| ReportLine::MacroAvg(parse_metric_fields("macro avg", rest)))
}

pub fn weighted_avg_line(line: &str) -> Option<ReportLine> {
    line.strip_prefix("weighted avg")
        .map(|rest| ReportLine::WeightedAvg(parse_metric_fields("weighted avg", rest)))
}

pub fn label_line(line: &str) -> Option<ReportLine> {
    let (label, rest) = line.split_once(char::is_whitespace)?;
    parse_metric_fields(label, rest).map(ReportLine::Label)
}

/// Parse `precision recall f1 support` from the fields following a row label.
fn parse_metric_fields(label: &str, rest: &str) -> Option<ClassMetric> {
    let mut parts = rest.split_whitespace();
    let precision = parts.next()?.parse::<f64>().ok()?;
    let recall = parts.next()?.parse::<f64>().ok()?;
    let f1 = parts.next()?.parse::<f64>().ok()?;
    let support = parts.next()?.parse::<u64>().ok()?;

    Some(ClassMetric {
        label: label.to_string(),
        precision,
        recall,
        f1,
        support,
    })
}

/// Classify one line (surrounding whitespace is ignored).
pub fn classify_line(line: &str) -> ReportLine {
    let line = line.trim();
    CLASSIFIERS
        .iter()
        .find_map(|classifier| classifier(line))
        .unwrap_or(ReportLine::Unrecognized)
}

/// Parse a report. Never fails: unparseable lines are skipped.
pub fn parse(report_text: &str) -> ReportSummary {
    let mut summary = ReportSummary::default();

    for line in report_text.lines() {
        match classify_line(line) {
            ReportLine::Accuracy(Some(value)) => summary.overall_accuracy = value,
            ReportLine::MacroAvg(Some(metric)) => summary.macro_avg = Some(metric),
            ReportLine::WeightedAvg(Some(metric)) => summary.weighted_avg = Some(metric),
            ReportLine::Label(metric) => summary.upsert(metric),
            ReportLine::Header
            | ReportLine::Unrecognized
            | ReportLine::Accuracy(None)
            | ReportLine::MacroAvg(None)
            | ReportLine::WeightedAvg(None) => {
                tracing::trace!("Skipping report line: {:?}", line);
            }
        }
    }

    summary
}

/// Read and parse a UTF-8 report file.
pub fn parse_file(path: &Path) -> Result<ReportSummary, LarkError> {
    let text = std::fs::read_to_string(path)?;
    let summary = parse(&text);
    tracing::info!(
        "Parsed {} label rows from {}",
        summary.labels().len(),
        path.display()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lines() {
        assert_eq!(classify_line(""), ReportLine::Header);
        assert_eq!(classify_line("   "), ReportLine::Header);
        assert_eq!(classify_line("========"), ReportLine::Header);
        assert_eq!(classify_line("Detailed classification report:"), ReportLine::Header);
    }

    #[test]
    fn test_accuracy_takes_first_number_after_token() {
        assert_eq!(
            classify_line("    accuracy                           0.9512     10000"),
            ReportLine::Accuracy(Some(0.9512))
        );
        assert_eq!(
            classify_line("accuracy : 0.80"),
            ReportLine::Accuracy(Some(0.80))
        );
    }

    #[test]
    fn test_accuracy_without_value_is_claimed_but_empty() {
        assert_eq!(
            classify_line("val_accuracy 0.5 0.5 0.5 10"),
            ReportLine::Accuracy(None)
        );
    }

    #[test]
    fn test_macro_and_weighted_rows() {
        let macro_row = classify_line("   macro avg       0.91      0.89      0.90     10000");
        match macro_row {
            ReportLine::MacroAvg(Some(m)) => {
                assert_eq!(m.label, "macro avg");
                assert_eq!(m.recall, 0.89);
                assert_eq!(m.support, 10000);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            classify_line("weighted avg 0.95 0.95 0.95 10000"),
            ReportLine::WeightedAvg(Some(_))
        ));
    }

    #[test]
    fn test_malformed_avg_row_does_not_become_label() {
        assert_eq!(classify_line("macro avg n/a n/a"), ReportLine::MacroAvg(None));
    }

    #[test]
    fn test_label_row() {
        let line = classify_line("          en      0.980     0.990     0.985      1200");
        assert_eq!(
            line,
            ReportLine::Label(ClassMetric {
                label: "en".to_string(),
                precision: 0.98,
                recall: 0.99,
                f1: 0.985,
                support: 1200,
            })
        );
    }

    #[test]
    fn test_column_header_and_fractional_support_unrecognized() {
        assert_eq!(
            classify_line("precision    recall  f1-score   support"),
            ReportLine::Unrecognized
        );
        assert_eq!(
            classify_line("en 0.9 0.9 0.9 12.5"),
            ReportLine::Unrecognized
        );
    }

    #[test]
    fn test_parse_skips_garbage_and_keeps_order() {
        let summary = parse(
            "Detailed report\n\
             ===\n\
             zh 0.5 0.5 0.5 4\n\
             some random note\n\
             en 1.0 1.0 1.0 2\n",
        );
        let labels: Vec<&str> = summary.labels().iter().map(|m| m.label.as_str()).collect();
        assert_eq!(labels, vec!["zh", "en"]);
        assert_eq!(summary.overall_accuracy, 0.0);
        assert!(summary.macro_avg.is_none());
    }

    #[test]
    fn test_duplicate_label_keeps_position_takes_latest_values() {
        let summary = parse("en 0.1 0.1 0.1 1\nfr 0.2 0.2 0.2 2\nen 0.9 0.9 0.9 9\n");
        assert_eq!(summary.labels().len(), 2);
        assert_eq!(summary.labels()[0].label, "en");
        assert_eq!(summary.labels()[0].support, 9);
    }

    #[test]
    fn test_parse_file_missing_is_io_error() {
        let result = parse_file(Path::new("/nonexistent/report.txt"));
        assert!(matches!(result, Err(LarkError::Io(_))));
    }
}
