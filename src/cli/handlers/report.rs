//! Classification report analysis handler.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use crate::cli::output::{output_json, print_header, print_hint, print_kv, print_table, OutputMode};
use crate::report::{analyze, parse_file};

/// Labels shown in the support ranking.
const RANKING_LIMIT: usize = 10;

fn percent(value: f64) -> String {
    format!("{:.4} ({:.2}%)", value, value * 100.0)
}

pub fn handle_report(file: &Path, mode: OutputMode) -> Result<()> {
    let summary = parse_file(file)?;
    let analysis = analyze(&summary);

    if mode == OutputMode::Json {
        output_json(&analysis);
        return Ok(());
    }

    print_header("Classification report");
    print_kv("Reported accuracy", &percent(analysis.reported_accuracy));
    print_kv(
        "Macro avg F1",
        &format!("{:.4}", analysis.macro_f1.unwrap_or(0.0)),
    );
    print_kv(
        "Weighted avg F1",
        &format!("{:.4}", analysis.weighted_f1.unwrap_or(0.0)),
    );

    print_header("Filtering");
    print_kv("Total labels", &analysis.total_labels.to_string());
    print_kv("Labels with samples", &analysis.labels_with_samples.to_string());
    print_kv(
        "Labels without samples",
        &analysis.zero_support_labels.len().to_string(),
    );
    if !analysis.zero_support_labels.is_empty() {
        print_kv("Without samples", &analysis.zero_support_labels.join(", "));
    }

    print_header("Accuracy comparison");
    print_kv("Reported", &percent(analysis.reported_accuracy));
    print_kv("Filtered", &percent(analysis.filtered_accuracy));
    if analysis.consistent {
        println!("  {}", "Consistent (difference negligible)".green());
    } else {
        println!(
            "  {} {:.6}",
            "Difference:".yellow().bold(),
            analysis.difference
        );
    }

    print_header("Totals");
    print_kv("Validation samples", &analysis.total_samples.to_string());
    print_kv(
        "Correct predictions (est.)",
        &format!("{:.0}", analysis.estimated_correct),
    );

    print_header("Labels by support");
    let rows: Vec<Vec<String>> = analysis
        .ranked_by_support
        .iter()
        .take(RANKING_LIMIT)
        .map(|m| {
            vec![
                m.label.clone(),
                m.support.to_string(),
                format!("{:.3}", m.recall),
                format!("{:.3}", m.f1),
            ]
        })
        .collect();
    print_table(&["Language", "Support", "Recall", "F1"], rows);

    if analysis.ranked_by_support.len() > RANKING_LIMIT {
        print_hint(&format!(
            "... {} more languages",
            analysis.ranked_by_support.len() - RANKING_LIMIT
        ));
    }
    Ok(())
}
