//! Detection handlers for CLI.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use crate::cli::output::{
    create_progress_bar, create_spinner, format_probability, output_json, print_error,
    print_header, print_kv, print_table, print_warning, preview, OutputMode,
};
use crate::detector::Detection;
use crate::init::AppContext;
use crate::service::{LanguageDetectionService, LocalDetectionService};

pub async fn handle_detect(
    ctx: &AppContext,
    text: &str,
    top_k: Option<usize>,
    threshold: Option<f32>,
    mode: OutputMode,
) -> Result<()> {
    let k = top_k.unwrap_or(ctx.config.top_k);
    let threshold = threshold.unwrap_or(ctx.config.confidence_threshold);

    let service = LocalDetectionService::new(ctx.detector.clone(), 1);
    let prediction = service.detect_with_confidence(text, threshold, k).await?;

    if mode == OutputMode::Json {
        output_json(&prediction);
        return Ok(());
    }

    let top = prediction
        .ranked
        .first()
        .map(|r| r.label.as_str())
        .unwrap_or("-");

    print_header("Results");
    print_kv("Predicted language", top);
    print_kv("Confidence", &format_probability(prediction.confidence));

    let rows: Vec<Vec<String>> = prediction
        .ranked
        .iter()
        .enumerate()
        .map(|(i, r)| {
            vec![
                (i + 1).to_string(),
                r.label.clone(),
                format_probability(r.probability),
            ]
        })
        .collect();
    print_table(&["#", "Language", "Probability"], rows);

    if prediction.is_unknown() {
        println!(
            "  {} confidence below {}: {}",
            "Low".yellow().bold(),
            threshold,
            format_probability(prediction.confidence)
        );
    } else {
        println!(
            "  {} confidence at or above {}: {}",
            "High".green().bold(),
            threshold,
            format_probability(prediction.confidence)
        );
    }

    if !ctx.weights_loaded() {
        print_warning("Model weights were not loaded; predictions are unreliable.");
    }
    Ok(())
}

/// Read one text per non-blank line from a file, or stdin when no file is given.
fn read_texts(file: Option<&Path>) -> Result<Vec<String>> {
    let content = if let Some(path) = file {
        std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read file '{}': {}", path.display(), e))?
    } else {
        use std::io::Read;
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| anyhow::anyhow!("Failed to read stdin: {}", e))?;
        buf
    };

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

#[derive(Serialize)]
struct BatchRow<'a> {
    text: &'a str,
    #[serde(flatten)]
    detection: &'a Detection,
}

pub async fn handle_batch(
    ctx: &AppContext,
    file: Option<&Path>,
    chunk_size: Option<usize>,
    mode: OutputMode,
) -> Result<()> {
    let texts = read_texts(file)?;
    if texts.is_empty() {
        print_error("No valid texts found in input.");
        return Ok(());
    }

    let chunk_size = chunk_size.unwrap_or(ctx.config.chunk_size);
    let results = if ctx.config.concurrency > 1 {
        let spinner = create_spinner(&format!("Processing {} texts...", texts.len()));
        let service = LocalDetectionService::new(ctx.detector.clone(), ctx.config.concurrency);
        let results = service.detect_batch(&texts, chunk_size).await;
        spinner.finish_and_clear();
        results?
    } else {
        let bar = create_progress_bar(texts.len() as u64, "Processing");
        let detector = ctx.detector.clone();
        let bar_handle = bar.clone();
        let batch = texts.clone();
        let results = tokio::task::spawn_blocking(move || {
            detector.detect_batch_with_progress(&batch, chunk_size, |done, _| {
                bar_handle.set_position(done as u64)
            })
        })
        .await?;
        bar.finish_and_clear();
        results?
    };

    if mode == OutputMode::Json {
        let rows: Vec<BatchRow> = texts
            .iter()
            .zip(&results)
            .map(|(text, detection)| BatchRow { text, detection })
            .collect();
        output_json(&rows);
        return Ok(());
    }

    let rows: Vec<Vec<String>> = texts
        .iter()
        .zip(&results)
        .enumerate()
        .map(|(i, (text, d))| {
            vec![
                (i + 1).to_string(),
                preview(text, 30),
                d.label.clone(),
                format_probability(d.confidence),
            ]
        })
        .collect();
    print_table(&["No.", "Text Preview", "Language", "Confidence"], rows);
    Ok(())
}

/// Group codes by upper-cased first character, each group sorted.
pub fn group_by_initial(languages: &[String]) -> BTreeMap<String, Vec<String>> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for lang in languages {
        let key = lang
            .chars()
            .next()
            .map(|c| c.to_uppercase().to_string())
            .unwrap_or_else(|| "Other".to_string());
        grouped.entry(key).or_default().push(lang.clone());
    }
    for group in grouped.values_mut() {
        group.sort();
    }
    grouped
}

pub fn handle_languages(ctx: &AppContext, mode: OutputMode) -> Result<()> {
    let languages = ctx.detector.supported_languages();

    if mode == OutputMode::Json {
        output_json(languages);
        return Ok(());
    }

    print_header(&format!("Supported languages ({})", languages.len()));
    for (initial, group) in group_by_initial(languages) {
        println!("{}: {}", initial.bold(), group.join(", "));
    }
    Ok(())
}
