//! Detection through tokenizer, scoring backend and decision layer.

mod common;

use std::sync::Arc;

use common::{detector_with, FailingOracle, FixedOracle, RecordingOracle};
use lark::LarkError;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

#[test]
fn chunk_of_one_calls_backend_once_per_text_in_order() {
    let oracle = Arc::new(RecordingOracle::new());
    let detector = detector_with(oracle.clone());

    let results = detector
        .detect_batch(&["Hello world", "Bonjour le monde"], 1)
        .expect("batch");

    assert_eq!(
        oracle.calls(),
        vec![
            vec!["Hello world".to_string()],
            vec!["Bonjour le monde".to_string()],
        ]
    );
    let labels: Vec<&str> = results.iter().map(|d| d.label.as_str()).collect();
    assert_eq!(labels, vec!["en", "fr"]);
}

#[test]
fn chunks_split_batch_with_short_tail() {
    let oracle = Arc::new(RecordingOracle::new());
    let detector = detector_with(oracle.clone());

    detector
        .detect_batch(&["a", "b", "c", "d", "e"], 2)
        .expect("batch");

    let sizes: Vec<usize> = oracle.calls().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![2, 2, 1]);
}

#[test]
fn empty_batch_never_reaches_backend() {
    let oracle = Arc::new(RecordingOracle::new());
    let detector = detector_with(oracle.clone());

    let results = detector.detect_batch::<&str>(&[], 4).expect("batch");

    assert!(results.is_empty());
    assert!(oracle.calls().is_empty());
}

#[test]
fn long_text_is_truncated_before_scoring() {
    let oracle = Arc::new(RecordingOracle::new());
    let detector = detector_with(oracle.clone());

    detector.detect(&"x".repeat(500)).expect("detect");

    // One slot goes to the classification token.
    assert_eq!(oracle.calls()[0][0].len(), detector.max_len() - 1);
}

#[test]
fn threshold_turns_confident_label_into_unknown() {
    let detector = detector_with(Arc::new(RecordingOracle::new()));

    let confident = detector
        .detect_with_confidence("Hallo Welt", 0.5, 3)
        .expect("detect");
    let strict = detector
        .detect_with_confidence("Hallo Welt", 0.999, 3)
        .expect("detect");

    assert_eq!(confident.label, "de");
    assert_eq!(strict.label, "unknown");
    assert_eq!(strict.confidence, confident.confidence);
    assert_eq!(strict.ranked.len(), 3);
    assert_eq!(strict.ranked[0].label, "de");
}

#[test]
fn topk_out_of_range_is_validation_error() {
    let detector = detector_with(Arc::new(RecordingOracle::new()));
    assert!(matches!(
        detector.detect_with_topk("Hello", 4),
        Err(LarkError::Validation(_))
    ));
    assert!(matches!(
        detector.detect_with_topk("Hello", 0),
        Err(LarkError::Validation(_))
    ));
}

#[test]
fn backend_failure_surfaces_as_scoring_unavailable() {
    let detector = detector_with(Arc::new(FailingOracle));
    let err = detector.detect_batch(&["Hello"], 1).unwrap_err();
    assert!(matches!(err, LarkError::ScoringUnavailable { .. }));
}

#[test]
fn non_finite_backend_scores_are_rejected() {
    for bad in [f32::INFINITY, f32::NAN] {
        let detector = detector_with(Arc::new(FixedOracle(vec![bad, 0.0, 1.0])));

        let err = detector
            .detect_with_confidence("Hallo", 0.9, 3)
            .unwrap_err();
        assert!(matches!(err, LarkError::ScoringUnavailable { .. }));
        assert!(detector.detect_batch(&["Hallo"], 1).is_err());
    }
}

proptest! {
    #[test]
    fn batch_results_match_single_detection(
        texts in prop::collection::vec("[a-zA-Z ]{1,20}", 0..12),
        chunk_size in 1usize..6,
    ) {
        let detector = detector_with(Arc::new(RecordingOracle::new()));
        let batch = detector.detect_batch(&texts, chunk_size).expect("batch");
        prop_assert_eq!(batch.len(), texts.len());
        for (text, detection) in texts.iter().zip(&batch) {
            let single = detector.detect(text).expect("detect");
            prop_assert_eq!(&single, detection);
        }
    }

    #[test]
    fn probabilities_sum_to_one(text in "[a-zA-Z ]{1,40}") {
        let detector = detector_with(Arc::new(RecordingOracle::new()));
        let rows = detector.probabilities(&[text]).expect("probabilities");
        let sum: f32 = rows[0].values().iter().sum();
        prop_assert!((sum - 1.0).abs() < 1e-5);
    }
}
