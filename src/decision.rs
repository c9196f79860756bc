//! Decision layer: turns raw score rows into calibrated, ranked, thresholded predictions.

use serde::{Deserialize, Serialize};

use crate::labels::LabelVocabulary;
use crate::LarkError;

/// Label reported when the top probability falls below the confidence threshold.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Softmax output for one sample: non-negative, sums to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityRow(Vec<f32>);

impl ProbabilityRow {
    pub fn values(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Index and value of the highest probability; the lowest index wins exact ties.
    pub fn argmax(&self) -> Option<(usize, f32)> {
        self.0
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best, (idx, p)| match best {
                Some((_, bp)) if p <= bp => best,
                _ => Some((idx, p)),
            })
    }
}

/// One entry of a top-k ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedLabel {
    pub label: String,
    pub probability: f32,
}

/// Thresholded decision for one text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Language code, or [`UNKNOWN_LABEL`] when below threshold.
    pub label: String,
    pub confidence: f32,
    pub ranked: Vec<RankedLabel>,
}

impl Prediction {
    pub fn is_unknown(&self) -> bool {
        self.label == UNKNOWN_LABEL
    }
}

/// Numerically stable softmax over one score row.
pub fn decide(scores: &[f32]) -> ProbabilityRow {
    if scores.is_empty() {
        return ProbabilityRow(Vec::new());
    }

    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();

    ProbabilityRow(exps.into_iter().map(|e| e / sum).collect())
}

/// The `k` most probable label ids, descending; exact ties are ordered by ascending id.
pub fn topk(probs: &ProbabilityRow, k: usize) -> Result<Vec<(usize, f32)>, LarkError> {
    if k == 0 || k > probs.len() {
        return Err(LarkError::Validation(format!(
            "k must be between 1 and {}, got {}",
            probs.len(),
            k
        )));
    }

    let mut indexed: Vec<(usize, f32)> = probs.values().iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    indexed.truncate(k);
    Ok(indexed)
}

fn code_for(vocab: &LabelVocabulary, id: usize) -> Result<String, LarkError> {
    vocab.code(id).map(str::to_string).ok_or_else(|| {
        LarkError::Validation(format!(
            "Label id {} outside vocabulary of {} labels",
            id,
            vocab.len()
        ))
    })
}

/// Top-k ranking with label codes attached.
pub fn rank(
    probs: &ProbabilityRow,
    k: usize,
    vocab: &LabelVocabulary,
) -> Result<Vec<RankedLabel>, LarkError> {
    topk(probs, k)?
        .into_iter()
        .map(|(id, probability)| {
            Ok(RankedLabel {
                label: code_for(vocab, id)?,
                probability,
            })
        })
        .collect()
}

/// Most probable label and its probability.
pub fn classify(probs: &ProbabilityRow, vocab: &LabelVocabulary) -> Result<(String, f32), LarkError> {
    let (id, confidence) = probs
        .argmax()
        .ok_or_else(|| LarkError::Validation("Cannot classify an empty row".to_string()))?;
    Ok((code_for(vocab, id)?, confidence))
}

/// Classify and replace the label with [`UNKNOWN_LABEL`] when confidence < `threshold`.
///
/// Confidence and ranking are reported unchanged regardless of the threshold.
pub fn classify_with_threshold(
    probs: &ProbabilityRow,
    vocab: &LabelVocabulary,
    threshold: f32,
    k: usize,
) -> Result<Prediction, LarkError> {
    validate_threshold(threshold)?;

    let (label, confidence) = classify(probs, vocab)?;
    let ranked = rank(probs, k, vocab)?;
    let label = if confidence < threshold {
        UNKNOWN_LABEL.to_string()
    } else {
        label
    };

    Ok(Prediction {
        label,
        confidence,
        ranked,
    })
}

pub(crate) fn validate_threshold(threshold: f32) -> Result<(), LarkError> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(LarkError::Validation(format!(
            "Confidence threshold must be within [0, 1], got {}",
            threshold
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab(n: usize) -> LabelVocabulary {
        LabelVocabulary::new((0..n).map(|i| format!("l{}", i)).collect()).expect("vocab")
    }

    #[test]
    fn test_decide_sums_to_one() {
        let probs = decide(&[1.0, 2.0, 3.0]);
        let sum: f32 = probs.values().iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(probs.values()[2] > probs.values()[1]);
    }

    #[test]
    fn test_decide_is_stable_for_large_scores() {
        let probs = decide(&[1000.0, 1000.0, -1000.0]);
        assert!(probs.values().iter().all(|p| p.is_finite()));
        assert!((probs.values()[0] - 0.5).abs() < 1e-6);
        assert_eq!(probs.values()[2], 0.0);
    }

    #[test]
    fn test_decide_is_bit_identical_across_calls() {
        let scores = [0.3, -1.7, 2.25, 0.0];
        let a = decide(&scores);
        let b = decide(&scores);
        let bits = |r: &ProbabilityRow| r.values().iter().map(|p| p.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&a), bits(&b));
    }

    #[test]
    fn test_topk_orders_ties_by_id() {
        let probs = ProbabilityRow(vec![0.2, 0.4, 0.2, 0.2]);
        let top = topk(&probs, 3).expect("topk");
        assert_eq!(top, vec![(1, 0.4), (0, 0.2), (2, 0.2)]);
    }

    #[test]
    fn test_topk_rejects_out_of_range_k() {
        let probs = decide(&[0.0, 1.0]);
        assert!(topk(&probs, 0).is_err());
        assert!(topk(&probs, 3).is_err());
        assert_eq!(topk(&probs, 2).expect("k = L").len(), 2);
    }

    #[test]
    fn test_classify_picks_argmax() {
        let v = vocab(3);
        let probs = decide(&[0.1, 5.0, 0.2]);
        let (label, confidence) = classify(&probs, &v).expect("classify");
        assert_eq!(label, "l1");
        assert_eq!(confidence, probs.values()[1]);
    }

    #[test]
    fn test_classify_tie_prefers_lowest_id() {
        let v = vocab(3);
        let probs = decide(&[1.0, 3.0, 3.0]);
        assert_eq!(classify(&probs, &v).expect("classify").0, "l1");
    }

    #[test]
    fn test_threshold_zero_always_accepts() {
        let v = vocab(4);
        let probs = decide(&[0.0, 0.0, 0.0, 0.0]);
        let prediction = classify_with_threshold(&probs, &v, 0.0, 2).expect("classify");
        assert!(!prediction.is_unknown());
        assert_eq!(prediction.label, "l0");
    }

    #[test]
    fn test_threshold_above_max_yields_unknown() {
        let v = vocab(3);
        let probs = decide(&[1.0, 2.0, 0.5]);
        let max = probs.argmax().expect("max").1;
        let prediction = classify_with_threshold(&probs, &v, max + 0.01, 3).expect("classify");
        assert_eq!(prediction.label, UNKNOWN_LABEL);
        assert_eq!(prediction.ranked[0].label, "l1");
    }

    #[test]
    fn test_threshold_does_not_change_confidence_or_ranking() {
        let v = vocab(3);
        let probs = decide(&[1.0, 2.0, 0.5]);
        let low = classify_with_threshold(&probs, &v, 0.0, 3).expect("low");
        let high = classify_with_threshold(&probs, &v, 1.0, 3).expect("high");
        assert_eq!(low.confidence.to_bits(), high.confidence.to_bits());
        assert_eq!(low.ranked, high.ranked);
        assert!(high.is_unknown());
    }

    #[test]
    fn test_threshold_one_accepts_certainty() {
        let v = vocab(2);
        let probs = ProbabilityRow(vec![1.0, 0.0]);
        let prediction = classify_with_threshold(&probs, &v, 1.0, 1).expect("classify");
        assert_eq!(prediction.label, "l0");
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let v = vocab(2);
        let probs = decide(&[0.0, 1.0]);
        assert!(classify_with_threshold(&probs, &v, 1.5, 1).is_err());
        assert!(classify_with_threshold(&probs, &v, -0.1, 1).is_err());
    }

    #[test]
    fn test_classify_row_wider_than_vocab_is_error() {
        let v = vocab(2);
        let probs = decide(&[0.0, 0.0, 9.0]);
        assert!(matches!(classify(&probs, &v), Err(LarkError::Validation(_))));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_softmax_is_a_distribution(scores in prop::collection::vec(-50.0f32..50.0, 1..64)) {
                let probs = decide(&scores);
                let sum: f32 = probs.values().iter().sum();
                prop_assert!((sum - 1.0).abs() < 1e-4, "sum was {}", sum);
                prop_assert!(probs.values().iter().all(|p| *p >= 0.0));
            }

            #[test]
            fn prop_topk_is_sorted_with_id_tiebreak(
                scores in prop::collection::vec(prop::sample::select(vec![-1.0f32, 0.0, 0.5, 2.0]), 1..32),
                k_seed in 0usize..32,
            ) {
                let probs = decide(&scores);
                let k = k_seed % probs.len() + 1;
                let top = topk(&probs, k).expect("valid k");
                prop_assert_eq!(top.len(), k);
                for pair in top.windows(2) {
                    let ((ia, pa), (ib, pb)) = (pair[0], pair[1]);
                    prop_assert!(pa > pb || (pa == pb && ia < ib));
                }
            }
        }
    }
}
