use std::collections::BTreeMap;

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use crate::classifier::utils::{argmax, log_softmax_at};
use crate::classifier::ClassifierError;

/// Scores of one evaluation pass over the held-out subset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvalMetrics {
    /// Mean cross-entropy
    pub loss: f32,
    pub accuracy: f32,
    /// Per-class F1 weighted by true-class support
    pub f1: f32,
}

/// Arg-max of every row; ties go to the lowest class id.
pub fn predictions(logits: ArrayView2<f32>) -> Vec<u32> {
    logits
        .rows()
        .into_iter()
        .map(|row| argmax(row).unwrap_or(0) as u32)
        .collect()
}

/// Fraction of exact matches. Zero for empty input.
pub fn accuracy(predicted: &[u32], labels: &[u32]) -> f32 {
    if labels.is_empty() {
        return 0.0;
    }
    let correct = predicted.iter().zip(labels).filter(|(p, l)| p == l).count();
    correct as f32 / labels.len() as f32
}

/// F1 per class, averaged with weights equal to each class's true support.
///
/// Precision or recall with a zero denominator counts as 0.
pub fn weighted_f1(predicted: &[u32], labels: &[u32]) -> f32 {
    if labels.is_empty() {
        return 0.0;
    }

    #[derive(Default)]
    struct Counts {
        true_positive: usize,
        predicted: usize,
        support: usize,
    }

    let mut per_class: BTreeMap<u32, Counts> = BTreeMap::new();
    for (&p, &l) in predicted.iter().zip(labels) {
        per_class.entry(p).or_default().predicted += 1;
        let truth = per_class.entry(l).or_default();
        truth.support += 1;
        if p == l {
            truth.true_positive += 1;
        }
    }

    let weighted: f32 = per_class
        .values()
        .filter(|c| c.support > 0)
        .map(|c| {
            let precision = ratio(c.true_positive, c.predicted);
            let recall = ratio(c.true_positive, c.support);
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            f1 * c.support as f32
        })
        .sum();
    weighted / labels.len() as f32
}

fn ratio(numerator: usize, denominator: usize) -> f32 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f32 / denominator as f32
    }
}

/// Mean cross-entropy of `logits` against `labels`.
pub fn mean_cross_entropy(logits: ArrayView2<f32>, labels: &[u32]) -> Result<f32, ClassifierError> {
    check_shape(logits, labels)?;
    if labels.is_empty() {
        return Ok(0.0);
    }
    let total: f32 = logits
        .rows()
        .into_iter()
        .zip(labels)
        .map(|(row, &label)| -log_softmax_at(row, label as usize))
        .sum();
    Ok(total / labels.len() as f32)
}

/// Loss, accuracy and weighted F1 of one evaluation pass.
pub fn compute_metrics(logits: ArrayView2<f32>, labels: &[u32]) -> Result<EvalMetrics, ClassifierError> {
    let loss = mean_cross_entropy(logits, labels)?;
    let predicted = predictions(logits);
    Ok(EvalMetrics {
        loss,
        accuracy: accuracy(&predicted, labels),
        f1: weighted_f1(&predicted, labels),
    })
}

fn check_shape(logits: ArrayView2<f32>, labels: &[u32]) -> Result<(), ClassifierError> {
    if logits.nrows() != labels.len() {
        return Err(ClassifierError::ValidationError(format!(
            "Got {} score rows for {} labels",
            logits.nrows(),
            labels.len()
        )));
    }
    if let Some(bad) = labels.iter().find(|&&l| l as usize >= logits.ncols()) {
        return Err(ClassifierError::ValidationError(format!(
            "Label {} is out of range for {} classes",
            bad,
            logits.ncols()
        )));
    }
    Ok(())
}
