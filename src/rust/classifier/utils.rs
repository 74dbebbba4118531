use ndarray::{Array1, ArrayView1};

/// Index of the largest score. The first maximum wins on ties.
pub(crate) fn argmax(scores: ArrayView1<f32>) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &score) in scores.iter().enumerate() {
        match best {
            Some((_, current)) if score <= current => {}
            _ => best = Some((i, score)),
        }
    }
    best.map(|(i, _)| i)
}

pub(crate) fn softmax(scores: ArrayView1<f32>) -> Array1<f32> {
    if scores.is_empty() {
        return Array1::zeros(0);
    }
    let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps = scores.mapv(|s| (s - max).exp());
    let sum = exps.sum();
    if sum > 0.0 {
        exps / sum
    } else {
        Array1::from_elem(scores.len(), 1.0 / scores.len() as f32)
    }
}

/// Numerically stable `log(softmax(scores))[index]`.
pub(crate) fn log_softmax_at(scores: ArrayView1<f32>, index: usize) -> f32 {
    let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let log_sum = scores.iter().map(|&s| (s - max).exp()).sum::<f32>().ln() + max;
    scores[index] - log_sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(array![5.0, 0.1, -3.0].view());
        assert!((probs.sum() - 1.0).abs() < 1e-6);
        assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_softmax_large_scores_stay_finite() {
        let probs = softmax(array![1000.0, 999.0].view());
        assert!(probs.iter().all(|p| p.is_finite()));
        assert!(probs[0] > probs[1]);
    }

    #[test]
    fn test_argmax_first_wins_on_tie() {
        assert_eq!(argmax(array![1.0, 3.0, 3.0].view()), Some(1));
        assert_eq!(argmax(Array1::<f32>::zeros(0).view()), None);
    }

    #[test]
    fn test_log_softmax_matches_softmax() {
        let scores = array![2.0, 1.0, 0.5];
        let probs = softmax(scores.view());
        let lp = log_softmax_at(scores.view(), 0);
        assert!((lp.exp() - probs[0]).abs() < 1e-6);
    }
}
