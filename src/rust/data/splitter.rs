use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::classifier::ClassifierError;

/// Train and held-out evaluation subsets of one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSplit<T> {
    pub train: Vec<T>,
    pub test: Vec<T>,
}

impl<T> DatasetSplit<T> {
    pub fn total(&self) -> usize {
        self.train.len() + self.test.len()
    }
}

/// Shuffles with a seeded RNG and holds out `round(n * test_fraction)` items.
///
/// The same input, fraction and seed always yield the same split.
pub fn train_test_split<T>(
    items: Vec<T>,
    test_fraction: f64,
    seed: u64,
) -> Result<DatasetSplit<T>, ClassifierError> {
    if !(0.0..=1.0).contains(&test_fraction) {
        return Err(ClassifierError::ValidationError(format!(
            "test_fraction must be within [0, 1], got {}",
            test_fraction
        )));
    }

    let total = items.len();
    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    let mut order: Vec<usize> = (0..total).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let test_len = ((total as f64) * test_fraction).round() as usize;
    let test_len = test_len.min(total);

    let mut test = Vec::with_capacity(test_len);
    let mut train = Vec::with_capacity(total - test_len);
    for (position, index) in order.into_iter().enumerate() {
        if let Some(item) = slots[index].take() {
            if position < test_len {
                test.push(item);
            } else {
                train.push(item);
            }
        }
    }

    log::debug!("Dataset split: {} train, {} test (seed {})", train.len(), test.len(), seed);
    Ok(DatasetSplit { train, test })
}
