use std::path::Path;

use ndarray::Array2;

use super::error::ClassifierError;
use super::tokenization::EncodedBatch;

/// A sequence encoder with a classification head, fine-tuned in place.
///
/// The trainer and the inference service only talk to the model through this
/// trait. Scores are raw, unnormalized logits of shape `[batch, num_labels]`.
pub trait SequenceClassifier {
    /// Number of classes the head produces scores for
    fn num_labels(&self) -> usize;

    /// Forward pass without gradient tracking.
    fn logits(&self, batch: &EncodedBatch) -> Result<Array2<f32>, ClassifierError>;

    /// Sets up optimizer state. Called once before the first `train_step`.
    fn prepare_training(&mut self, learning_rate: f64, weight_decay: f64) -> Result<(), ClassifierError>;

    /// Forward pass, cross-entropy loss against `labels`, backward pass and one
    /// optimizer update. Returns the batch loss.
    fn train_step(&mut self, batch: &EncodedBatch, labels: &[u32]) -> Result<f32, ClassifierError>;

    /// Persists every parameter, head included.
    fn save_weights(&self, path: &Path) -> Result<(), ClassifierError>;

    /// Restores parameters written by `save_weights`.
    fn load_weights(&mut self, path: &Path) -> Result<(), ClassifierError>;
}
