use std::collections::HashMap;
use std::path::PathBuf;

pub mod artifact;
pub mod bert;
pub mod builder;
#[allow(clippy::module_inception)]
mod classifier;
mod error;
mod model;
pub mod tokenization;
pub(crate) mod utils;

pub use artifact::ModelArtifact;
pub use bert::BertSequenceClassifier;
pub use builder::ClassifierBuilder;
pub use classifier::Classifier;
pub use error::ClassifierError;
pub use model::SequenceClassifier;
pub use tokenization::{EncodedBatch, TokenizedText, TokenizerAdapter, TokenizerConfig};

/// Outcome of classifying one prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub predicted_label: String,
    /// Softmax probability of `predicted_label`, in `[0, 1]`
    pub confidence: f32,
    /// Probability of every label; sums to 1
    pub scores: HashMap<String, f32>,
}

impl ClassificationResult {
    /// Labels with their probabilities, most likely first.
    pub fn ranked(&self) -> Vec<(&str, f32)> {
        let mut ranked: Vec<(&str, f32)> = self.scores.iter().map(|(l, p)| (l.as_str(), *p)).collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }
}

/// Information about the current state and configuration of a classifier
#[derive(Debug, Clone)]
pub struct ClassifierInfo {
    /// Directory the model was loaded from, if any
    pub artifact_dir: Option<PathBuf>,
    /// Number of classes the classifier is trained on
    pub num_classes: usize,
    /// Labels of the classes in id order
    pub class_labels: Vec<String>,
    pub max_sequence_length: usize,
    pub vocabulary_fingerprint: String,
}
