use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::bert::BertSequenceClassifier;
use super::error::ClassifierError;
use super::model::SequenceClassifier;
use super::tokenization::{EncodedBatch, TokenizerAdapter};
use super::utils::{argmax, softmax};
use super::{ClassificationResult, ClassifierInfo};
use crate::data::LabelVocabulary;
use crate::runtime::RuntimeConfig;

/// Classifies single prompts with a fine-tuned model and its paired label vocabulary.
///
/// A classifier is always assembled through [`ClassifierBuilder`](super::ClassifierBuilder),
/// which refuses model/vocabulary/tokenizer combinations that were not trained together.
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use prompt_taxonomy::{Classifier, RuntimeConfig};
///
/// let classifier = Classifier::load("./prompt_taxonomy_model", &RuntimeConfig::default())?;
/// let result = classifier.predict("Write a short story about a lighthouse keeper")?;
/// println!("{} ({:.2}%)", result.predicted_label, result.confidence * 100.0);
/// # Ok(())
/// # }
/// ```
pub struct Classifier<M: SequenceClassifier = BertSequenceClassifier> {
    pub(crate) tokenizer: TokenizerAdapter,
    pub(crate) model: M,
    pub(crate) vocabulary: LabelVocabulary,
    pub(crate) artifact_dir: Option<PathBuf>,
}

impl Classifier<BertSequenceClassifier> {
    /// Loads a trained model directory written by the training pipeline.
    pub fn load(artifact_dir: impl AsRef<Path>, runtime: &RuntimeConfig) -> Result<Self, ClassifierError> {
        super::builder::ClassifierBuilder::from_artifact_dir(artifact_dir, runtime)?.build()
    }
}

impl<M: SequenceClassifier> Classifier<M> {
    /// Creates a new ClassifierBuilder for fluent construction
    pub fn builder() -> super::builder::ClassifierBuilder<M> {
        super::builder::ClassifierBuilder::new()
    }

    /// Returns information about the classifier's current state
    pub fn info(&self) -> ClassifierInfo {
        ClassifierInfo {
            artifact_dir: self.artifact_dir.clone(),
            num_classes: self.vocabulary.len(),
            class_labels: self.vocabulary.labels().to_vec(),
            max_sequence_length: self.tokenizer.config().max_length,
            vocabulary_fingerprint: self.vocabulary.fingerprint(),
        }
    }

    pub fn vocabulary(&self) -> &LabelVocabulary {
        &self.vocabulary
    }

    pub fn tokenizer(&self) -> &TokenizerAdapter {
        &self.tokenizer
    }

    /// Predicts the category of `text`.
    ///
    /// The prompt is truncated to the trained maximum length but not padded. The
    /// confidence is the softmax probability of the winning class; `scores` holds
    /// the full distribution.
    pub fn predict(&self, text: &str) -> Result<ClassificationResult, ClassifierError> {
        if text.trim().is_empty() {
            return Err(ClassifierError::ValidationError("Input text cannot be empty".into()));
        }

        let tokenized = self.tokenizer.encode_unpadded(text)?;
        let batch = EncodedBatch::from_rows(&[&tokenized], self.tokenizer.pad_id())?;
        let logits = self.model.logits(&batch)?;
        if logits.dim() != (1, self.vocabulary.len()) {
            return Err(ClassifierError::PredictionError(format!(
                "Model returned scores of shape {:?}, expected (1, {})",
                logits.dim(),
                self.vocabulary.len()
            )));
        }

        let probabilities = softmax(logits.row(0));
        let best = argmax(probabilities.view())
            .ok_or_else(|| ClassifierError::PredictionError("Model returned no scores".into()))?;
        let predicted_label = self
            .vocabulary
            .label_of(best as u32)
            .ok_or_else(|| ClassifierError::PredictionError(format!("No label for class id {}", best)))?
            .to_string();

        let scores: HashMap<String, f32> = self
            .vocabulary
            .labels()
            .iter()
            .cloned()
            .zip(probabilities.iter().copied())
            .collect();

        log::debug!("Classified prompt as '{}' ({:.4})", predicted_label, probabilities[best]);
        Ok(ClassificationResult {
            predicted_label,
            confidence: probabilities[best],
            scores,
        })
    }
}
