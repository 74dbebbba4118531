use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use super::tokenization::{TokenizerAdapter, TokenizerConfig};
use crate::data::LabelVocabulary;

pub const ARTIFACT_CONFIG_FILE: &str = "classifier_config.json";
pub const WEIGHTS_FILE: &str = "model.safetensors";
pub const ENCODER_CONFIG_FILE: &str = "config.json";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Metadata written next to the final weights.
///
/// It ties the weights to the exact vocabulary and tokenizer they were trained
/// with; the inference service refuses to load a directory where these disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Pretrained repository the encoder was fine-tuned from
    pub base_model: String,
    pub num_labels: usize,
    /// Labels in id order, informational only
    pub labels: Vec<String>,
    pub tokenizer: TokenizerConfig,
    pub vocabulary_fingerprint: String,
    pub tokenizer_fingerprint: String,
    /// Checkpoint directory the final weights were taken from
    pub best_checkpoint: Option<String>,
    pub best_eval_loss: Option<f32>,
}

impl ModelArtifact {
    pub fn new(base_model: impl Into<String>, vocabulary: &LabelVocabulary, tokenizer: &TokenizerAdapter) -> Self {
        Self {
            base_model: base_model.into(),
            num_labels: vocabulary.len(),
            labels: vocabulary.labels().to_vec(),
            tokenizer: tokenizer.config().clone(),
            vocabulary_fingerprint: vocabulary.fingerprint(),
            tokenizer_fingerprint: tokenizer.fingerprint().to_string(),
            best_checkpoint: None,
            best_eval_loss: None,
        }
    }

    pub fn save(&self, dir: impl AsRef<Path>) -> Result<(), ClassifierError> {
        let path = dir.as_ref().join(ARTIFACT_CONFIG_FILE);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ClassifierError::PersistenceError(format!("Failed to serialize artifact: {}", e)))?;
        fs::write(&path, json)
            .map_err(|e| ClassifierError::PersistenceError(format!("Failed to write {}: {}", path.display(), e)))
    }

    pub fn load(dir: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = dir.as_ref().join(ARTIFACT_CONFIG_FILE);
        let json = fs::read_to_string(&path)
            .map_err(|e| ClassifierError::LoadError(format!("Failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&json)
            .map_err(|e| ClassifierError::LoadError(format!("Malformed artifact {}: {}", path.display(), e)))
    }

    pub fn verify_vocabulary(&self, vocabulary: &LabelVocabulary) -> Result<(), ClassifierError> {
        if vocabulary.len() != self.num_labels {
            return Err(ClassifierError::ConfigMismatch(format!(
                "Vocabulary has {} labels but the model was trained with {}",
                vocabulary.len(),
                self.num_labels
            )));
        }
        let actual = vocabulary.fingerprint();
        if actual != self.vocabulary_fingerprint {
            return Err(ClassifierError::ConfigMismatch(format!(
                "Vocabulary fingerprint {} does not match the model's {}",
                actual, self.vocabulary_fingerprint
            )));
        }
        Ok(())
    }

    pub fn verify_tokenizer(&self, tokenizer: &TokenizerAdapter) -> Result<(), ClassifierError> {
        if tokenizer.config() != &self.tokenizer {
            return Err(ClassifierError::ConfigMismatch(format!(
                "Tokenizer configured as {:?} but the model was trained with {:?}",
                tokenizer.config(),
                self.tokenizer
            )));
        }
        if tokenizer.fingerprint() != self.tokenizer_fingerprint {
            return Err(ClassifierError::ConfigMismatch(format!(
                "Tokenizer fingerprint {} does not match the model's {}",
                tokenizer.fingerprint(),
                self.tokenizer_fingerprint
            )));
        }
        Ok(())
    }
}
