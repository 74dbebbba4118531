use std::path::{Path, PathBuf};

use log::{error, info};

use super::artifact::{ModelArtifact, ENCODER_CONFIG_FILE, TOKENIZER_FILE, WEIGHTS_FILE};
use super::bert::BertSequenceClassifier;
use super::classifier::Classifier;
use super::error::ClassifierError;
use super::model::SequenceClassifier;
use super::tokenization::TokenizerAdapter;
use crate::data::{LabelVocabulary, VOCABULARY_FILE};
use crate::runtime::{create_device, RuntimeConfig};

/// A builder for constructing a Classifier with a fluent interface.
///
/// Every piece is checked against the others in [`build`](Self::build): the head
/// size must equal the vocabulary size, and when artifact metadata is present the
/// vocabulary and tokenizer fingerprints must match what the model was trained with.
pub struct ClassifierBuilder<M: SequenceClassifier> {
    model: Option<M>,
    tokenizer: Option<TokenizerAdapter>,
    vocabulary: Option<LabelVocabulary>,
    artifact: Option<ModelArtifact>,
    artifact_dir: Option<PathBuf>,
}

impl<M: SequenceClassifier> Default for ClassifierBuilder<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassifierBuilder<BertSequenceClassifier> {
    /// Loads every component of a trained model directory.
    ///
    /// # Returns
    /// * `Result<Self, ClassifierError>` - The builder, or an error if:
    ///   - Any of the artifact files is missing or malformed
    ///   - The encoder configuration cannot be instantiated
    ///   - The saved weights do not fit the architecture
    pub fn from_artifact_dir(dir: impl AsRef<Path>, runtime: &RuntimeConfig) -> Result<Self, ClassifierError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(ClassifierError::LoadError(format!("Model directory not found: {}", dir.display())));
        }

        let artifact = ModelArtifact::load(dir)?;
        let vocabulary = LabelVocabulary::load(dir.join(VOCABULARY_FILE))?;
        let tokenizer = TokenizerAdapter::from_file(dir.join(TOKENIZER_FILE), artifact.tokenizer.clone())?;

        let device = create_device(runtime)?;
        let mut model =
            BertSequenceClassifier::from_config_file(dir.join(ENCODER_CONFIG_FILE), artifact.num_labels, device)?;
        model.load_weights(&dir.join(WEIGHTS_FILE)).map_err(|e| {
            error!("Failed to load model weights: {}", e);
            e
        })?;
        info!("Model loaded from {}", dir.display());

        let mut builder = Self::new()
            .with_model(model)
            .with_tokenizer(tokenizer)
            .with_vocabulary(vocabulary)
            .with_artifact(artifact);
        builder.artifact_dir = Some(dir.to_path_buf());
        Ok(builder)
    }
}

impl<M: SequenceClassifier> ClassifierBuilder<M> {
    pub fn new() -> Self {
        Self {
            model: None,
            tokenizer: None,
            vocabulary: None,
            artifact: None,
            artifact_dir: None,
        }
    }

    pub fn with_model(mut self, model: M) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: TokenizerAdapter) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    pub fn with_vocabulary(mut self, vocabulary: LabelVocabulary) -> Self {
        self.vocabulary = Some(vocabulary);
        self
    }

    /// Metadata the other parts are verified against.
    pub fn with_artifact(mut self, artifact: ModelArtifact) -> Self {
        self.artifact = Some(artifact);
        self
    }

    /// Builds and returns the final Classifier instance
    ///
    /// # Returns
    /// * `Result<Classifier<M>, ClassifierError>` - The constructed Classifier if successful, or an error if:
    ///   - The model, tokenizer or vocabulary is missing (`BuildError`)
    ///   - The vocabulary size differs from the model's head size (`ConfigMismatch`)
    ///   - The vocabulary or tokenizer differs from the one recorded in the artifact (`ConfigMismatch`)
    pub fn build(self) -> Result<Classifier<M>, ClassifierError> {
        let model = self
            .model
            .ok_or_else(|| ClassifierError::BuildError("No model loaded".into()))?;
        let tokenizer = self
            .tokenizer
            .ok_or_else(|| ClassifierError::BuildError("No tokenizer loaded".into()))?;
        let vocabulary = self
            .vocabulary
            .ok_or_else(|| ClassifierError::BuildError("No label vocabulary loaded".into()))?;

        if vocabulary.len() != model.num_labels() {
            return Err(ClassifierError::ConfigMismatch(format!(
                "Vocabulary has {} labels but the model head produces {} scores",
                vocabulary.len(),
                model.num_labels()
            )));
        }

        if let Some(artifact) = &self.artifact {
            artifact.verify_vocabulary(&vocabulary)?;
            artifact.verify_tokenizer(&tokenizer)?;
            info!("Vocabulary and tokenizer verified against model artifact");
        }

        Ok(Classifier {
            tokenizer,
            model,
            vocabulary,
            artifact_dir: self.artifact_dir,
        })
    }
}
