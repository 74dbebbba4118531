use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::classifier::{ClassifierError, TokenizerConfig};
use crate::runtime::RuntimeConfig;
use crate::training::TrainingArgs;

/// Where the labeled records live and which fields to read from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub path: PathBuf,
    pub text_field: String,
    pub label_field: String,
    /// Share of examples held out for evaluation
    pub test_fraction: f64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/databricks-dolly-15k.jsonl"),
            text_field: "instruction".to_string(),
            label_field: "category".to_string(),
            test_fraction: 0.2,
        }
    }
}

/// The pretrained repository the classifier is fine-tuned from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub name: String,
    pub revision: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            name: "bert-base-uncased".to_string(),
            revision: "main".to_string(),
        }
    }
}

/// Everything a training or inference run needs, passed explicitly into every stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub data: DataConfig,
    pub model: ModelSettings,
    pub training: TrainingArgs,
    pub tokenizer: TokenizerConfig,
    pub runtime: RuntimeConfig,
}

impl PipelineConfig {
    /// Reads a JSON config; missing sections and fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| ClassifierError::LoadError(format!("Failed to read config {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| ClassifierError::LoadError(format!("Invalid config {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Directory that receives the vocabulary, checkpoints and final model.
    pub fn output_dir(&self) -> &Path {
        &self.training.output_dir
    }

    pub fn validate(&self) -> Result<(), ClassifierError> {
        if !(0.0..1.0).contains(&self.data.test_fraction) || self.data.test_fraction == 0.0 {
            return Err(ClassifierError::ValidationError(format!(
                "test_fraction must be in (0, 1), got {}",
                self.data.test_fraction
            )));
        }
        if self.data.text_field.is_empty() || self.data.label_field.is_empty() {
            return Err(ClassifierError::ValidationError("Field names cannot be empty".into()));
        }
        if self.model.name.trim().is_empty() {
            return Err(ClassifierError::ValidationError("Model name cannot be empty".into()));
        }
        if self.tokenizer.max_length == 0 {
            return Err(ClassifierError::ValidationError("max_length must be at least 1".into()));
        }
        self.training.validate()
    }
}
