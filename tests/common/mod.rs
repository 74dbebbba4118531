#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use env_logger::{Builder, Env};
use ndarray::Array2;
use prompt_taxonomy::classifier::EncodedBatch;
use prompt_taxonomy::{ClassifierError, SequenceClassifier, TokenizerAdapter, TokenizerConfig};

pub const TOKENIZER_JSON: &str = r#"{
    "version": "1.0",
    "truncation": null,
    "padding": null,
    "added_tokens": [],
    "normalizer": {"type": "Lowercase"},
    "pre_tokenizer": {"type": "Whitespace"},
    "post_processor": null,
    "decoder": null,
    "model": {
        "type": "WordLevel",
        "vocab": {"[PAD]": 0, "[UNK]": 1, "write": 2, "a": 3, "short": 4, "story": 5, "who": 6, "wrote": 7, "hamlet": 8},
        "unk_token": "[UNK]"
    }
}"#;

// Initialize test logger
pub fn init() {
    let _ = Builder::from_env(Env::default().default_filter_or("warn"))
        .is_test(true)
        .try_init();
}

pub fn write_tokenizer(dir: &Path) -> PathBuf {
    let path = dir.join("tokenizer.json");
    fs::write(&path, TOKENIZER_JSON).unwrap();
    path
}

pub fn tokenizer(dir: &Path, max_length: usize) -> TokenizerAdapter {
    let config = TokenizerConfig {
        max_length,
        ..Default::default()
    };
    TokenizerAdapter::from_file(write_tokenizer(dir), config).unwrap()
}

/// Returns the same scores for every row it is asked about.
pub struct FixedScoreModel {
    pub scores: Vec<f32>,
}

impl SequenceClassifier for FixedScoreModel {
    fn num_labels(&self) -> usize {
        self.scores.len()
    }

    fn logits(&self, batch: &EncodedBatch) -> Result<Array2<f32>, ClassifierError> {
        Ok(Array2::from_shape_fn((batch.batch_size(), self.scores.len()), |(_, c)| self.scores[c]))
    }

    fn prepare_training(&mut self, _learning_rate: f64, _weight_decay: f64) -> Result<(), ClassifierError> {
        Ok(())
    }

    fn train_step(&mut self, _batch: &EncodedBatch, _labels: &[u32]) -> Result<f32, ClassifierError> {
        Ok(0.0)
    }

    fn save_weights(&self, path: &Path) -> Result<(), ClassifierError> {
        fs::write(path, serde_json::to_string(&self.scores)?)?;
        Ok(())
    }

    fn load_weights(&mut self, path: &Path) -> Result<(), ClassifierError> {
        self.scores = serde_json::from_str(&fs::read_to_string(path)?)?;
        Ok(())
    }
}

/// Two-class model whose margin for class 0 follows `margins[epoch - 1]`.
///
/// An epoch is `steps_per_epoch` train steps. Saved weights are the step count,
/// so restoring a checkpoint rewinds the model to that epoch.
pub struct EpochScriptedModel {
    pub steps: usize,
    pub steps_per_epoch: usize,
    pub margins: Vec<f32>,
}

impl EpochScriptedModel {
    pub fn new(steps_per_epoch: usize, margins: Vec<f32>) -> Self {
        Self {
            steps: 0,
            steps_per_epoch,
            margins,
        }
    }

    pub fn epoch(&self) -> usize {
        self.steps / self.steps_per_epoch
    }
}

impl SequenceClassifier for EpochScriptedModel {
    fn num_labels(&self) -> usize {
        2
    }

    fn logits(&self, batch: &EncodedBatch) -> Result<Array2<f32>, ClassifierError> {
        let index = self.epoch().saturating_sub(1).min(self.margins.len() - 1);
        let margin = self.margins[index];
        Ok(Array2::from_shape_fn((batch.batch_size(), 2), |(_, c)| if c == 0 { margin } else { 0.0 }))
    }

    fn prepare_training(&mut self, _learning_rate: f64, _weight_decay: f64) -> Result<(), ClassifierError> {
        Ok(())
    }

    fn train_step(&mut self, _batch: &EncodedBatch, _labels: &[u32]) -> Result<f32, ClassifierError> {
        self.steps += 1;
        Ok(0.7)
    }

    fn save_weights(&self, path: &Path) -> Result<(), ClassifierError> {
        fs::write(path, self.steps.to_string())?;
        Ok(())
    }

    fn load_weights(&mut self, path: &Path) -> Result<(), ClassifierError> {
        self.steps = fs::read_to_string(path)?
            .trim()
            .parse()
            .map_err(|_| ClassifierError::LoadError("Weights file is not a step count".into()))?;
        Ok(())
    }
}
