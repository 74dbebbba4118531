use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::classifier::ClassifierError;

/// Criterion used to pick the checkpoint that becomes the final model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BestModelMetric {
    /// Lowest mean cross-entropy on the evaluation subset
    #[default]
    EvalLoss,
}

/// Hyperparameters of one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingArgs {
    /// Receives checkpoints, logs and the final model
    pub output_dir: PathBuf,
    pub num_train_epochs: usize,
    pub per_device_train_batch_size: usize,
    pub per_device_eval_batch_size: usize,
    pub learning_rate: f64,
    pub weight_decay: f64,
    /// Seeds the data split, per-epoch shuffling and head initialization
    pub seed: u64,
    /// Maximum checkpoints kept on disk; `None` keeps all
    pub save_total_limit: Option<usize>,
    /// Log the running training loss every this many optimizer steps
    pub logging_steps: usize,
    /// Defaults to `<output_dir>/logs`
    pub logging_dir: Option<PathBuf>,
    pub metric_for_best_model: BestModelMetric,
}

impl Default for TrainingArgs {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./prompt_taxonomy_model"),
            num_train_epochs: 6,
            per_device_train_batch_size: 8,
            per_device_eval_batch_size: 8,
            learning_rate: 1e-5,
            weight_decay: 0.05,
            seed: 42,
            save_total_limit: Some(2),
            logging_steps: 10,
            logging_dir: None,
            metric_for_best_model: BestModelMetric::EvalLoss,
        }
    }
}

impl TrainingArgs {
    pub fn logging_dir(&self) -> PathBuf {
        self.logging_dir
            .clone()
            .unwrap_or_else(|| self.output_dir.join("logs"))
    }

    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.num_train_epochs == 0 {
            return Err(ClassifierError::ValidationError("num_train_epochs must be at least 1".into()));
        }
        if self.per_device_train_batch_size == 0 || self.per_device_eval_batch_size == 0 {
            return Err(ClassifierError::ValidationError("Batch sizes must be at least 1".into()));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(ClassifierError::ValidationError(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.weight_decay < 0.0 {
            return Err(ClassifierError::ValidationError("weight_decay cannot be negative".into()));
        }
        if self.save_total_limit == Some(0) {
            return Err(ClassifierError::ValidationError("save_total_limit must be at least 1".into()));
        }
        Ok(())
    }
}
