use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::args::BestModelMetric;
use super::metrics::EvalMetrics;
use crate::classifier::artifact::WEIGHTS_FILE;
use crate::classifier::{ClassifierError, SequenceClassifier};

pub const CHECKPOINT_PREFIX: &str = "checkpoint-";
pub const TRAINER_STATE_FILE: &str = "trainer_state.json";

/// One saved evaluation epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    /// Directory name under the output directory, `checkpoint-<global_step>`
    pub name: String,
    pub epoch: usize,
    pub global_step: usize,
    pub metrics: EvalMetrics,
}

/// Writes one checkpoint per evaluation and keeps the directory within a retention limit.
///
/// The best checkpoint under `metric` is never deleted. When the limit is
/// exceeded, other checkpoints are removed oldest first.
#[derive(Debug)]
pub struct CheckpointManager {
    output_dir: PathBuf,
    save_total_limit: Option<usize>,
    metric: BestModelMetric,
    retained: Vec<CheckpointRecord>,
    best: Option<CheckpointRecord>,
}

impl CheckpointManager {
    /// Checkpoint directories left in `output_dir` by an earlier run are removed.
    pub fn new(
        output_dir: impl AsRef<Path>,
        save_total_limit: Option<usize>,
        metric: BestModelMetric,
    ) -> Result<Self, ClassifierError> {
        let output_dir = output_dir.as_ref().to_path_buf();
        fs::create_dir_all(&output_dir).map_err(|e| {
            ClassifierError::PersistenceError(format!("Failed to create {}: {}", output_dir.display(), e))
        })?;
        remove_stale_checkpoints(&output_dir)?;
        Ok(Self {
            output_dir,
            save_total_limit,
            metric,
            retained: Vec::new(),
            best: None,
        })
    }

    pub fn path_of(&self, record: &CheckpointRecord) -> PathBuf {
        self.output_dir.join(&record.name)
    }

    pub fn weights_of(&self, record: &CheckpointRecord) -> PathBuf {
        self.path_of(record).join(WEIGHTS_FILE)
    }

    /// Checkpoints still on disk, oldest first.
    pub fn retained(&self) -> &[CheckpointRecord] {
        &self.retained
    }

    pub fn best(&self) -> Option<&CheckpointRecord> {
        self.best.as_ref()
    }

    /// Saves the model's current parameters and applies the retention policy.
    ///
    /// Returns `true` when this checkpoint became the new best.
    pub fn save<M: SequenceClassifier>(
        &mut self,
        model: &M,
        epoch: usize,
        global_step: usize,
        metrics: EvalMetrics,
    ) -> Result<bool, ClassifierError> {
        let record = CheckpointRecord {
            name: format!("{}{}", CHECKPOINT_PREFIX, global_step),
            epoch,
            global_step,
            metrics,
        };
        let dir = self.path_of(&record);
        fs::create_dir_all(&dir)
            .map_err(|e| ClassifierError::PersistenceError(format!("Failed to create {}: {}", dir.display(), e)))?;
        model.save_weights(&dir.join(WEIGHTS_FILE))?;

        let state = serde_json::to_string_pretty(&record)
            .map_err(|e| ClassifierError::PersistenceError(format!("Failed to serialize trainer state: {}", e)))?;
        fs::write(dir.join(TRAINER_STATE_FILE), state).map_err(|e| {
            ClassifierError::PersistenceError(format!("Failed to write trainer state in {}: {}", dir.display(), e))
        })?;
        log::info!("Saved {} (eval_loss {:.4})", record.name, metrics.loss);

        let improved = self.is_improvement(&metrics);
        if improved {
            log::info!("New best checkpoint: {}", record.name);
            self.best = Some(record.clone());
        }
        self.retained.push(record);
        self.rotate()?;
        Ok(improved)
    }

    /// Strictly better than the current best. Non-finite scores never qualify.
    fn is_improvement(&self, metrics: &EvalMetrics) -> bool {
        match self.metric {
            BestModelMetric::EvalLoss => {
                metrics.loss.is_finite()
                    && self
                        .best
                        .as_ref()
                        .map_or(true, |best| metrics.loss < best.metrics.loss)
            }
        }
    }

    fn rotate(&mut self) -> Result<(), ClassifierError> {
        let Some(limit) = self.save_total_limit else {
            return Ok(());
        };
        let limit = limit.max(1);
        while self.retained.len() > limit {
            let best_name = self.best.as_ref().map(|b| b.name.as_str());
            let Some(position) = self.retained.iter().position(|r| Some(r.name.as_str()) != best_name) else {
                break;
            };
            let record = self.retained.remove(position);
            let dir = self.path_of(&record);
            log::debug!("Deleting older checkpoint {}", dir.display());
            fs::remove_dir_all(&dir).map_err(|e| {
                ClassifierError::PersistenceError(format!("Failed to remove {}: {}", dir.display(), e))
            })?;
        }
        Ok(())
    }

    /// Loads the best checkpoint's parameters back into `model`.
    pub fn restore_best<M: SequenceClassifier>(&self, model: &mut M) -> Result<CheckpointRecord, ClassifierError> {
        let best = self
            .best
            .clone()
            .ok_or_else(|| ClassifierError::TrainingError("No checkpoint has been saved".into()))?;
        model.load_weights(&self.weights_of(&best))?;
        log::info!(
            "Loaded best model from {} (epoch {}, eval_loss {:.4})",
            best.name,
            best.epoch,
            best.metrics.loss
        );
        Ok(best)
    }
}

fn remove_stale_checkpoints(output_dir: &Path) -> Result<(), ClassifierError> {
    let entries = fs::read_dir(output_dir)
        .map_err(|e| ClassifierError::PersistenceError(format!("Failed to read {}: {}", output_dir.display(), e)))?;
    for entry in entries {
        let entry = entry?;
        let is_checkpoint = entry.file_name().to_string_lossy().starts_with(CHECKPOINT_PREFIX);
        if is_checkpoint && entry.path().is_dir() {
            log::info!("Removing checkpoint from a previous run: {}", entry.path().display());
            fs::remove_dir_all(entry.path()).map_err(|e| {
                ClassifierError::PersistenceError(format!("Failed to remove {}: {}", entry.path().display(), e))
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::EncodedBatch;
    use ndarray::Array2;

    /// Only persistence matters here; weights are a marker string.
    struct MarkerModel;

    impl SequenceClassifier for MarkerModel {
        fn num_labels(&self) -> usize {
            2
        }

        fn logits(&self, batch: &EncodedBatch) -> Result<Array2<f32>, ClassifierError> {
            Ok(Array2::zeros((batch.batch_size(), 2)))
        }

        fn prepare_training(&mut self, _lr: f64, _wd: f64) -> Result<(), ClassifierError> {
            Ok(())
        }

        fn train_step(&mut self, _batch: &EncodedBatch, _labels: &[u32]) -> Result<f32, ClassifierError> {
            Ok(0.0)
        }

        fn save_weights(&self, path: &Path) -> Result<(), ClassifierError> {
            fs::write(path, "weights")?;
            Ok(())
        }

        fn load_weights(&mut self, _path: &Path) -> Result<(), ClassifierError> {
            Ok(())
        }
    }

    fn metrics(loss: f32) -> EvalMetrics {
        EvalMetrics {
            loss,
            accuracy: 0.5,
            f1: 0.5,
        }
    }

    #[test]
    fn test_nan_loss_never_becomes_best() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = CheckpointManager::new(dir.path(), None, BestModelMetric::EvalLoss).unwrap();
        assert!(!manager.save(&MarkerModel, 1, 1, metrics(f32::NAN)).unwrap());
        assert!(manager.best().is_none());
        assert!(manager.save(&MarkerModel, 2, 2, metrics(0.8)).unwrap());
        assert_eq!(manager.best().unwrap().name, "checkpoint-2");
    }

    #[test]
    fn test_stale_checkpoints_removed() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("checkpoint-40")).unwrap();
        fs::create_dir_all(dir.path().join("logs")).unwrap();
        CheckpointManager::new(dir.path(), Some(2), BestModelMetric::EvalLoss).unwrap();
        assert!(!dir.path().join("checkpoint-40").exists());
        assert!(dir.path().join("logs").exists());
    }
}
