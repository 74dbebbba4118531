use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use ndarray::{concatenate, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

use super::args::TrainingArgs;
use super::checkpoint::{CheckpointManager, CheckpointRecord};
use super::metrics::{compute_metrics, EvalMetrics};
use crate::classifier::artifact::WEIGHTS_FILE;
use crate::classifier::{ClassifierError, EncodedBatch, SequenceClassifier};
use crate::data::{DatasetSplit, TokenizedExample};

pub const TRAINING_LOG_FILE: &str = "training_log.jsonl";

/// Where the trainer is in its run. Epochs are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerPhase {
    Initializing,
    TrainingEpoch(usize),
    Evaluating(usize),
    Checkpointing(usize),
    Finalizing,
    Done,
}

/// What happened in one epoch, also appended to the training log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpochReport {
    pub epoch: usize,
    pub global_step: usize,
    pub train_loss: f32,
    pub eval: EvalMetrics,
}

#[derive(Debug, Clone)]
pub struct TrainingSummary {
    /// The checkpoint whose parameters ended up in the final model
    pub best: CheckpointRecord,
    pub history: Vec<EpochReport>,
    pub global_step: usize,
    /// `<output_dir>/model.safetensors`
    pub final_weights: PathBuf,
}

/// Runs the epoch loop: train, evaluate, checkpoint, and finally restore the best checkpoint.
pub struct Trainer<M: SequenceClassifier> {
    args: TrainingArgs,
    model: M,
    phase: TrainerPhase,
    pad_id: u32,
    checkpoints: CheckpointManager,
    global_step: usize,
    history: Vec<EpochReport>,
}

impl<M: SequenceClassifier> Trainer<M> {
    pub fn new(args: TrainingArgs, model: M, pad_id: u32) -> Result<Self, ClassifierError> {
        args.validate()?;
        let checkpoints =
            CheckpointManager::new(&args.output_dir, args.save_total_limit, args.metric_for_best_model)?;
        Ok(Self {
            args,
            model,
            phase: TrainerPhase::Initializing,
            pad_id,
            checkpoints,
            global_step: 0,
            history: Vec::new(),
        })
    }

    pub fn phase(&self) -> TrainerPhase {
        self.phase
    }

    pub fn args(&self) -> &TrainingArgs {
        &self.args
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    pub fn history(&self) -> &[EpochReport] {
        &self.history
    }

    pub fn train(&mut self, split: &DatasetSplit<TokenizedExample>) -> Result<TrainingSummary, ClassifierError> {
        if self.phase != TrainerPhase::Initializing {
            return Err(ClassifierError::TrainingError("Trainer has already run".into()));
        }
        if split.train.is_empty() {
            return Err(ClassifierError::TrainingError("Training subset is empty".into()));
        }
        if split.test.is_empty() {
            return Err(ClassifierError::TrainingError("Evaluation subset is empty".into()));
        }
        if let Some(bad) = split
            .train
            .iter()
            .chain(&split.test)
            .find(|e| e.label as usize >= self.model.num_labels())
        {
            return Err(ClassifierError::ValidationError(format!(
                "Label {} is out of range for a model with {} labels",
                bad.label,
                self.model.num_labels()
            )));
        }

        let log_dir = self.args.logging_dir();
        fs::create_dir_all(&log_dir)
            .map_err(|e| ClassifierError::PersistenceError(format!("Failed to create {}: {}", log_dir.display(), e)))?;
        let log_path = log_dir.join(TRAINING_LOG_FILE);
        File::create(&log_path)
            .map_err(|e| ClassifierError::PersistenceError(format!("Failed to reset {}: {}", log_path.display(), e)))?;

        self.model
            .prepare_training(self.args.learning_rate, self.args.weight_decay)?;
        log::info!(
            "Training on {} examples, evaluating on {}, for {} epochs",
            split.train.len(),
            split.test.len(),
            self.args.num_train_epochs
        );

        for epoch in 1..=self.args.num_train_epochs {
            self.phase = TrainerPhase::TrainingEpoch(epoch);
            let train_loss = self.train_epoch(&split.train, epoch)?;

            self.phase = TrainerPhase::Evaluating(epoch);
            let eval = self.evaluate(&split.test)?;
            if !eval.loss.is_finite() {
                return Err(ClassifierError::TrainingError(format!(
                    "Evaluation loss became {} in epoch {}",
                    eval.loss, epoch
                )));
            }
            log::info!(
                "Epoch {}: train_loss {:.4} eval_loss {:.4} accuracy {:.4} f1 {:.4}",
                epoch,
                train_loss,
                eval.loss,
                eval.accuracy,
                eval.f1
            );

            self.phase = TrainerPhase::Checkpointing(epoch);
            self.checkpoints
                .save(&self.model, epoch, self.global_step, eval)?;

            let report = EpochReport {
                epoch,
                global_step: self.global_step,
                train_loss,
                eval,
            };
            self.append_log(&report)?;
            self.history.push(report);
        }

        self.phase = TrainerPhase::Finalizing;
        let best = self.checkpoints.restore_best(&mut self.model)?;
        let final_weights = self.args.output_dir.join(WEIGHTS_FILE);
        self.model.save_weights(&final_weights)?;
        self.phase = TrainerPhase::Done;

        Ok(TrainingSummary {
            best,
            history: self.history.clone(),
            global_step: self.global_step,
            final_weights,
        })
    }

    fn train_epoch(&mut self, examples: &[TokenizedExample], epoch: usize) -> Result<f32, ClassifierError> {
        let mut order: Vec<usize> = (0..examples.len()).collect();
        let mut rng = StdRng::seed_from_u64(self.args.seed.wrapping_add(epoch as u64));
        order.shuffle(&mut rng);

        let mut epoch_loss = 0.0f32;
        let mut window_loss = 0.0f32;
        let mut window_steps = 0usize;
        let mut steps = 0usize;

        for chunk in order.chunks(self.args.per_device_train_batch_size) {
            let rows: Vec<_> = chunk.iter().map(|&i| &examples[i].input).collect();
            let labels: Vec<u32> = chunk.iter().map(|&i| examples[i].label).collect();
            let batch = EncodedBatch::from_rows(&rows, self.pad_id)?;

            let loss = self.model.train_step(&batch, &labels)?;
            if !loss.is_finite() {
                return Err(ClassifierError::TrainingError(format!(
                    "Loss became {} at step {}",
                    loss,
                    self.global_step + 1
                )));
            }
            self.global_step += 1;
            steps += 1;
            epoch_loss += loss;
            window_loss += loss;
            window_steps += 1;

            if self.args.logging_steps > 0 && self.global_step % self.args.logging_steps == 0 {
                log::info!(
                    "epoch {} step {}: loss {:.4}",
                    epoch,
                    self.global_step,
                    window_loss / window_steps as f32
                );
                window_loss = 0.0;
                window_steps = 0;
            }
        }

        Ok(epoch_loss / steps.max(1) as f32)
    }

    /// Scores `examples` in evaluation batches and computes loss, accuracy and weighted F1.
    pub fn evaluate(&self, examples: &[TokenizedExample]) -> Result<EvalMetrics, ClassifierError> {
        if examples.is_empty() {
            return Err(ClassifierError::ValidationError("Cannot evaluate on no examples".into()));
        }
        let mut parts: Vec<Array2<f32>> = Vec::new();
        for chunk in examples.chunks(self.args.per_device_eval_batch_size) {
            let rows: Vec<_> = chunk.iter().map(|e| &e.input).collect();
            let batch = EncodedBatch::from_rows(&rows, self.pad_id)?;
            parts.push(self.model.logits(&batch)?);
        }
        let views: Vec<_> = parts.iter().map(|p| p.view()).collect();
        let logits = concatenate(Axis(0), &views)
            .map_err(|e| ClassifierError::TrainingError(format!("Failed to gather evaluation scores: {}", e)))?;
        let labels: Vec<u32> = examples.iter().map(|e| e.label).collect();
        compute_metrics(logits.view(), &labels)
    }

    fn append_log(&self, report: &EpochReport) -> Result<(), ClassifierError> {
        let path = self.args.logging_dir().join(TRAINING_LOG_FILE);
        let line = serde_json::to_string(report)
            .map_err(|e| ClassifierError::PersistenceError(format!("Failed to serialize epoch report: {}", e)))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ClassifierError::PersistenceError(format!("Failed to open {}: {}", path.display(), e)))?;
        writeln!(file, "{}", line)
            .map_err(|e| ClassifierError::PersistenceError(format!("Failed to write {}: {}", path.display(), e)))
    }
}
