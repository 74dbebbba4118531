mod args;
mod checkpoint;
mod metrics;
mod trainer;

pub use args::{BestModelMetric, TrainingArgs};
pub use checkpoint::{CheckpointManager, CheckpointRecord, CHECKPOINT_PREFIX, TRAINER_STATE_FILE};
pub use metrics::{accuracy, compute_metrics, mean_cross_entropy, predictions, weighted_f1, EvalMetrics};
pub use trainer::{EpochReport, Trainer, TrainerPhase, TrainingSummary, TRAINING_LOG_FILE};
