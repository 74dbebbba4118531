//! Fine-tunes a BERT-style encoder to sort instruction prompts into intent
//! categories, and serves the trained model one prompt at a time.
//!
//! # Training
//!
//! ```no_run
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use prompt_taxonomy::{run_training, ModelManager, PipelineConfig, PretrainedModel};
//!
//! let config = PipelineConfig::from_file("taxonomy.json")?;
//! let manager = ModelManager::new_default()?;
//! let pretrained = manager
//!     .ensure_model_downloaded(&PretrainedModel::new(&config.model.name, &config.model.revision))
//!     .await?;
//!
//! let outcome = run_training(&config, pretrained)?;
//! println!("best checkpoint: {}", outcome.summary.best.name);
//! # Ok(())
//! # }
//! ```
//!
//! # Inference
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use prompt_taxonomy::{Classifier, RuntimeConfig};
//!
//! let classifier = Classifier::load("./prompt_taxonomy_model", &RuntimeConfig::default())?;
//! let result = classifier.predict("Summarize this article in two sentences")?;
//! println!("{}: {:.2}%", result.predicted_label, result.confidence * 100.0);
//! # Ok(())
//! # }
//! ```
//!
//! A trained directory holds the weights together with the exact label vocabulary
//! and tokenizer used in training. Loading fails with
//! [`ClassifierError::ConfigMismatch`] if any of them was swapped out.

pub mod classifier;
pub mod config;
pub mod data;
pub mod interactive;
pub mod model_manager;
pub mod pipeline;
mod runtime;
pub mod training;

pub use classifier::{
    BertSequenceClassifier, ClassificationResult, Classifier, ClassifierBuilder, ClassifierError, ClassifierInfo,
    ModelArtifact, SequenceClassifier, TokenizerAdapter, TokenizerConfig,
};
pub use config::{DataConfig, ModelSettings, PipelineConfig};
pub use data::{Example, LabelVocabulary};
pub use interactive::run_interactive;
pub use model_manager::{ModelError, ModelManager, PretrainedModel};
pub use pipeline::{run_training, TrainingOutcome};
pub use runtime::{create_device, DeviceKind, RuntimeConfig};
pub use training::{Trainer, TrainingArgs};

pub fn init_logger() {
    env_logger::init();
}
