use std::fs;
use std::path::{Path, PathBuf};

use crate::classifier::artifact::{ENCODER_CONFIG_FILE, TOKENIZER_FILE};
use crate::classifier::{BertSequenceClassifier, ClassifierError, ModelArtifact, TokenizerAdapter};
use crate::config::PipelineConfig;
use crate::data::{load_jsonl, tokenize_examples, train_test_split, LabelVocabulary, VOCABULARY_FILE};
use crate::runtime::create_device;
use crate::training::{Trainer, TrainingSummary};

/// Result of a completed training run.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// Directory holding the final model, ready for [`Classifier::load`](crate::Classifier::load)
    pub output_dir: PathBuf,
    pub vocabulary: LabelVocabulary,
    pub artifact: ModelArtifact,
    pub summary: TrainingSummary,
}

/// Fine-tunes the pretrained model in `pretrained_dir` on the configured dataset.
///
/// Stages run in order: load records, build and persist the label vocabulary,
/// tokenize, split, train, then write the encoder config, tokenizer and artifact
/// metadata next to the final weights.
pub fn run_training(config: &PipelineConfig, pretrained_dir: impl AsRef<Path>) -> Result<TrainingOutcome, ClassifierError> {
    config.validate()?;
    let pretrained_dir = pretrained_dir.as_ref();
    let output_dir = config.output_dir().to_path_buf();
    fs::create_dir_all(&output_dir).map_err(|e| {
        ClassifierError::PersistenceError(format!("Failed to create {}: {}", output_dir.display(), e))
    })?;

    let examples = load_jsonl(&config.data.path, &config.data.text_field, &config.data.label_field)?;
    let vocabulary = LabelVocabulary::build(&examples)?;
    vocabulary.save(output_dir.join(VOCABULARY_FILE))?;
    log::info!("Found {} categories: {:?}", vocabulary.len(), vocabulary.labels());
    let labeled = vocabulary.encode_examples(&examples)?;

    let tokenizer_src = pretrained_dir.join(TOKENIZER_FILE);
    let tokenizer = TokenizerAdapter::from_file(&tokenizer_src, config.tokenizer.clone())?;
    let texts: Vec<&str> = labeled.iter().map(|e| e.text.as_str()).collect();
    let truncated = tokenizer.truncated_count(&texts)?;
    if truncated > 0 {
        log::warn!(
            "{} of {} examples exceed {} tokens and will be truncated",
            truncated,
            texts.len(),
            config.tokenizer.max_length
        );
    }
    let tokenized = tokenize_examples(&tokenizer, &labeled)?;
    let split = train_test_split(tokenized, config.data.test_fraction, config.training.seed)?;
    log::info!("Split {} examples into {} train / {} test", split.total(), split.train.len(), split.test.len());

    let device = create_device(&config.runtime)?;
    let model = BertSequenceClassifier::from_pretrained(pretrained_dir, vocabulary.len(), device, config.training.seed)?;
    let mut trainer = Trainer::new(config.training.clone(), model, tokenizer.pad_id())?;
    let summary = trainer.train(&split)?;

    // The tokenizer file is copied byte for byte so its fingerprint still matches.
    copy_into(&tokenizer_src, &output_dir)?;
    copy_into(&pretrained_dir.join(ENCODER_CONFIG_FILE), &output_dir)?;

    let mut artifact = ModelArtifact::new(&config.model.name, &vocabulary, &tokenizer);
    artifact.best_checkpoint = Some(summary.best.name.clone());
    artifact.best_eval_loss = Some(summary.best.metrics.loss);
    artifact.save(&output_dir)?;
    log::info!(
        "Model saved to {} (best {}, eval_loss {:.4}, accuracy {:.4}, f1 {:.4})",
        output_dir.display(),
        summary.best.name,
        summary.best.metrics.loss,
        summary.best.metrics.accuracy,
        summary.best.metrics.f1
    );

    Ok(TrainingOutcome {
        output_dir,
        vocabulary,
        artifact,
        summary,
    })
}

fn copy_into(src: &Path, dir: &Path) -> Result<(), ClassifierError> {
    let name = src
        .file_name()
        .ok_or_else(|| ClassifierError::PersistenceError(format!("Not a file: {}", src.display())))?;
    let dest = dir.join(name);
    fs::copy(src, &dest).map_err(|e| {
        ClassifierError::PersistenceError(format!("Failed to copy {} to {}: {}", src.display(), dest.display(), e))
    })?;
    Ok(())
}
