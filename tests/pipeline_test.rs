mod common;

use std::fs;
use std::path::Path;

use candle_core::Device;
use common::{init, write_tokenizer};
use prompt_taxonomy::classifier::artifact::ARTIFACT_CONFIG_FILE;
use prompt_taxonomy::{
    run_training, BertSequenceClassifier, Classifier, ClassifierError, ModelArtifact, PipelineConfig, RuntimeConfig,
    SequenceClassifier,
};

const TINY_CONFIG: &str = r#"{
    "vocab_size": 16,
    "hidden_size": 8,
    "num_hidden_layers": 1,
    "num_attention_heads": 2,
    "intermediate_size": 16,
    "hidden_act": "gelu",
    "hidden_dropout_prob": 0.0,
    "max_position_embeddings": 16,
    "type_vocab_size": 2,
    "initializer_range": 0.02,
    "layer_norm_eps": 1e-12,
    "pad_token_id": 0,
    "model_type": "bert"
}"#;

/// Lays out a pretrained repository directory with randomly initialized weights.
fn write_pretrained(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("config.json"), TINY_CONFIG).unwrap();
    write_tokenizer(dir);
    let model = BertSequenceClassifier::new(TINY_CONFIG, 2, Device::Cpu).unwrap();
    model.save_weights(&dir.join("model.safetensors")).unwrap();
}

fn write_dataset(path: &Path) {
    let mut lines = Vec::new();
    for i in 0..10 {
        lines.push(format!(r#"{{"instruction": "write a short story {}", "category": "creative_writing"}}"#, i));
        lines.push(format!(r#"{{"instruction": "who wrote hamlet {}", "category": "open_qa"}}"#, i));
    }
    fs::write(path, lines.join("\n")).unwrap();
}

fn config(root: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.data.path = root.join("train.jsonl");
    config.training.output_dir = root.join("model");
    config.training.num_train_epochs = 2;
    config.training.per_device_train_batch_size = 4;
    config.training.learning_rate = 1e-3;
    config.tokenizer.max_length = 8;
    config
}

#[test]
fn test_train_then_classify() -> Result<(), Box<dyn std::error::Error>> {
    init();
    let root = tempfile::tempdir()?;
    let pretrained = root.path().join("pretrained");
    write_pretrained(&pretrained);
    write_dataset(&root.path().join("train.jsonl"));
    let config = config(root.path());

    let outcome = run_training(&config, &pretrained)?;
    assert_eq!(outcome.vocabulary.labels(), &["creative_writing", "open_qa"]);
    assert_eq!(outcome.summary.history.len(), 2);
    assert!(outcome.summary.history.iter().all(|r| r.eval.loss.is_finite()));

    let model_dir = config.training.output_dir.clone();
    for file in [
        "model.safetensors",
        "config.json",
        "tokenizer.json",
        "label_to_id.json",
        ARTIFACT_CONFIG_FILE,
    ] {
        assert!(model_dir.join(file).exists(), "missing {}", file);
    }
    let log = fs::read_to_string(model_dir.join("logs").join("training_log.jsonl"))?;
    assert_eq!(log.lines().count(), 2);

    let artifact = ModelArtifact::load(&model_dir)?;
    assert_eq!(artifact.num_labels, 2);
    assert_eq!(artifact.best_checkpoint.as_deref(), Some(outcome.summary.best.name.as_str()));

    let classifier = Classifier::load(&model_dir, &RuntimeConfig::cpu())?;
    let result = classifier.predict("write a short story")?;
    assert!(["creative_writing", "open_qa"].contains(&result.predicted_label.as_str()));
    assert!((0.0..=1.0).contains(&result.confidence));
    let total: f32 = result.scores.values().sum();
    assert!((total - 1.0).abs() < 1e-4);
    Ok(())
}

#[test]
fn test_tampered_vocabulary_rejected_at_load() -> Result<(), Box<dyn std::error::Error>> {
    let root = tempfile::tempdir()?;
    let pretrained = root.path().join("pretrained");
    write_pretrained(&pretrained);
    write_dataset(&root.path().join("train.jsonl"));
    let mut config = config(root.path());
    config.training.num_train_epochs = 1;
    run_training(&config, &pretrained)?;

    let model_dir = config.training.output_dir.clone();
    fs::write(
        model_dir.join("label_to_id.json"),
        r#"{"open_qa": 0, "creative_writing": 1}"#,
    )?;
    let result = Classifier::load(&model_dir, &RuntimeConfig::cpu());
    assert!(matches!(result, Err(ClassifierError::ConfigMismatch(_))));
    Ok(())
}

#[test]
fn test_missing_dataset_fails_before_training() {
    let root = tempfile::tempdir().unwrap();
    let pretrained = root.path().join("pretrained");
    write_pretrained(&pretrained);
    let config = config(root.path());
    assert!(matches!(
        run_training(&config, &pretrained),
        Err(ClassifierError::LoadError(_))
    ));
}
