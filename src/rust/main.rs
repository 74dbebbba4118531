use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use prompt_taxonomy::{run_interactive, run_training, Classifier, ModelManager, PipelineConfig, PretrainedModel};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Fine-tune a new model instead of starting the interactive classifier
    #[arg(long)]
    train: bool,

    /// JSON pipeline configuration; built-in defaults are used for anything it omits
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Training data (JSONL)
    #[arg(long)]
    data: Option<PathBuf>,

    /// Where the trained model is written, and read from when classifying
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Pretrained repository name, or a local directory holding its files
    #[arg(short, long)]
    model: Option<String>,

    #[arg(long)]
    epochs: Option<usize>,

    /// Force a fresh download of the pretrained model files
    #[arg(short, long)]
    fresh: bool,
}

fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(data) = &args.data {
        config.data.path = data.clone();
    }
    if let Some(dir) = &args.output_dir {
        config.training.output_dir = dir.clone();
    }
    if let Some(model) = &args.model {
        config.model.name = model.clone();
    }
    if let Some(epochs) = args.epochs {
        config.training.num_train_epochs = epochs;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn ensure_pretrained(config: &PipelineConfig, fresh: bool) -> Result<PathBuf> {
    let local = Path::new(&config.model.name);
    if local.is_dir() {
        info!("Using local pretrained model at {}", local.display());
        return Ok(local.to_path_buf());
    }

    let manager = ModelManager::new_default().context("Failed to create model cache directory")?;
    let model = PretrainedModel::new(&config.model.name, &config.model.revision);
    if fresh {
        info!("Fresh download requested - removing any existing model files...");
        manager.remove_download(&model)?;
    }
    let dir = manager
        .ensure_model_downloaded(&model)
        .await
        .with_context(|| format!("Failed to fetch pretrained model {}", config.model.name))?;
    Ok(dir)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = load_config(&args)?;

    if args.train {
        info!("=== Training prompt classifier ===");
        let start = Instant::now();
        let pretrained = ensure_pretrained(&config, args.fresh).await?;
        let outcome = run_training(&config, &pretrained).context("Training failed")?;
        info!(
            "=== Training complete in {:.2?}: {} ({} labels) ===",
            start.elapsed(),
            outcome.output_dir.display(),
            outcome.vocabulary.len()
        );
        return Ok(());
    }

    let model_dir = config.output_dir();
    let classifier = Classifier::load(model_dir, &config.runtime)
        .with_context(|| format!("Failed to load trained model from {}", model_dir.display()))?;
    info!(
        "Loaded classifier with {} categories. Type a prompt, or 'exit' to quit.",
        classifier.info().num_classes
    );

    let stdin = io::stdin();
    run_interactive(&classifier, stdin.lock(), io::stdout().lock()).context("Interactive session failed")?;
    Ok(())
}
