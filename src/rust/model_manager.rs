use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::classifier::artifact::{ENCODER_CONFIG_FILE, TOKENIZER_FILE, WEIGHTS_FILE};

/// Records the SHA-256 of every downloaded file.
pub const MANIFEST_FILE: &str = "checksums.json";

/// Files a pretrained repository must provide.
pub const REQUIRED_FILES: [&str; 3] = [ENCODER_CONFIG_FILE, TOKENIZER_FILE, WEIGHTS_FILE];

const HUB_URL: &str = "https://huggingface.co";

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model not downloaded: {0}")]
    NotDownloaded(String),
    #[error("Download error: {0}")]
    DownloadError(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Invalid checksum manifest: {0}")]
    ManifestError(#[from] serde_json::Error),
    #[error("Model verification failed")]
    VerificationFailed,
    #[error("Hash mismatch: expected {expected}, got {actual} for {file_type} file")]
    HashMismatch {
        file_type: String,
        expected: String,
        actual: String,
    },
}

/// A pretrained repository on the model hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PretrainedModel {
    /// Repository name, e.g. `bert-base-uncased` or `org/model`
    pub repo: String,
    pub revision: String,
}

impl PretrainedModel {
    pub fn new(repo: impl Into<String>, revision: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            revision: revision.into(),
        }
    }

    pub fn file_url(&self, file: &str) -> String {
        format!("{}/{}/resolve/{}/{}", HUB_URL, self.repo, self.revision, file)
    }

    /// Directory name inside the cache; `/` in the repo name is not a valid path component.
    pub fn cache_name(&self) -> String {
        format!("{}--{}", self.repo.replace('/', "--"), self.revision)
    }
}

/// Downloads pretrained repositories once into a local cache and verifies them.
#[derive(Clone)]
pub struct ModelManager {
    models_dir: PathBuf,
    download_lock: Arc<Mutex<()>>,
}

impl ModelManager {
    /// Creates a new ModelManager with the default models directory
    pub fn new_default() -> io::Result<Self> {
        Self::new(Self::get_default_models_dir())
    }

    /// Returns the default models directory path
    pub fn get_default_models_dir() -> PathBuf {
        if let Ok(path) = env::var("PROMPT_TAXONOMY_CACHE") {
            return PathBuf::from(path).join("models");
        }

        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("prompt-taxonomy").join("models");
        }

        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("prompt-taxonomy").join("models");
        }

        env::temp_dir().join("prompt-taxonomy").join("models")
    }

    pub fn new<P: AsRef<Path>>(models_dir: P) -> io::Result<Self> {
        let models_dir = models_dir.as_ref().to_path_buf();
        fs::create_dir_all(&models_dir)?;
        Ok(Self {
            models_dir,
            download_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn get_model_dir(&self, model: &PretrainedModel) -> PathBuf {
        self.models_dir.join(model.cache_name())
    }

    fn manifest_path(&self, model: &PretrainedModel) -> PathBuf {
        self.get_model_dir(model).join(MANIFEST_FILE)
    }

    pub fn is_model_downloaded(&self, model: &PretrainedModel) -> bool {
        let dir = self.get_model_dir(model);
        let downloaded = REQUIRED_FILES.iter().all(|f| dir.join(f).exists()) && self.manifest_path(model).exists();
        log::debug!("Model {} downloaded: {}", model.repo, downloaded);
        downloaded
    }

    /// Returns the cached directory of a model that is already present and verified.
    pub fn model_dir_if_ready(&self, model: &PretrainedModel) -> Result<PathBuf, ModelError> {
        if !self.is_model_downloaded(model) {
            return Err(ModelError::NotDownloaded(model.repo.clone()));
        }
        if !self.verify_model(model)? {
            return Err(ModelError::VerificationFailed);
        }
        Ok(self.get_model_dir(model))
    }

    pub async fn download_model(&self, model: &PretrainedModel) -> Result<(), ModelError> {
        let _lock = self.download_lock.lock().await;

        let model_dir = self.get_model_dir(model);
        log::info!("Creating model directory at {:?}", model_dir);
        fs::create_dir_all(&model_dir)?;

        let mut manifest = BTreeMap::new();
        for file in REQUIRED_FILES {
            let path = model_dir.join(file);
            match self.download_file(&model.file_url(file), &path, file).await {
                Ok(hash) => {
                    manifest.insert(file.to_string(), hash);
                }
                Err(e) => {
                    log::error!("Failed to download {} for {}: {}", file, model.repo, e);
                    let _ = self.remove_download(model);
                    return Err(e);
                }
            }
        }

        fs::write(self.manifest_path(model), serde_json::to_string_pretty(&manifest)?)?;
        log::info!("Model {} ready at {:?}", model.repo, model_dir);
        Ok(())
    }

    async fn download_file(&self, url: &str, path: &Path, file_type: &str) -> Result<String, ModelError> {
        log::info!("Downloading {} from {}", file_type, url);
        let response = reqwest::get(url).await?.error_for_status()?;
        let bytes = response.bytes().await?;
        log::info!("Downloaded {} bytes", bytes.len());
        let hash = hash_bytes(&bytes);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, &bytes)?;

        let written = hash_file(path)?;
        if written != hash {
            return Err(ModelError::HashMismatch {
                file_type: file_type.to_string(),
                expected: hash,
                actual: written,
            });
        }
        Ok(hash)
    }

    /// Checks every required file against the manifest written at download time.
    pub fn verify_model(&self, model: &PretrainedModel) -> Result<bool, ModelError> {
        let manifest_path = self.manifest_path(model);
        if !manifest_path.exists() {
            log::info!("No checksum manifest at {:?}", manifest_path);
            return Ok(false);
        }
        let manifest: BTreeMap<String, String> = serde_json::from_str(&fs::read_to_string(&manifest_path)?)?;
        let dir = self.get_model_dir(model);

        for file in REQUIRED_FILES {
            let path = dir.join(file);
            let Some(expected) = manifest.get(file) else {
                log::warn!("Manifest has no entry for {}", file);
                return Ok(false);
            };
            if !path.exists() {
                log::info!("Missing {:?}", path);
                return Ok(false);
            }
            let actual = hash_file(&path)?;
            if &actual != expected {
                log::warn!("{} hash mismatch: expected {}, got {}", file, expected, actual);
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn remove_download(&self, model: &PretrainedModel) -> Result<(), ModelError> {
        let dir = self.get_model_dir(model);
        if dir.exists() {
            log::info!("Removing {:?}", dir);
            fs::remove_dir_all(&dir)?;
        }
        Ok(())
    }

    /// Ensures that a model is downloaded and verified, re-downloading on verification failure.
    ///
    /// Returns the directory holding the model files.
    pub async fn ensure_model_downloaded(&self, model: &PretrainedModel) -> Result<PathBuf, ModelError> {
        if !self.is_model_downloaded(model) {
            log::info!("Model {} not found, downloading...", model.repo);
            self.download_model(model).await?;
        } else if !self.verify_model(model)? {
            log::info!("Model verification failed, re-downloading...");
            self.remove_download(model)?;
            self.download_model(model).await?;
        } else {
            log::info!("Model {} verified", model.repo);
        }
        Ok(self.get_model_dir(model))
    }
}

fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn hash_file(path: &Path) -> Result<String, ModelError> {
    Ok(hash_bytes(&fs::read(path)?))
}
