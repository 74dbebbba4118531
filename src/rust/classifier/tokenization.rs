use std::path::Path;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokenizers::{Tokenizer, TruncationParams};

use super::error::ClassifierError;

/// Preprocessing settings that must be identical at training and inference time.
///
/// The config is written into the model artifact after training and read back by
/// the inference service, so both sides always tokenize the same way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    /// Sequences longer than this are truncated
    pub max_length: usize,
    /// Pad every training sequence up to `max_length`
    pub pad_to_max_length: bool,
    /// Add `[CLS]`/`[SEP]` style special tokens through the tokenizer's post-processor
    pub add_special_tokens: bool,
    /// Token used for padding; id 0 is used when the vocabulary has no such token
    pub pad_token: String,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            max_length: 512,
            pad_to_max_length: true,
            add_special_tokens: true,
            pad_token: "[PAD]".to_string(),
        }
    }
}

/// Token ids plus attention mask for a single text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizedText {
    pub input_ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
}

impl TokenizedText {
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }
}

/// A rectangular batch ready for the model, shape `[batch, sequence]`.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedBatch {
    pub input_ids: Array2<u32>,
    pub attention_mask: Array2<u32>,
}

impl EncodedBatch {
    /// Stacks tokenized texts, right-padding shorter rows with `pad_id`.
    pub fn from_rows(rows: &[&TokenizedText], pad_id: u32) -> Result<Self, ClassifierError> {
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        let mut ids = Vec::with_capacity(rows.len() * width);
        let mut mask = Vec::with_capacity(rows.len() * width);
        for row in rows {
            ids.extend_from_slice(&row.input_ids);
            mask.extend_from_slice(&row.attention_mask);
            ids.extend(std::iter::repeat(pad_id).take(width - row.len()));
            mask.extend(std::iter::repeat(0).take(width - row.len()));
        }
        let input_ids = Array2::from_shape_vec((rows.len(), width), ids)
            .map_err(|e| ClassifierError::TokenizerError(format!("Failed to create input array: {}", e)))?;
        let attention_mask = Array2::from_shape_vec((rows.len(), width), mask)
            .map_err(|e| ClassifierError::TokenizerError(format!("Failed to create mask array: {}", e)))?;
        Ok(Self { input_ids, attention_mask })
    }

    pub fn batch_size(&self) -> usize {
        self.input_ids.nrows()
    }

    pub fn sequence_length(&self) -> usize {
        self.input_ids.ncols()
    }
}

/// Wraps a HuggingFace tokenizer with a fixed truncation and padding policy.
///
/// Encoding has no side effects, so one adapter can be shared freely.
#[derive(Debug, Clone)]
pub struct TokenizerAdapter {
    tokenizer: Tokenizer,
    config: TokenizerConfig,
    pad_id: u32,
    fingerprint: String,
}

impl TokenizerAdapter {
    /// Loads `tokenizer.json` and applies the truncation policy from `config`.
    pub fn from_file(path: impl AsRef<Path>, config: TokenizerConfig) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            ClassifierError::LoadError(format!("Failed to read tokenizer {}: {}", path.display(), e))
        })?;
        let tokenizer = Tokenizer::from_bytes(&bytes).map_err(|e| {
            log::error!("Failed to load tokenizer: {}", e);
            ClassifierError::TokenizerError(format!("Failed to load tokenizer: {}", e))
        })?;
        log::info!("Tokenizer loaded from {}", path.display());
        Self::with_fingerprint(tokenizer, config, fingerprint_bytes(&bytes))
    }

    pub fn new(tokenizer: Tokenizer, config: TokenizerConfig) -> Result<Self, ClassifierError> {
        let serialized = tokenizer
            .to_string(false)
            .map_err(|e| ClassifierError::TokenizerError(format!("Failed to serialize tokenizer: {}", e)))?;
        Self::with_fingerprint(tokenizer, config, fingerprint_bytes(serialized.as_bytes()))
    }

    fn with_fingerprint(
        mut tokenizer: Tokenizer,
        config: TokenizerConfig,
        fingerprint: String,
    ) -> Result<Self, ClassifierError> {
        if config.max_length == 0 {
            return Err(ClassifierError::ValidationError("max_length must be greater than zero".into()));
        }
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_length,
                ..Default::default()
            }))
            .map_err(|e| ClassifierError::TokenizerError(format!("Failed to configure truncation: {}", e)))?;
        // Padding is applied by the adapter itself, never by the tokenizer.
        tokenizer.with_padding(None);

        let pad_id = tokenizer.token_to_id(&config.pad_token).unwrap_or(0);
        Ok(Self {
            tokenizer,
            config,
            pad_id,
            fingerprint,
        })
    }

    pub fn config(&self) -> &TokenizerConfig {
        &self.config
    }

    pub fn pad_id(&self) -> u32 {
        self.pad_id
    }

    /// SHA-256 of the tokenizer definition this adapter was built from.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Writes the underlying tokenizer definition so it can travel with the model.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ClassifierError> {
        let path = path.as_ref();
        self.tokenizer
            .save(path, true)
            .map_err(|e| ClassifierError::PersistenceError(format!("Failed to save tokenizer {}: {}", path.display(), e)))
    }

    fn untruncated(&self) -> Result<Tokenizer, ClassifierError> {
        let mut untruncated = self.tokenizer.clone();
        untruncated
            .with_truncation(None)
            .map_err(|e| ClassifierError::TokenizerError(e.to_string()))?;
        Ok(untruncated)
    }

    fn natural_length(&self, tokenizer: &Tokenizer, text: &str) -> Result<usize, ClassifierError> {
        tokenizer
            .encode(text, self.config.add_special_tokens)
            .map_err(|e| ClassifierError::TokenizerError(e.to_string()))
            .map(|encoding| encoding.get_ids().len())
    }

    /// Counts tokens without truncation or padding.
    pub fn count_tokens(&self, text: &str) -> Result<usize, ClassifierError> {
        self.natural_length(&self.untruncated()?, text)
    }

    /// How many of `texts` are longer than `max_length` and lose tokens to truncation.
    pub fn truncated_count<S: AsRef<str>>(&self, texts: &[S]) -> Result<usize, ClassifierError> {
        let untruncated = self.untruncated()?;
        let mut truncated = 0;
        for text in texts {
            if self.natural_length(&untruncated, text.as_ref())? > self.config.max_length {
                truncated += 1;
            }
        }
        Ok(truncated)
    }

    /// Truncates to `max_length` without padding. Used for single-prompt inference.
    pub fn encode_unpadded(&self, text: &str) -> Result<TokenizedText, ClassifierError> {
        let encoding = self
            .tokenizer
            .encode(text, self.config.add_special_tokens)
            .map_err(|e| ClassifierError::TokenizerError(e.to_string()))?;
        Ok(TokenizedText {
            input_ids: encoding.get_ids().to_vec(),
            attention_mask: encoding.get_attention_mask().to_vec(),
        })
    }

    /// Truncates, then pads to `max_length` when the config asks for it.
    pub fn encode(&self, text: &str) -> Result<TokenizedText, ClassifierError> {
        let mut tokenized = self.encode_unpadded(text)?;
        if self.config.pad_to_max_length && tokenized.len() < self.config.max_length {
            let missing = self.config.max_length - tokenized.len();
            tokenized.input_ids.extend(std::iter::repeat(self.pad_id).take(missing));
            tokenized.attention_mask.extend(std::iter::repeat(0).take(missing));
        }
        Ok(tokenized)
    }

    pub fn encode_batch<S: AsRef<str>>(&self, texts: &[S]) -> Result<EncodedBatch, ClassifierError> {
        let rows = texts
            .iter()
            .map(|t| self.encode(t.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        let refs: Vec<&TokenizedText> = rows.iter().collect();
        EncodedBatch::from_rows(&refs, self.pad_id)
    }
}

pub(crate) fn fingerprint_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
