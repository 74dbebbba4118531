use std::collections::HashMap;
use std::fs;
use std::path::Path;

use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::optim::{AdamW, Optimizer, ParamsAdamW};
use candle_nn::{Linear, Module, VarBuilder, VarMap};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

use super::error::ClassifierError;
use super::model::SequenceClassifier;
use super::tokenization::EncodedBatch;

/// Parameter prefix of the classification head.
pub const HEAD_PREFIX: &str = "classifier";
/// Parameter prefix of the `[CLS]` pooler that feeds the head.
pub const POOLER_PREFIX: &str = "pooler.dense";

/// The subset of `config.json` needed to size the head.
#[derive(Debug, Deserialize)]
struct EncoderDims {
    hidden_size: usize,
}

/// BERT encoder + tanh pooler over `[CLS]` + linear head, trained with AdamW.
pub struct BertSequenceClassifier {
    encoder: BertModel,
    pooler: Linear,
    head: Linear,
    varmap: VarMap,
    optimizer: Option<AdamW>,
    device: Device,
    num_labels: usize,
}

impl std::fmt::Debug for BertSequenceClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BertSequenceClassifier")
            .field("num_labels", &self.num_labels)
            .field("device", &self.device)
            .field("training", &self.optimizer.is_some())
            .finish()
    }
}

impl BertSequenceClassifier {
    /// Builds the architecture described by an encoder `config.json` with freshly
    /// initialized parameters.
    pub fn new(config_json: &str, num_labels: usize, device: Device) -> Result<Self, ClassifierError> {
        if num_labels == 0 {
            return Err(ClassifierError::ValidationError("num_labels must be greater than zero".into()));
        }
        let config: BertConfig = serde_json::from_str(config_json)
            .map_err(|e| ClassifierError::LoadError(format!("Failed to parse encoder config: {}", e)))?;
        let dims: EncoderDims = serde_json::from_str(config_json)
            .map_err(|e| ClassifierError::LoadError(format!("Encoder config has no hidden_size: {}", e)))?;

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let encoder = BertModel::load(vb.clone(), &config)?;
        let pooler = candle_nn::linear(dims.hidden_size, dims.hidden_size, vb.pp(POOLER_PREFIX))?;
        let head = candle_nn::linear(dims.hidden_size, num_labels, vb.pp(HEAD_PREFIX))?;

        Ok(Self {
            encoder,
            pooler,
            head,
            varmap,
            optimizer: None,
            device,
            num_labels,
        })
    }

    pub fn from_config_file(path: impl AsRef<Path>, num_labels: usize, device: Device) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| ClassifierError::LoadError(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::new(&json, num_labels, device)
    }

    /// Builds the model from a pretrained repository directory (`config.json` +
    /// `model.safetensors`). The head, and the pooler when the checkpoint has none,
    /// start from a seeded random initialization.
    pub fn from_pretrained(
        model_dir: impl AsRef<Path>,
        num_labels: usize,
        device: Device,
        seed: u64,
    ) -> Result<Self, ClassifierError> {
        let model_dir = model_dir.as_ref();
        let model = Self::from_config_file(model_dir.join("config.json"), num_labels, device)?;
        let fresh = model.load_pretrained_encoder(model_dir.join("model.safetensors"))?;

        let mut prefixes = vec![HEAD_PREFIX];
        if fresh.iter().any(|name| name.starts_with(POOLER_PREFIX)) {
            prefixes.push(POOLER_PREFIX);
        }
        model.reset_parameters(&prefixes, seed)?;
        log::info!(
            "Loaded pretrained encoder from {} ({} parameters newly initialized)",
            model_dir.display(),
            fresh.len()
        );
        Ok(model)
    }

    /// Copies encoder weights from a pretrained checkpoint.
    ///
    /// Returns the names of parameters the checkpoint did not provide. Only pooler
    /// and head parameters may be missing; a missing encoder tensor is an error.
    pub fn load_pretrained_encoder(&self, weights: impl AsRef<Path>) -> Result<Vec<String>, ClassifierError> {
        let weights = weights.as_ref();
        let tensors = candle_core::safetensors::load(weights, &self.device)
            .map_err(|e| ClassifierError::LoadError(format!("Failed to read {}: {}", weights.display(), e)))?;

        let vars = self
            .varmap
            .data()
            .lock()
            .map_err(|_| ClassifierError::ModelError("Parameter store lock poisoned".into()))?;
        let mut fresh = Vec::new();
        for (name, var) in vars.iter() {
            match find_tensor(&tensors, name) {
                Some(tensor) => var.set(&tensor.to_dtype(DType::F32)?).map_err(|e| {
                    ClassifierError::ConfigMismatch(format!("Pretrained tensor '{}' does not fit: {}", name, e))
                })?,
                None if name.starts_with(HEAD_PREFIX) || name.starts_with(POOLER_PREFIX) => {
                    fresh.push(name.clone())
                }
                None => {
                    return Err(ClassifierError::LoadError(format!(
                        "Pretrained checkpoint {} has no tensor for '{}'",
                        weights.display(),
                        name
                    )))
                }
            }
        }
        fresh.sort();
        Ok(fresh)
    }

    /// Re-initializes every parameter under `prefixes`: weights uniform in
    /// `±1/sqrt(fan_in)`, biases zero, drawn from an RNG seeded with `seed`.
    pub fn reset_parameters(&self, prefixes: &[&str], seed: u64) -> Result<(), ClassifierError> {
        let vars = self
            .varmap
            .data()
            .lock()
            .map_err(|_| ClassifierError::ModelError("Parameter store lock poisoned".into()))?;
        let mut names: Vec<&String> = vars
            .keys()
            .filter(|name| prefixes.iter().any(|p| name.starts_with(p)))
            .collect();
        names.sort();

        let mut rng = StdRng::seed_from_u64(seed);
        for name in names {
            let var = &vars[name];
            let shape = var.shape().clone();
            let values: Vec<f32> = if name.ends_with("bias") {
                vec![0.0; shape.elem_count()]
            } else {
                let fan_in = shape.dims().last().copied().unwrap_or(1).max(1);
                let bound = 1.0 / (fan_in as f32).sqrt();
                (0..shape.elem_count()).map(|_| rng.gen_range(-bound..bound)).collect()
            };
            var.set(&Tensor::from_vec(values, shape, &self.device)?)?;
        }
        Ok(())
    }

    fn to_tensor(&self, values: &Array2<u32>) -> Result<Tensor, ClassifierError> {
        let (rows, cols) = values.dim();
        let flat: Vec<u32> = values.iter().copied().collect();
        Ok(Tensor::from_vec(flat, (rows, cols), &self.device)?)
    }

    fn forward(&self, batch: &EncodedBatch) -> Result<Tensor, ClassifierError> {
        if batch.batch_size() == 0 || batch.sequence_length() == 0 {
            return Err(ClassifierError::ValidationError("Cannot run the model on an empty batch".into()));
        }
        let input_ids = self.to_tensor(&batch.input_ids)?;
        let attention_mask = self.to_tensor(&batch.attention_mask)?;
        let token_type_ids = input_ids.zeros_like()?;

        let hidden = self.encoder.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let cls = hidden.i((.., 0))?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;
        Ok(self.head.forward(&pooled)?)
    }
}

/// Looks a parameter up under the names HuggingFace checkpoints commonly use:
/// with or without the `bert.` prefix, and with legacy `gamma`/`beta` LayerNorm names.
fn find_tensor<'a>(tensors: &'a HashMap<String, Tensor>, name: &str) -> Option<&'a Tensor> {
    let mut candidates = vec![name.to_string(), format!("bert.{}", name)];
    if name.contains("LayerNorm") {
        let legacy = name
            .strip_suffix(".weight")
            .map(|stem| format!("{}.gamma", stem))
            .or_else(|| name.strip_suffix(".bias").map(|stem| format!("{}.beta", stem)));
        if let Some(legacy) = legacy {
            candidates.push(format!("bert.{}", legacy));
            candidates.push(legacy);
        }
    }
    candidates.iter().find_map(|key| tensors.get(key))
}

impl SequenceClassifier for BertSequenceClassifier {
    fn num_labels(&self) -> usize {
        self.num_labels
    }

    fn logits(&self, batch: &EncodedBatch) -> Result<Array2<f32>, ClassifierError> {
        let logits = self.forward(batch)?.detach();
        let rows: Vec<Vec<f32>> = logits.to_dtype(DType::F32)?.to_vec2()?;
        let flat: Vec<f32> = rows.into_iter().flatten().collect();
        Array2::from_shape_vec((batch.batch_size(), self.num_labels), flat)
            .map_err(|e| ClassifierError::ModelError(format!("Failed to extract logits: {}", e)))
    }

    fn prepare_training(&mut self, learning_rate: f64, weight_decay: f64) -> Result<(), ClassifierError> {
        let params = ParamsAdamW {
            lr: learning_rate,
            weight_decay,
            ..Default::default()
        };
        self.optimizer = Some(AdamW::new(self.varmap.all_vars(), params)?);
        Ok(())
    }

    fn train_step(&mut self, batch: &EncodedBatch, labels: &[u32]) -> Result<f32, ClassifierError> {
        if labels.len() != batch.batch_size() {
            return Err(ClassifierError::TrainingError(format!(
                "Batch has {} rows but {} labels",
                batch.batch_size(),
                labels.len()
            )));
        }
        let logits = self.forward(batch)?;
        let targets = Tensor::new(labels, &self.device)?;
        let loss = candle_nn::loss::cross_entropy(&logits, &targets)?;

        let optimizer = self
            .optimizer
            .as_mut()
            .ok_or_else(|| ClassifierError::TrainingError("prepare_training was not called".into()))?;
        optimizer.backward_step(&loss)?;
        Ok(loss.to_scalar::<f32>()?)
    }

    fn save_weights(&self, path: &Path) -> Result<(), ClassifierError> {
        self.varmap
            .save(path)
            .map_err(|e| ClassifierError::PersistenceError(format!("Failed to save {}: {}", path.display(), e)))
    }

    fn load_weights(&mut self, path: &Path) -> Result<(), ClassifierError> {
        self.varmap
            .load(path)
            .map_err(|e| ClassifierError::LoadError(format!("Failed to load {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

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

    fn batch() -> EncodedBatch {
        EncodedBatch {
            input_ids: array![[2, 5, 7, 0], [3, 4, 0, 0]],
            attention_mask: array![[1, 1, 1, 0], [1, 1, 0, 0]],
        }
    }

    #[test]
    fn test_logits_shape() {
        let model = BertSequenceClassifier::new(TINY_CONFIG, 3, Device::Cpu).unwrap();
        let logits = model.logits(&batch()).unwrap();
        assert_eq!(logits.dim(), (2, 3));
        assert!(logits.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_train_step_requires_optimizer() {
        let mut model = BertSequenceClassifier::new(TINY_CONFIG, 2, Device::Cpu).unwrap();
        assert!(matches!(
            model.train_step(&batch(), &[0, 1]),
            Err(ClassifierError::TrainingError(_))
        ));
        model.prepare_training(1e-3, 0.01).unwrap();
        let loss = model.train_step(&batch(), &[0, 1]).unwrap();
        assert!(loss.is_finite() && loss > 0.0);
    }

    #[test]
    fn test_seeded_head_init_is_reproducible() {
        let a = BertSequenceClassifier::new(TINY_CONFIG, 2, Device::Cpu).unwrap();
        let b = BertSequenceClassifier::new(TINY_CONFIG, 2, Device::Cpu).unwrap();
        a.reset_parameters(&[HEAD_PREFIX], 42).unwrap();
        b.reset_parameters(&[HEAD_PREFIX], 42).unwrap();
        let wa: Vec<Vec<f32>> = a.head.weight().to_vec2().unwrap();
        let wb: Vec<Vec<f32>> = b.head.weight().to_vec2().unwrap();
        assert_eq!(wa, wb);
    }

    #[test]
    fn test_save_and_load_weights() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.safetensors");
        let model = BertSequenceClassifier::new(TINY_CONFIG, 2, Device::Cpu).unwrap();
        model.reset_parameters(&[HEAD_PREFIX], 7).unwrap();
        model.save_weights(&path).unwrap();

        let mut restored = BertSequenceClassifier::new(TINY_CONFIG, 2, Device::Cpu).unwrap();
        restored.load_weights(&path).unwrap();
        let before: Vec<Vec<f32>> = model.head.weight().to_vec2().unwrap();
        let after: Vec<Vec<f32>> = restored.head.weight().to_vec2().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_legacy_layer_norm_names() {
        let mut tensors = HashMap::new();
        tensors.insert(
            "bert.embeddings.LayerNorm.gamma".to_string(),
            Tensor::ones(4, DType::F32, &Device::Cpu).unwrap(),
        );
        assert!(find_tensor(&tensors, "embeddings.LayerNorm.weight").is_some());
        assert!(find_tensor(&tensors, "embeddings.LayerNorm.bias").is_none());
    }

    #[test]
    fn test_zero_labels_rejected() {
        assert!(BertSequenceClassifier::new(TINY_CONFIG, 0, Device::Cpu).is_err());
    }
}
