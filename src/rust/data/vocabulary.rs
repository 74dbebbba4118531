use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use super::dataset::{Example, LabeledExample};
use crate::classifier::tokenization::fingerprint_bytes;
use crate::classifier::ClassifierError;

/// File name of the persisted label mapping inside an output directory.
pub const VOCABULARY_FILE: &str = "label_to_id.json";

/// Bidirectional mapping between category names and dense ids `0..len()`.
///
/// Ids are assigned in sorted label order, so the same set of categories always
/// produces the same ids regardless of the order records appear in the data file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelVocabulary {
    labels: Vec<String>,
    ids: HashMap<String, u32>,
}

impl LabelVocabulary {
    /// Collects every distinct raw label from `examples`.
    pub fn build(examples: &[Example]) -> Result<Self, ClassifierError> {
        let distinct: BTreeSet<&str> = examples.iter().map(|e| e.raw_label.as_str()).collect();
        if distinct.is_empty() {
            return Err(ClassifierError::ValidationError("Cannot build a vocabulary from zero examples".into()));
        }
        let labels: Vec<String> = distinct.into_iter().map(str::to_string).collect();
        log::info!("Built label vocabulary with {} labels", labels.len());
        Ok(Self::from_ordered(labels))
    }

    /// Builds a vocabulary from explicit `(label, id)` pairs, e.g. a mapping read from disk.
    ///
    /// Ids must cover `0..n` exactly once.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, ClassifierError>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let mut by_id: BTreeMap<u32, String> = BTreeMap::new();
        for (label, id) in pairs {
            let label = label.into();
            if let Some(existing) = by_id.insert(id, label.clone()) {
                return Err(ClassifierError::LoadError(format!(
                    "Labels '{}' and '{}' share id {}",
                    existing, label, id
                )));
            }
        }
        if by_id.is_empty() {
            return Err(ClassifierError::LoadError("Label vocabulary is empty".into()));
        }
        for (expected, id) in by_id.keys().enumerate() {
            if *id as usize != expected {
                return Err(ClassifierError::LoadError(format!(
                    "Label ids must be contiguous from 0, missing id {}",
                    expected
                )));
            }
        }
        let labels: Vec<String> = by_id.into_values().collect();
        let vocabulary = Self::from_ordered(labels);
        if vocabulary.ids.len() != vocabulary.labels.len() {
            return Err(ClassifierError::LoadError("Duplicate label in vocabulary".into()));
        }
        Ok(vocabulary)
    }

    fn from_ordered(labels: Vec<String>) -> Self {
        let ids = labels
            .iter()
            .enumerate()
            .map(|(i, label)| (label.clone(), i as u32))
            .collect();
        Self { labels, ids }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn id_of(&self, label: &str) -> Option<u32> {
        self.ids.get(label).copied()
    }

    pub fn label_of(&self, id: u32) -> Option<&str> {
        self.labels.get(id as usize).map(String::as_str)
    }

    /// Labels in id order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Replaces each example's raw label with its id.
    pub fn encode_examples(&self, examples: &[Example]) -> Result<Vec<LabeledExample>, ClassifierError> {
        examples
            .iter()
            .map(|example| {
                let label = self.id_of(&example.raw_label).ok_or_else(|| {
                    ClassifierError::ValidationError(format!("Label '{}' is not in the vocabulary", example.raw_label))
                })?;
                Ok(LabeledExample {
                    text: example.text.clone(),
                    label,
                })
            })
            .collect()
    }

    /// SHA-256 over `id\tlabel\n` lines in id order.
    pub fn fingerprint(&self) -> String {
        let mut canonical = String::new();
        for (id, label) in self.labels.iter().enumerate() {
            canonical.push_str(&format!("{}\t{}\n", id, label));
        }
        fingerprint_bytes(canonical.as_bytes())
    }

    /// Writes the flat `{label: id}` mapping.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ClassifierError> {
        let path = path.as_ref();
        let mapping: BTreeMap<&str, u32> = self.ids.iter().map(|(label, id)| (label.as_str(), *id)).collect();
        let json = serde_json::to_string_pretty(&mapping)
            .map_err(|e| ClassifierError::PersistenceError(format!("Failed to serialize vocabulary: {}", e)))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ClassifierError::PersistenceError(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        fs::write(path, json)
            .map_err(|e| ClassifierError::PersistenceError(format!("Failed to write {}: {}", path.display(), e)))?;
        log::info!("Label vocabulary written to {}", path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| ClassifierError::LoadError(format!("Failed to read {}: {}", path.display(), e)))?;
        let mapping: HashMap<String, u32> = serde_json::from_str(&contents)
            .map_err(|e| ClassifierError::LoadError(format!("Malformed vocabulary {}: {}", path.display(), e)))?;
        Self::from_pairs(mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn examples() -> Vec<Example> {
        vec![
            Example::new("Write a haiku", "creative_writing"),
            Example::new("Summarize this", "summarization"),
            Example::new("Who is the CEO?", "closed_qa"),
            Example::new("Another poem", "creative_writing"),
        ]
    }

    #[test]
    fn test_ids_are_sorted_and_dense() {
        let vocab = LabelVocabulary::build(&examples()).unwrap();
        assert_eq!(vocab.labels(), &["closed_qa", "creative_writing", "summarization"]);
        assert_eq!(vocab.id_of("summarization"), Some(2));
    }

    #[test]
    fn test_order_independent() {
        let mut reversed = examples();
        reversed.reverse();
        assert_eq!(
            LabelVocabulary::build(&examples()).unwrap(),
            LabelVocabulary::build(&reversed).unwrap()
        );
    }

    #[test]
    fn test_unknown_label_rejected() {
        let vocab = LabelVocabulary::build(&examples()).unwrap();
        let err = vocab.encode_examples(&[Example::new("x", "brainstorming")]);
        assert!(matches!(err, Err(ClassifierError::ValidationError(_))));
    }

    #[test]
    fn test_from_pairs_rejects_gaps() {
        let err = LabelVocabulary::from_pairs(vec![("a", 0), ("b", 2)]);
        assert!(matches!(err, Err(ClassifierError::LoadError(_))));
    }

    #[test]
    fn test_from_pairs_rejects_shared_id() {
        assert!(LabelVocabulary::from_pairs(vec![("a", 0), ("b", 0)]).is_err());
    }

    #[test]
    fn test_fingerprint_changes_with_ids() {
        let a = LabelVocabulary::from_pairs(vec![("x", 0), ("y", 1)]).unwrap();
        let b = LabelVocabulary::from_pairs(vec![("x", 1), ("y", 0)]).unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), a.clone().fingerprint());
    }

    #[test]
    fn test_save_load_preserves_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(VOCABULARY_FILE);
        let vocab = LabelVocabulary::build(&examples()).unwrap();
        vocab.save(&path).unwrap();
        let loaded = LabelVocabulary::load(&path).unwrap();
        assert_eq!(loaded, vocab);
        assert_eq!(loaded.fingerprint(), vocab.fingerprint());
    }
}
