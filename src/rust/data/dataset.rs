use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde_json::Value;

use crate::classifier::{ClassifierError, TokenizedText, TokenizerAdapter};

/// A raw training record: instruction text and its category name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    pub text: String,
    pub raw_label: String,
}

impl Example {
    pub fn new(text: impl Into<String>, raw_label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            raw_label: raw_label.into(),
        }
    }
}

/// An example whose category has been replaced by its vocabulary id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledExample {
    pub text: String,
    pub label: u32,
}

/// A labeled example after tokenization, ready for batching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizedExample {
    pub input: TokenizedText,
    pub label: u32,
}

/// Tokenizes every example with the training-time (padded) policy.
pub fn tokenize_examples(
    tokenizer: &TokenizerAdapter,
    examples: &[LabeledExample],
) -> Result<Vec<TokenizedExample>, ClassifierError> {
    log::info!("Tokenizing {} examples", examples.len());
    examples
        .iter()
        .map(|example| {
            Ok(TokenizedExample {
                input: tokenizer.encode(&example.text)?,
                label: example.label,
            })
        })
        .collect()
}

/// Reads newline-delimited JSON records, taking `text_field` and `label_field` from each.
///
/// Blank lines are skipped. Any other malformed line aborts the load and names the line.
pub fn load_jsonl(
    path: impl AsRef<Path>,
    text_field: &str,
    label_field: &str,
) -> Result<Vec<Example>, ClassifierError> {
    let path = path.as_ref();
    log::info!("Loading dataset from {}", path.display());
    let file = File::open(path)
        .map_err(|e| ClassifierError::LoadError(format!("Failed to open {}: {}", path.display(), e)))?;

    let mut examples = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line_no = index + 1;
        let line = line.map_err(|e| ClassifierError::LoadError(format!("Line {}: {}", line_no, e)))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: Value = serde_json::from_str(&line)
            .map_err(|e| ClassifierError::LoadError(format!("Line {}: invalid JSON: {}", line_no, e)))?;
        let text = string_field(&record, text_field, line_no)?;
        let raw_label = string_field(&record, label_field, line_no)?;
        examples.push(Example { text, raw_label });
    }

    if examples.is_empty() {
        return Err(ClassifierError::LoadError(format!("No records found in {}", path.display())));
    }
    log::info!("Loaded {} examples", examples.len());
    Ok(examples)
}

fn string_field(record: &Value, field: &str, line_no: usize) -> Result<String, ClassifierError> {
    match record.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(ClassifierError::LoadError(format!(
            "Line {}: field '{}' must be a string, found {}",
            line_no, field, other
        ))),
        None => Err(ClassifierError::LoadError(format!("Line {}: missing field '{}'", line_no, field))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_lines(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    #[test]
    fn test_loads_records_and_skips_blank_lines() {
        let file = write_lines(&[
            r#"{"instruction": "Write a poem", "category": "creative_writing", "response": "..."}"#,
            "",
            r#"{"instruction": "Who wrote Hamlet?", "category": "open_qa"}"#,
        ]);
        let examples = load_jsonl(file.path(), "instruction", "category").unwrap();
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[1], Example::new("Who wrote Hamlet?", "open_qa"));
    }

    #[test]
    fn test_missing_field_names_line() {
        let file = write_lines(&[
            r#"{"instruction": "Write a poem", "category": "creative_writing"}"#,
            r#"{"instruction": "No category here"}"#,
        ]);
        let err = load_jsonl(file.path(), "instruction", "category").unwrap_err();
        match err {
            ClassifierError::LoadError(msg) => assert!(msg.contains("Line 2")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_json_rejected() {
        let file = write_lines(&["{not json"]);
        assert!(matches!(
            load_jsonl(file.path(), "instruction", "category"),
            Err(ClassifierError::LoadError(_))
        ));
    }

    #[test]
    fn test_empty_file_rejected() {
        let file = write_lines(&[]);
        assert!(load_jsonl(file.path(), "instruction", "category").is_err());
    }

    #[test]
    fn test_missing_file_rejected() {
        assert!(matches!(
            load_jsonl("/nonexistent/data.jsonl", "instruction", "category"),
            Err(ClassifierError::LoadError(_))
        ));
    }
}
