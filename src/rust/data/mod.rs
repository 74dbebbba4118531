mod dataset;
mod splitter;
mod vocabulary;

pub use dataset::{load_jsonl, tokenize_examples, Example, LabeledExample, TokenizedExample};
pub use splitter::{train_test_split, DatasetSplit};
pub use vocabulary::{LabelVocabulary, VOCABULARY_FILE};
