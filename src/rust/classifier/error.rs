use std::fmt;
use std::io;

/// Represents the different types of errors that can occur while training or serving the classifier.
#[derive(Debug)]
pub enum ClassifierError {
    /// Training data, vocabulary or artifact files are missing or malformed
    LoadError(String),
    /// A vocabulary, checkpoint or artifact file could not be written
    PersistenceError(String),
    /// Two pieces of persisted state do not belong together (vocabulary vs. model, tokenizer drift)
    ConfigMismatch(String),
    /// Error occurred while loading or using the tokenizer
    TokenizerError(String),
    /// Error occurred while building or running the model
    ModelError(String),
    /// Error occurred while assembling a classifier from its parts
    BuildError(String),
    /// Error occurred inside the epoch loop
    TrainingError(String),
    /// Error occurred while making predictions
    PredictionError(String),
    /// Error occurred due to invalid input parameters
    ValidationError(String),
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadError(msg) => write!(f, "Load error: {}", msg),
            Self::PersistenceError(msg) => write!(f, "Persistence error: {}", msg),
            Self::ConfigMismatch(msg) => write!(f, "Configuration mismatch: {}", msg),
            Self::TokenizerError(msg) => write!(f, "Tokenizer error: {}", msg),
            Self::ModelError(msg) => write!(f, "Model error: {}", msg),
            Self::BuildError(msg) => write!(f, "Build error: {}", msg),
            Self::TrainingError(msg) => write!(f, "Training error: {}", msg),
            Self::PredictionError(msg) => write!(f, "Prediction error: {}", msg),
            Self::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ClassifierError {}

impl From<candle_core::Error> for ClassifierError {
    fn from(err: candle_core::Error) -> Self {
        ClassifierError::ModelError(err.to_string())
    }
}

impl From<io::Error> for ClassifierError {
    fn from(err: io::Error) -> Self {
        ClassifierError::PersistenceError(err.to_string())
    }
}

impl From<serde_json::Error> for ClassifierError {
    fn from(err: serde_json::Error) -> Self {
        ClassifierError::LoadError(err.to_string())
    }
}
