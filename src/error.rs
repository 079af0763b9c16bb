//! Error types for skip-gram training and querying.

use thiserror::Error;

/// The main error type for skip-gram operations.
#[derive(Error, Debug)]
pub enum SkipGramError {
    /// A queried word is not in the vocabulary.
    #[error("Word not found in vocabulary: {0}")]
    WordNotFound(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for skip-gram operations.
pub type Result<T> = std::result::Result<T, SkipGramError>;

impl From<bincode::Error> for SkipGramError {
    fn from(err: bincode::Error) -> Self {
        SkipGramError::Serialization(err.to_string())
    }
}
