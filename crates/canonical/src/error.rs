use thiserror::Error;

/// Errors that can occur during canonicalisation.
///
/// A parsed [`serde_json::Value`] always canonicalises; only pre-serialized
/// text can fail, when it does not denote a JSON value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CanonicalisationError {
    #[error("input is not valid JSON (line {line}, column {column}): {message}")]
    InvalidJson {
        line: usize,
        column: usize,
        message: String,
    },
}

impl From<serde_json::Error> for CanonicalisationError {
    fn from(err: serde_json::Error) -> Self {
        CanonicalisationError::InvalidJson {
            line: err.line(),
            column: err.column(),
            message: err.to_string(),
        }
    }
}
