//! tabvault error types

use thiserror::Error;

/// tabvault error type
#[derive(Error, Debug)]
pub enum Error {
    /// Input text is not syntactically valid JSON
    #[error("Invalid JSON: {reason}")]
    Parse {
        /// Parser failure reason, including line and column
        reason: String,
        /// The text that failed to parse, kept for diagnostics
        input: String,
    },

    /// Parsed JSON cannot be read as a sequence of records
    #[error("Unsupported JSON shape: {0}")]
    Shape(String),

    /// Key is absent or its TTL has elapsed
    #[error("Data ID (key) not found or has expired")]
    NotFound,

    /// Backend I/O failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// A stored payload could not be read back as CSV
    #[error("Transcode error: {0}")]
    Transcode(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable machine-readable code for this error kind.
    ///
    /// Callers use it to tell "fix your input" (`INVALID_JSON`,
    /// `INVALID_SHAPE`) from "ask again later" (`STORAGE_ERROR`) from
    /// "the key is gone, rerun the pipeline" (`NOT_FOUND`).
    pub fn code(&self) -> &'static str {
        match self {
            Error::Parse { .. } => "INVALID_JSON",
            Error::Shape(_) => "INVALID_SHAPE",
            Error::NotFound => "NOT_FOUND",
            Error::Storage(_) => "STORAGE_ERROR",
            Error::Transcode(_) => "CORRUPT_ARTIFACT",
            Error::Config(_) | Error::Io(_) => "INTERNAL",
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Storage(format!("storage task failed: {}", e))
    }
}

/// Result type alias for tabvault operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct_per_category() {
        let parse = Error::Parse {
            reason: "EOF".into(),
            input: "{".into(),
        };
        assert_eq!(parse.code(), "INVALID_JSON");
        assert_eq!(Error::Shape("x".into()).code(), "INVALID_SHAPE");
        assert_eq!(Error::NotFound.code(), "NOT_FOUND");
        assert_eq!(Error::Storage("disk".into()).code(), "STORAGE_ERROR");
    }

    #[test]
    fn test_parse_message_omits_input() {
        let err = Error::Parse {
            reason: "key must be a string at line 1 column 2".into(),
            input: "{not json".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("line 1 column 2"));
        assert!(!msg.contains("{not json"));
    }
}
