// Error taxonomy for reading and writing CSV data.

use std::path::PathBuf;
use thiserror::Error;

/// Failure while parsing or writing CSV text.
///
/// Parse failures abort the whole operation; no partial result is returned
/// alongside them. I/O errors are carried through unchanged.
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("malformed CSV at line {line}: {message}")]
    Parse { line: u64, message: String },

    #[error("unterminated quoted field starting at line {line}")]
    UnterminatedQuote { line: u64 },

    #[error("I/O error on {path}: {source}")]
    File {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode CSV: {0}")]
    Write(String),
}

impl CsvError {
    /// Returns true if this error is a missing-file error.
    pub fn is_not_found(&self) -> bool {
        match self {
            CsvError::File { source, .. } | CsvError::Io(source) => {
                source.kind() == std::io::ErrorKind::NotFound
            }
            _ => false,
        }
    }
}

impl From<csv::Error> for CsvError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        let message = err.to_string();
        match err.into_kind() {
            csv::ErrorKind::Io(source) => CsvError::Io(source),
            _ => CsvError::Parse { line, message },
        }
    }
}
