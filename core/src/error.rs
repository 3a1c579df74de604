use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by index building and retrieval.
///
/// Only `Io`, `MissingArtifact` and `Config` ever reach a caller. `Decode` and
/// `MalformedRecord` are built so they can be logged, then the offending
/// document or line is skipped.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} could not be decoded with any configured encoding")]
    Decode { path: PathBuf },

    #[error("malformed record in {file} at line {line}: {reason}")]
    MalformedRecord {
        file: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("index artifact missing or empty: {path}")]
    MissingArtifact { path: PathBuf },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl IndexError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IndexError::Io { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
