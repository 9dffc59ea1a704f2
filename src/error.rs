use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A single problem found in a composition description, addressed by its field path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Every problem found while validating one description.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl std::error::Error for ValidationErrors {}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation error(s)", self.0.len())?;
        for err in &self.0 {
            write!(f, "; {}", err)?;
        }
        Ok(())
    }
}

impl ValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }
}

/// Failure while serializing or writing a MIDI artifact. Fatal to one request only.
#[derive(Error, Debug)]
pub enum EncodingError {
    #[error("Failed to serialize MIDI data: {0}")]
    Serialize(#[source] io::Error),

    #[error("Failed to write MIDI artifact to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failure while rewriting the metadata snapshot.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to serialize metadata snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write metadata snapshot to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Metadata store lock was poisoned")]
    Poisoned,
}

#[derive(Error, Debug)]
pub enum NotemintError {
    #[error("Invalid composition: {0}")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    #[error("MIDI file for composition {id} is missing at {path}")]
    ArtifactMissing { id: String, path: PathBuf },

    #[error("Invalid pagination: {0}")]
    InvalidPagination(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T, E = NotemintError> = std::result::Result<T, E>;
