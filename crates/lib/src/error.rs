use std::path::PathBuf;

use thiserror::Error;

/// A mutation was rejected before touching the store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    EmptyField(&'static str),

    #[error("invalid {field}: {value:?}")]
    InvalidValue { field: &'static str, value: String },
}

impl ValidationError {
    pub(crate) fn invalid(field: &'static str, value: &str) -> Self {
        ValidationError::InvalidValue {
            field,
            value: value.to_string(),
        }
    }
}

/// Requires `value` to contain something besides whitespace.
pub(crate) fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::EmptyField(field))
    } else {
        Ok(())
    }
}

/// Local storage could not be read or written.
///
/// Never surfaced by mutations: the board logs it and keeps the in-memory
/// snapshot as the source of truth.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("local storage I/O on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("local storage encoding")]
    Encoding(#[from] serde_json::Error),
}
