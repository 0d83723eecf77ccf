//! Error kinds raised by the loading and joining stages.
//!
//! A state whose canonical key cannot be resolved is not an error: it is
//! represented as `None` by [`crate::normalize::KeyNormalizer`].

use thiserror::Error;

/// A source could not be fetched or its payload is malformed.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("source {source_ref} is unreachable: {reason}")]
    Unreachable { source_ref: String, reason: String },

    #[error("CSV payload has an empty header row")]
    EmptyHeader,

    #[error("CSV line {line} has {found} columns, header has {expected}")]
    ColumnMismatch {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("malformed CSV payload: {0}")]
    Csv(#[from] csv::Error),

    #[error("malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload is not valid UTF-8 or gzip: {0}")]
    Encoding(#[from] std::io::Error),
}

/// A secondary dataset holds more than one record for the same canonical key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("dataset {dataset} has more than one record for key {key}")]
pub struct JoinAmbiguityError {
    pub dataset: String,
    pub key: String,
}

/// The alias table maps one alternate name to two different canonical names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("alias {alias} maps to both {first} and {second}")]
pub struct AliasError {
    pub alias: String,
    pub first: String,
    pub second: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Alias(#[from] AliasError),
}
