use std::path::PathBuf;

use thiserror::Error;

use crate::providers::ProviderError;

pub type Result<T> = std::result::Result<T, MemoryError>;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing credential: environment variable {0} is not set")]
    MissingCredential(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Embedding request failed: {0}")]
    Embedding(ProviderError),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid index dimension: {0} (must be greater than zero)")]
    InvalidDimension(usize),

    #[error("Position {position} is out of range for {len} entries")]
    OutOfRange { position: usize, len: usize },

    #[error("No eligible source files to index")]
    NoInput,

    #[error("No relevant files found")]
    NoMatches,

    #[error("None of the retrieved files could be read")]
    NoContext,

    #[error("Index not found at {}; run `game-memory build` first", .0.display())]
    IndexNotFound(PathBuf),

    #[error("No index has been built or loaded")]
    IndexNotLoaded,

    #[error("Index snapshot is invalid: {0}")]
    Snapshot(String),

    #[error("Index holds {vectors} vectors but the ledger holds {references} references")]
    Misaligned { vectors: usize, references: usize },

    #[error("Filename ledger does not belong to the index snapshot; rebuild the index")]
    LedgerMismatch,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod index;
pub mod ledger;
pub mod preprocess;
pub mod providers;
pub mod retrieval;
pub mod sources;
pub mod store;
