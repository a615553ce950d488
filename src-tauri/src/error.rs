use serde::Serialize;

use crate::db::CollectionError;
use crate::llm::LlmError;
use crate::scores::ScoreError;
use crate::storage::StorageError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Missing secret: {0}")]
    MissingSecret(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Collection error: {0}")]
    Collection(#[from] CollectionError),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Embedding error: {0}")]
    Embedding(String),
    #[error("Unsupported file type: .{0}")]
    UnsupportedFileType(String),
    #[error("Document is empty: {0}")]
    EmptyDocument(String),
    #[error("Please upload both files to compare.")]
    MissingDocuments,
    #[error("Unexpected transcript: {0}")]
    Transcript(String),
    #[error(transparent)]
    Score(#[from] ScoreError),
    #[error("Weight for {name} must be between 0 and 100, got {value}")]
    InvalidWeight { name: &'static str, value: u16 },
}

impl Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
