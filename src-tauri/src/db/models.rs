use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Chunk {
    pub id: String,
    pub collection: String,
    pub source: String,
    pub content: String,
    pub chunk_index: i32,
}

/// A chunk paired with its stored embedding, as loaded for ranking.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}
