use super::prompts::{retrieve_message, DEFAULT_AUTO_REPLY, UPDATE_CONTEXT};
use super::{is_termination_msg, AgentRole, AgentSession, Participant, TranscriptMessage};
use crate::db::models::Chunk;
use crate::db::{CollectionMode, CollectionState, Database};
use crate::doc_processor;
use crate::embedding::{search_similar, Embedder};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

/// Retrieval settings for the proxy agent.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrieveConfig {
    pub name: String,
    pub docs_paths: Vec<PathBuf>,
    pub chunk_token_size: usize,
    pub collection_name: String,
    pub overwrite: bool,
    pub get_or_create: bool,
    pub n_results: usize,
    pub max_consecutive_auto_reply: usize,
    pub default_auto_reply: String,
    pub update_context: bool,
}

impl RetrieveConfig {
    pub fn new(name: impl Into<String>, collection_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            docs_paths: Vec::new(),
            chunk_token_size: 1000,
            collection_name: collection_name.into(),
            overwrite: true,
            get_or_create: true,
            n_results: 3,
            max_consecutive_auto_reply: 3,
            default_auto_reply: DEFAULT_AUTO_REPLY.to_string(),
            update_context: true,
        }
    }
}

/// Proxy that holds the reference documents. It opens a chat with the problem
/// and the most relevant chunks, then only ever auto-replies (no human input).
pub struct RetrieveProxyAgent {
    config: RetrieveConfig,
    db: Arc<Database>,
    embedder: Arc<dyn Embedder>,
    session: AgentSession,
    indexed: bool,
    problem: Option<String>,
    sent_chunks: HashSet<String>,
}

/// `UPDATE CONTEXT` counts when it opens or closes the reply.
fn asks_for_more_context(content: &str) -> bool {
    let upper = content.trim().to_uppercase();
    let head: String = upper.chars().take(20).collect();
    let tail: String = {
        let chars: Vec<char> = upper.chars().collect();
        chars[chars.len().saturating_sub(20)..].iter().collect()
    };
    head.contains(UPDATE_CONTEXT) || tail.contains(UPDATE_CONTEXT)
}

impl RetrieveProxyAgent {
    pub fn new(config: RetrieveConfig, db: Arc<Database>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            config,
            db,
            embedder,
            session: AgentSession::default(),
            indexed: false,
            problem: None,
            sent_chunks: HashSet::new(),
        }
    }

    pub fn set_documents(&mut self, paths: Vec<PathBuf>) {
        if paths != self.config.docs_paths {
            self.indexed = false;
        }
        self.config.docs_paths = paths;
    }

    /// Build the opening message: the problem plus the top `n_results` chunks.
    pub async fn initiate(&mut self, problem: &str) -> Result<String> {
        self.problem = Some(problem.to_string());
        let context = self.next_context(problem).await?.unwrap_or_default();
        Ok(retrieve_message(problem, &context))
    }

    async fn ensure_indexed(&mut self) -> Result<()> {
        if self.indexed {
            return Ok(());
        }
        let mode = CollectionMode {
            overwrite: self.config.overwrite,
            get_or_create: self.config.get_or_create,
        };
        let state = self.db.prepare_collection(&self.config.collection_name, mode)?;

        if state == CollectionState::Created {
            let mut texts = Vec::new();
            let mut chunks = Vec::new();
            for path in &self.config.docs_paths {
                let parsed = doc_processor::parse_file(path)?;
                let source = path.display().to_string();
                tracing::debug!(
                    source = %source,
                    file_type = %parsed.file_type,
                    "parsed document"
                );
                let pieces =
                    doc_processor::chunk_text(&parsed.content, self.config.chunk_token_size);
                for (i, text) in pieces.into_iter().enumerate() {
                    chunks.push(Chunk {
                        id: uuid::Uuid::new_v4().to_string(),
                        collection: self.config.collection_name.clone(),
                        source: source.clone(),
                        content: text.clone(),
                        chunk_index: i as i32,
                    });
                    texts.push(text);
                }
            }
            if texts.is_empty() {
                self.indexed = true;
                return Ok(());
            }
            let embeddings = self.embedder.embed(&texts).await.map_err(Error::Embedding)?;
            if embeddings.len() != chunks.len() {
                return Err(Error::Embedding(format!(
                    "expected {} embeddings, got {}",
                    chunks.len(),
                    embeddings.len()
                )));
            }
            let rows: Vec<(Chunk, Vec<f32>)> = chunks.into_iter().zip(embeddings).collect();
            self.db.insert_chunks(&rows)?;
            tracing::info!(
                collection = %self.config.collection_name,
                documents = self.config.docs_paths.len(),
                chunks = rows.len(),
                "indexed documents"
            );
        } else {
            let chunks = self.db.chunk_count(&self.config.collection_name)?;
            tracing::info!(collection = %self.config.collection_name, chunks, "reusing collection");
        }
        self.indexed = true;
        Ok(())
    }

    /// The next `n_results` chunks most similar to `query` that have not been
    /// sent yet in this session, joined as one context block.
    async fn next_context(&mut self, query: &str) -> Result<Option<String>> {
        self.ensure_indexed().await?;
        let candidates = self.db.embedded_chunks(&self.config.collection_name)?;
        let query_embedding = self
            .embedder
            .embed(&[query.to_string()])
            .await
            .map_err(Error::Embedding)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("no embedding returned for query".into()))?;

        let unsent = candidates
            .iter()
            .filter(|c| !self.sent_chunks.contains(&c.chunk.id))
            .map(|c| (c.chunk.id.as_str(), c.embedding.as_slice()));
        let ranked = search_similar(&query_embedding, unsent, self.config.n_results);
        if ranked.is_empty() {
            return Ok(None);
        }

        let mut parts = Vec::with_capacity(ranked.len());
        for (id, score) in ranked {
            if let Some(c) = candidates.iter().find(|c| c.chunk.id == id) {
                tracing::debug!(chunk = %id, score, source = %c.chunk.source, "retrieved chunk");
                parts.push(c.chunk.content.clone());
                self.sent_chunks.insert(id.to_string());
            }
        }
        Ok(Some(parts.join("\n\n")))
    }
}

#[async_trait]
impl Participant for RetrieveProxyAgent {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn role(&self) -> AgentRole {
        AgentRole::RetrieveProxy
    }

    fn receive(&mut self, message: &TranscriptMessage) {
        self.session.record(message);
    }

    async fn generate_reply(&mut self) -> Result<Option<String>> {
        let Some(last) = self.session.last().cloned() else {
            return Ok(None);
        };
        if is_termination_msg(&last.content) {
            return Ok(None);
        }
        if self.session.auto_replies() >= self.config.max_consecutive_auto_reply {
            tracing::debug!(agent = %self.config.name, "auto reply limit reached");
            return Ok(None);
        }
        self.session.count_auto_reply();

        if self.config.update_context && asks_for_more_context(&last.content) {
            let problem = self.problem.clone().unwrap_or_default();
            if let Some(context) = self.next_context(&problem).await? {
                tracing::info!(agent = %self.config.name, "updating context");
                return Ok(Some(retrieve_message(&problem, &context)));
            }
        }
        Ok(Some(self.config.default_auto_reply.clone()))
    }

    /// Clears memory and forgets what was retrieved; the next retrieval
    /// re-applies the collection mode so fresh uploads are indexed.
    fn reset(&mut self) {
        self.session.reset();
        self.problem = None;
        self.sent_chunks.clear();
        self.indexed = false;
    }
}
