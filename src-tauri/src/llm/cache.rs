use super::{ChatMessage, ChatModel, ChatRequest, ChatResponse, LlmError};
use crate::db::Database;
use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Wraps a model with the SQLite response cache. Only requests carrying a
/// `cache_seed` are cached; changing the seed gives a fresh cache namespace.
pub struct CachedModel {
    inner: Arc<dyn ChatModel>,
    db: Arc<Database>,
}

#[derive(Serialize)]
struct CacheKey<'a> {
    cache_seed: u64,
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: Option<f32>,
    seed: Option<u64>,
}

fn cache_key(cache_seed: u64, request: &ChatRequest) -> Result<String, LlmError> {
    let key = CacheKey {
        cache_seed,
        model: &request.model,
        messages: &request.messages,
        temperature: request.options.temperature,
        seed: request.options.seed,
    };
    let bytes = serde_json::to_vec(&key).map_err(|e| LlmError::Cache(e.to_string()))?;
    let digest = Sha256::digest(&bytes);
    Ok(digest.iter().map(|b| format!("{:02x}", b)).collect())
}

impl CachedModel {
    pub fn new(inner: Arc<dyn ChatModel>, db: Arc<Database>) -> Self {
        Self { inner, db }
    }
}

#[async_trait]
impl ChatModel for CachedModel {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let Some(cache_seed) = request.options.cache_seed else {
            return self.inner.chat(request).await;
        };

        let key = cache_key(cache_seed, request)?;
        let hit = self
            .db
            .cached_response(&key)
            .map_err(|e| LlmError::Cache(e.to_string()))?;
        if let Some(content) = hit {
            tracing::debug!(cache_seed, "llm cache hit");
            return Ok(ChatResponse {
                content,
                model: request.model.clone(),
            });
        }

        let response = self.inner.chat(request).await?;
        if let Err(e) = self.db.store_response(&key, &response.content) {
            tracing::warn!(error = %e, "failed to store llm cache entry");
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedModel;
    use crate::llm::LlmOptions;

    fn request(cache_seed: Option<u64>, question: &str) -> ChatRequest {
        ChatRequest {
            messages: vec![ChatMessage::system("fmt"), ChatMessage::user(question)],
            model: "scripted".into(),
            options: LlmOptions {
                temperature: Some(0.0),
                cache_seed,
                ..LlmOptions::default()
            },
        }
    }

    fn cached(model: Arc<ScriptedModel>) -> CachedModel {
        CachedModel::new(model, Arc::new(Database::in_memory().unwrap()))
    }

    #[tokio::test]
    async fn test_seeded_requests_are_replayed() {
        let inner = Arc::new(ScriptedModel::new(["[1, 2, 3, 4]", "[5, 6, 7, 8]"]));
        let model = cached(inner.clone());

        let first = model.chat(&request(Some(41), "scores")).await.unwrap();
        let second = model.chat(&request(Some(41), "scores")).await.unwrap();
        assert_eq!(first.content, "[1, 2, 3, 4]");
        assert_eq!(second.content, "[1, 2, 3, 4]");
        assert_eq!(inner.call_count(), 1);

        let other_seed = model.chat(&request(Some(42), "scores")).await.unwrap();
        assert_eq!(other_seed.content, "[5, 6, 7, 8]");
        assert_eq!(inner.call_count(), 2);
    }

    #[tokio::test]
    async fn test_unseeded_requests_always_hit_the_model() {
        let inner = Arc::new(ScriptedModel::new(["a", "b"]));
        let model = cached(inner.clone());
        assert_eq!(model.chat(&request(None, "q")).await.unwrap().content, "a");
        assert_eq!(model.chat(&request(None, "q")).await.unwrap().content, "b");
        assert_eq!(inner.call_count(), 2);
    }

    #[test]
    fn test_key_depends_on_messages() {
        let a = cache_key(41, &request(Some(41), "one")).unwrap();
        let b = cache_key(41, &request(Some(41), "two")).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }
}
