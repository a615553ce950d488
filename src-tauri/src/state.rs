use crate::config::AppConfig;
use crate::db::Database;
use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::llm::ChatModel;
use crate::pipeline::{ComparisonPipeline, ComparisonWeights, SyllabusChat};
use crate::presentation::{ChatLine, ComparisonView, UploadedDocument};
use crate::storage::{BlobStore, DocumentStore, StoredDocument};
use crate::telemetry::Telemetry;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentSlot {
    First,
    Second,
}

impl DocumentSlot {
    /// Local file stem the slot's working copy is written under.
    pub fn base_name(self) -> &'static str {
        match self {
            DocumentSlot::First => "syllabus1",
            DocumentSlot::Second => "syllabus2",
        }
    }
}

/// What the window currently shows: the two uploads and the chat history.
#[derive(Debug, Default)]
pub struct UiSession {
    first: Option<StoredDocument>,
    second: Option<StoredDocument>,
    chat_history: Vec<ChatLine>,
}

impl UiSession {
    fn slot_mut(&mut self, slot: DocumentSlot) -> &mut Option<StoredDocument> {
        match slot {
            DocumentSlot::First => &mut self.first,
            DocumentSlot::Second => &mut self.second,
        }
    }

    /// Both local copies, or `MissingDocuments` if a slot is empty.
    fn document_paths(&self) -> Result<Vec<PathBuf>> {
        match (&self.first, &self.second) {
            (Some(a), Some(b)) => Ok(vec![a.local_path.clone(), b.local_path.clone()]),
            _ => Err(Error::MissingDocuments),
        }
    }
}

pub struct AppState {
    config: AppConfig,
    documents: DocumentStore,
    comparison: tokio::sync::Mutex<ComparisonPipeline>,
    chat: tokio::sync::Mutex<SyllabusChat>,
    session: Mutex<UiSession>,
    telemetry: Telemetry,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        model: Arc<dyn ChatModel>,
        embedder: Arc<dyn Embedder>,
        db: Arc<Database>,
        blobs: Arc<dyn BlobStore>,
        work_dir: &Path,
    ) -> Self {
        let comparison = ComparisonPipeline::new(
            config.comparison.clone(),
            model.clone(),
            db.clone(),
            embedder.clone(),
        );
        let chat = SyllabusChat::new(&config.comparison, model, db, embedder);
        let telemetry = Telemetry::new(
            config.agentops_api_key.clone(),
            config.observability.endpoint.clone(),
        );
        Self {
            documents: DocumentStore::new(blobs, work_dir),
            comparison: tokio::sync::Mutex::new(comparison),
            chat: tokio::sync::Mutex::new(chat),
            session: Mutex::new(UiSession::default()),
            telemetry,
            config,
        }
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn settings(&self) -> BTreeMap<String, String> {
        self.config.masked()
    }

    /// `None` leaves the slot untouched and returns `None`.
    pub async fn upload(
        &self,
        slot: DocumentSlot,
        source: Option<&Path>,
    ) -> Result<Option<UploadedDocument>> {
        let stored = self
            .telemetry
            .record_function(
                "upload_document",
                self.documents.upload_optional(source, slot.base_name()),
            )
            .await;
        let stored = match stored {
            Ok(Some(stored)) => stored,
            Ok(None) => return Ok(None),
            Err(e) => {
                self.telemetry.log_error(e.to_string());
                return Err(e);
            }
        };
        let view = UploadedDocument::new(slot.base_name(), &stored);
        *self.session.lock().slot_mut(slot) = Some(stored);
        Ok(Some(view))
    }

    pub async fn compare(&self, weights: ComparisonWeights) -> Result<ComparisonView> {
        let documents = self.session.lock().document_paths()?;
        let mut pipeline = self.comparison.lock().await;
        let outcome = self
            .telemetry
            .record_function("compare_documents", pipeline.run(weights, documents))
            .await
            .inspect_err(|e| self.telemetry.log_error(e.to_string()))?;
        tracing::debug!(messages = outcome.transcript.len(), "comparison view built");
        Ok(ComparisonView::from(&outcome))
    }

    /// Ask one question and append both sides to the history.
    pub async fn send_chat(&self, content: &str) -> Result<Vec<ChatLine>> {
        let documents = self.session.lock().document_paths()?;
        let mut chat = self.chat.lock().await;
        let answer = self
            .telemetry
            .record_function("send_chat_message", chat.ask(content, documents))
            .await
            .inspect_err(|e| self.telemetry.log_error(e.to_string()))?;

        let mut session = self.session.lock();
        session.chat_history.push(ChatLine::user(content));
        session.chat_history.push(ChatLine::reply(answer));
        Ok(session.chat_history.clone())
    }

    pub fn chat_history(&self) -> Vec<ChatLine> {
        self.session.lock().chat_history.clone()
    }

    pub fn clear_chat_history(&self) {
        self.session.lock().chat_history.clear();
    }
}
