use super::{AgentRole, AgentSession, Participant, TranscriptMessage};
use crate::error::Result;
use crate::llm::{ChatMessage, ChatModel, ChatRequest, LlmOptions};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    pub system_message: String,
    pub description: String,
    pub options: LlmOptions,
}

/// LLM-backed agent: replies by sending its system prompt plus everything it
/// has seen to the model.
pub struct AssistantAgent {
    config: AgentConfig,
    role: AgentRole,
    model: Arc<dyn ChatModel>,
    session: AgentSession,
}

impl AssistantAgent {
    pub fn new(config: AgentConfig, role: AgentRole, model: Arc<dyn ChatModel>) -> Self {
        Self {
            config,
            role,
            model,
            session: AgentSession::default(),
        }
    }

    /// Own turns become `assistant` messages; everyone else's are `user`
    /// messages tagged with the sender's name.
    fn build_request(&self) -> ChatRequest {
        let mut messages = Vec::with_capacity(self.session.messages().len() + 1);
        messages.push(ChatMessage::system(&self.config.system_message));
        for m in self.session.messages() {
            if m.name == self.config.name {
                messages.push(ChatMessage::assistant(&m.content));
            } else {
                messages.push(ChatMessage::user(&m.content).named(&m.name));
            }
        }
        ChatRequest {
            messages,
            model: self.model.model_id().to_string(),
            options: self.config.options.clone(),
        }
    }
}

#[async_trait]
impl Participant for AssistantAgent {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn role(&self) -> AgentRole {
        self.role
    }

    fn receive(&mut self, message: &TranscriptMessage) {
        self.session.record(message);
    }

    async fn generate_reply(&mut self) -> Result<Option<String>> {
        let request = self.build_request();
        let started = std::time::Instant::now();
        let response = self.model.chat(&request).await?;
        tracing::info!(
            agent = %self.config.name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            chars = response.content.len(),
            "agent replied"
        );
        Ok(Some(response.content))
    }

    fn reset(&mut self) {
        self.session.reset();
    }
}
