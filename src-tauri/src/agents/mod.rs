//! Conversational agents and the round-robin group chat that drives them.
//!
//! Each agent is a value-type configuration plus an [`AgentSession`] holding
//! the messages it has seen. Sessions are owned by the agent and cleared with
//! [`Participant::reset`]; nothing is shared between agents except through the
//! broadcast in [`group_chat`].

pub mod assistant;
pub mod group_chat;
pub mod prompts;
pub mod retrieve;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use assistant::AssistantAgent;
pub use group_chat::run_round_robin;
pub use retrieve::{RetrieveConfig, RetrieveProxyAgent};

/// Sentinel an agent puts at the very end of a message to end the chat.
pub const TERMINATION_TOKEN: &str = "TERMINATE";

/// True when the last nine characters of `content` spell `TERMINATE`,
/// ignoring case.
pub fn is_termination_msg(content: &str) -> bool {
    let n = TERMINATION_TOKEN.chars().count();
    let tail: String = {
        let chars: Vec<char> = content.chars().collect();
        chars[chars.len().saturating_sub(n)..].iter().collect()
    };
    tail.to_uppercase() == TERMINATION_TOKEN
}

/// What a participant is for; transcript extraction matches on this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    RetrieveProxy,
    Specialist,
    Formatter,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub role: AgentRole,
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<TranscriptMessage>,
}

impl Transcript {
    pub fn push(&mut self, message: TranscriptMessage) {
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&TranscriptMessage> {
        self.messages.last()
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &TranscriptMessage> {
        self.messages.iter()
    }

    /// First message sent by an agent with `role`.
    pub fn first_from(&self, role: AgentRole) -> Option<&TranscriptMessage> {
        self.messages.iter().find(|m| m.role == role)
    }

    #[cfg(test)]
    pub fn contains_text(&self, needle: &str) -> bool {
        self.messages.iter().any(|m| m.content.contains(needle))
    }
}

/// Per-agent conversation memory.
#[derive(Debug, Clone, Default)]
pub struct AgentSession {
    messages: Vec<TranscriptMessage>,
    consecutive_auto_replies: usize,
}

impl AgentSession {
    pub fn record(&mut self, message: &TranscriptMessage) {
        self.messages.push(message.clone());
    }

    pub fn messages(&self) -> &[TranscriptMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&TranscriptMessage> {
        self.messages.last()
    }

    pub fn auto_replies(&self) -> usize {
        self.consecutive_auto_replies
    }

    pub fn count_auto_reply(&mut self) {
        self.consecutive_auto_replies += 1;
    }

    pub fn reset(&mut self) {
        self.messages.clear();
        self.consecutive_auto_replies = 0;
    }
}

/// A member of a chat. `generate_reply` returning `None` means the agent
/// declines to speak, which ends the chat.
#[async_trait]
pub trait Participant: Send {
    fn name(&self) -> &str;

    fn role(&self) -> AgentRole;

    fn receive(&mut self, message: &TranscriptMessage);

    async fn generate_reply(&mut self) -> Result<Option<String>>;

    fn reset(&mut self);
}
