use super::{ChatRequest, ChatResponse, LlmError};
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct ClaudeConfig {
    pub api_key: String,
    pub base_url: String,
}

#[derive(Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ClaudeMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct ClaudeMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContent>,
}

#[derive(Deserialize)]
struct ClaudeContent {
    #[serde(default)]
    text: Option<String>,
}

/// Claude takes the system prompt out of band and requires strictly
/// alternating user/assistant turns, so consecutive same-role turns are merged.
/// Speaker names are folded into the text since the API has no `name` field.
fn build_request(request: &ChatRequest) -> ClaudeRequest {
    let system: Vec<&str> = request
        .messages
        .iter()
        .filter(|m| m.role == "system")
        .map(|m| m.content.as_str())
        .collect();

    let mut messages: Vec<ClaudeMessage> = Vec::new();
    for m in request.messages.iter().filter(|m| m.role != "system") {
        let content = match &m.name {
            Some(name) if m.role == "user" => format!("{}: {}", name, m.content),
            _ => m.content.clone(),
        };
        match messages.last_mut() {
            Some(last) if last.role == m.role => {
                last.content.push_str("\n\n");
                last.content.push_str(&content);
            }
            _ => messages.push(ClaudeMessage {
                role: m.role.clone(),
                content,
            }),
        }
    }

    ClaudeRequest {
        model: request.model.clone(),
        max_tokens: 4096,
        messages,
        system: (!system.is_empty()).then(|| system.join("\n\n")),
        temperature: request.options.temperature,
    }
}

pub async fn chat(config: &ClaudeConfig, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
    let client = Client::builder().timeout(request.options.timeout).build()?;
    let body = build_request(request);

    let resp = client
        .post(format!("{}/v1/messages", config.base_url))
        .header("Content-Type", "application/json")
        .header("x-api-key", &config.api_key)
        .header("anthropic-version", "2023-06-01")
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        return Err(LlmError::Api {
            status,
            message: text,
        });
    }

    let data: ClaudeResponse = resp.json().await?;
    let content: String = data.content.into_iter().filter_map(|c| c.text).collect();

    Ok(ChatResponse {
        content,
        model: request.model.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatMessage, LlmOptions};

    #[test]
    fn test_build_request_merges_consecutive_roles() {
        let request = ChatRequest {
            messages: vec![
                ChatMessage::system("be brief"),
                ChatMessage::user("context").named("Boss_Assistant"),
                ChatMessage::user("[1, 2, 3, 4]").named("list_agent"),
                ChatMessage::assistant("ok"),
            ],
            model: "claude-sonnet-4-20250514".into(),
            options: LlmOptions::default(),
        };

        let body = build_request(&request);
        assert_eq!(body.system.as_deref(), Some("be brief"));
        assert_eq!(body.messages.len(), 2);
        assert_eq!(
            body.messages[0].content,
            "Boss_Assistant: context\n\nlist_agent: [1, 2, 3, 4]"
        );
        assert_eq!(body.messages[1].role, "assistant");
    }
}
