use crate::client::ServiceClient;
use async_trait::async_trait;
use etude_ports::services::{
    AnalysisDto, AnalyzeRequest, AssistantService, ChatMessageRequest, ServiceError, ThreadMessage,
};
use etude_ports::types::{SessionId, ThreadId};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateThreadRequest<'a> {
    session_id: &'a SessionId,
}

#[derive(Deserialize)]
struct CreateThreadResponse {
    #[serde(rename = "threadId", alias = "id", alias = "thread_id")]
    thread_id: ThreadId,
}

#[derive(Deserialize)]
struct ThreadResponse {
    #[serde(default)]
    messages: Vec<RawThreadMessage>,
}

#[derive(Deserialize)]
struct RawThreadMessage {
    #[serde(default)]
    id: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    content: Value,
    #[serde(default)]
    created_at: i64,
}

/// Client for the assistant service (analysis and tutor chat threads).
#[derive(Clone, Debug)]
pub struct HttpAssistantService {
    client: ServiceClient,
}

impl HttpAssistantService {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            client: ServiceClient::new(base_url, timeout)?,
        })
    }
}

#[async_trait]
impl AssistantService for HttpAssistantService {
    #[tracing::instrument(skip(self, req), fields(section = %req.performance.section))]
    async fn analyze(&self, req: &AnalyzeRequest) -> Result<AnalysisDto, ServiceError> {
        self.client.send_json(Method::POST, "analyze", req).await
    }

    #[tracing::instrument(skip(self))]
    async fn create_thread(&self, session_id: &SessionId) -> Result<ThreadId, ServiceError> {
        let response: CreateThreadResponse = self
            .client
            .send_json(
                Method::POST,
                "assistant/threads",
                &CreateThreadRequest { session_id },
            )
            .await?;
        Ok(response.thread_id)
    }

    #[tracing::instrument(skip(self, req), fields(thread = %req.thread_id))]
    async fn send_message(&self, req: &ChatMessageRequest) -> Result<String, ServiceError> {
        let raw = self
            .client
            .send_for_text(
                Method::POST,
                &format!("assistant/threads/{}/messages", req.thread_id),
                req,
            )
            .await?;
        Ok(reply_text(raw))
    }

    #[tracing::instrument(skip(self))]
    async fn thread_messages(&self, thread_id: &ThreadId) -> Result<Vec<ThreadMessage>, ServiceError> {
        let response: ThreadResponse = self
            .client
            .get_json(&format!("assistant/threads/{}", thread_id))
            .await?;
        let mut messages: Vec<ThreadMessage> = response
            .messages
            .into_iter()
            .map(|raw| ThreadMessage {
                id: raw.id,
                role: raw.role,
                content: flatten_content(&raw.content),
                created_at: raw.created_at,
            })
            .collect();
        messages.sort_by_key(|message| message.created_at);
        Ok(messages)
    }
}

/// Unwraps a JSON string or a `{response|reply|message|content}` envelope.
/// Anything else is handed back untouched for the feedback normalizer.
fn reply_text(raw: String) -> String {
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::String(text)) => text,
        Ok(Value::Object(map)) => ["response", "reply", "message", "content"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str).map(str::to_string))
            .unwrap_or(raw),
        _ => raw,
    }
}

/// OpenAI-style content: a list of parts, a single `{text: {value}}` part,
/// a `{text}` part or plain text.
fn flatten_content(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .map(part_text)
            .collect::<Vec<_>>()
            .join(" "),
        Value::Object(_) => part_text(content),
        _ => String::new(),
    }
}

fn part_text(part: &Value) -> String {
    match part.get("text") {
        Some(Value::Object(text)) => text
            .get("value")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        Some(Value::String(text)) => text.clone(),
        _ => String::new(),
    }
}
