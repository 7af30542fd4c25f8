use crate::types::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("network failure: {0}")]
    Network(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("service returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub user_id: UserId,
    pub reference_id: ReferenceId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDto {
    #[serde(rename = "sessionId", alias = "_id", alias = "id")]
    pub id: SessionId,
    #[serde(default, alias = "user")]
    pub user_id: Option<UserId>,
    #[serde(default, alias = "reference")]
    pub reference_id: Option<ReferenceId>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionsDto {
    pub intro: Vec<NoteEvent>,
    pub verse: Vec<NoteEvent>,
    pub chorus: Vec<NoteEvent>,
    pub bridge: Vec<NoteEvent>,
    pub outro: Vec<NoteEvent>,
}

impl SectionsDto {
    pub fn get(&self, section: Section) -> &[NoteEvent] {
        match section {
            Section::Intro => &self.intro,
            Section::Verse => &self.verse,
            Section::Chorus => &self.chorus,
            Section::Bridge => &self.bridge,
            Section::Outro => &self.outro,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDto {
    #[serde(rename = "_id", alias = "id")]
    pub id: ReferenceId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sections: SectionsDto,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceFeedbackDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSubmission {
    pub user: UserId,
    pub session: SessionId,
    pub section: Section,
    pub midi_notes: Vec<NoteEvent>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<PerformanceFeedbackDto>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecordDto {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MistakeDto {
    pub note: String,
    pub measure: Option<u32>,
    pub issue: String,
}

/// Aggregated per-session statistics. Missing fields default to zero/empty.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionProgressDto {
    pub overall_accuracy: f64,
    pub overall_timing: f64,
    pub overall_dynamics: f64,
    pub current_streak: u32,
    pub total_notes: u32,
    pub correct_notes: u32,
    pub incorrect_notes: u32,
    pub missed_notes: u32,
    pub recent_mistakes: Vec<MistakeDto>,
    pub achievements: Vec<Value>,
    pub performances: BTreeMap<String, Vec<Value>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance_id: Option<String>,
    pub performance: PerformanceSubmission,
    pub reference: ReferenceDto,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisDto {
    pub score: Option<f64>,
    pub feedback: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageRequest {
    #[serde(skip)]
    pub thread_id: ThreadId,
    pub message: String,
    pub user_id: UserId,
    pub session_id: SessionId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    pub role: String,
    pub content: String,
    pub created_at: i64,
}

#[async_trait]
pub trait DataService: Send + Sync {
    async fn create_session(&self, req: &CreateSessionRequest) -> Result<SessionDto, ServiceError>;
    async fn end_session(&self, session_id: &SessionId) -> Result<(), ServiceError>;
    async fn reference(&self, reference_id: &ReferenceId) -> Result<ReferenceDto, ServiceError>;
    async fn create_performance(
        &self,
        submission: &PerformanceSubmission,
    ) -> Result<PerformanceRecordDto, ServiceError>;
    async fn session_progress(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
    ) -> Result<SessionProgressDto, ServiceError>;
}

#[async_trait]
pub trait AssistantService: Send + Sync {
    async fn analyze(&self, req: &AnalyzeRequest) -> Result<AnalysisDto, ServiceError>;
    async fn create_thread(&self, session_id: &SessionId) -> Result<ThreadId, ServiceError>;
    async fn send_message(&self, req: &ChatMessageRequest) -> Result<String, ServiceError>;
    async fn thread_messages(&self, thread_id: &ThreadId) -> Result<Vec<ThreadMessage>, ServiceError>;
}
