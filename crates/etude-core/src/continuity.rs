use crate::bus::EventBus;
use crate::engine::CaptureEngine;
use crate::ipc::Event;
use crate::normalize::{normalize, NormalizedFeedback};
use etude_domain_eval::{score, PerformanceResult, ScoreError};
use etude_domain_score::{ReferenceError, ReferenceScore};
use etude_ports::services::{
    AnalysisDto, AnalyzeRequest, AssistantService, ChatMessageRequest, CreateSessionRequest,
    DataService, PerformanceFeedbackDto, PerformanceSubmission, ServiceError, SessionProgressDto,
    ThreadMessage,
};
use etude_ports::storage::{
    KeyValuePort, StorageError, KEY_REFERENCE_ID, KEY_SESSION_ID, KEY_THREAD_ID, PRACTICE_KEYS,
};
use etude_ports::types::{NoteEvent, ReferenceId, Section, SessionId, ThreadId, UserId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    Uninitialized,
    /// A fresh start is talking to the services; nothing is persisted yet.
    Starting,
    Resumed,
    Created,
    Active,
    Ended,
}

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("invalid reference: {0}")]
    InvalidReference(String),
    #[error("service error: {0}")]
    Service(#[from] ServiceError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("scoring error: {0}")]
    Score(#[from] ScoreError),
    #[error("no practice session is running")]
    NoSession,
    #[error("cannot {action} while {phase:?}")]
    InvalidTransition {
        phase: SessionPhase,
        action: &'static str,
    },
    #[error("a performance is already being sent")]
    SendInProgress,
    #[error("the session is already starting")]
    StartInProgress,
    #[error("session ended while starting")]
    Interrupted,
}

impl From<ReferenceError> for SessionError {
    fn from(err: ReferenceError) -> Self {
        SessionError::InvalidReference(err.to_string())
    }
}

/// Identifiers that survive a reload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIds {
    pub session_id: SessionId,
    pub thread_id: ThreadId,
    pub reference_id: ReferenceId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredPerformance {
    pub section: Section,
    pub performance_id: String,
    pub notes: Vec<NoteEvent>,
    pub result: PerformanceResult,
    pub analysis: Option<AnalysisDto>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SendOutcome {
    Scored(Box<ScoredPerformance>),
    /// The session ended while the send was in flight; nothing was kept.
    Discarded,
}

struct SessionInner {
    phase: SessionPhase,
    user_id: Option<UserId>,
    ids: Option<SessionIds>,
    reference: Option<Arc<ReferenceScore>>,
}

/// Starts or resumes the practice session, keeps its identifiers in durable
/// storage and hands the current reference to the scorer.
///
/// No lock is held across an await. Each `end` bumps a generation counter;
/// work started under an older generation is dropped when it completes.
pub struct SessionManager {
    data: Arc<dyn DataService>,
    assistant: Arc<dyn AssistantService>,
    store: Arc<dyn KeyValuePort>,
    bus: Option<EventBus>,
    inner: Mutex<SessionInner>,
    generation: AtomicU64,
    sending: AtomicBool,
}

struct SendGuard<'a>(&'a AtomicBool);

impl Drop for SendGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SessionManager {
    pub fn new(
        data: Arc<dyn DataService>,
        assistant: Arc<dyn AssistantService>,
        store: Arc<dyn KeyValuePort>,
    ) -> Self {
        Self {
            data,
            assistant,
            store,
            bus: None,
            inner: Mutex::new(SessionInner {
                phase: SessionPhase::Uninitialized,
                user_id: None,
                ids: None,
                reference: None,
            }),
            generation: AtomicU64::new(0),
            sending: AtomicBool::new(false),
        }
    }

    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.lock().phase
    }

    pub fn ids(&self) -> Option<SessionIds> {
        self.inner.lock().ids.clone()
    }

    pub fn reference(&self) -> Option<Arc<ReferenceScore>> {
        self.inner.lock().reference.clone()
    }

    /// Reference notes for one section, if a reference is loaded and the section has notes.
    pub fn reference_section(&self, section: Section) -> Option<Vec<NoteEvent>> {
        let reference = self.reference()?;
        let notes = reference.section(section);
        (!notes.is_empty()).then(|| notes.to_vec())
    }

    /// Resumes from persisted identifiers when all three are present, otherwise
    /// creates a session and assistant thread, persists the identifiers and
    /// loads the reference. Calling it on a running session is a no-op; calling
    /// it while another start is in flight fails with `StartInProgress`.
    pub async fn start(
        &self,
        user_id: UserId,
        reference_id: Option<ReferenceId>,
    ) -> Result<SessionPhase, SessionError> {
        let claim = {
            let mut inner = self.inner.lock();
            match inner.phase {
                SessionPhase::Active => return Ok(SessionPhase::Active),
                SessionPhase::Starting => return Err(SessionError::StartInProgress),
                SessionPhase::Created | SessionPhase::Resumed => None,
                previous @ (SessionPhase::Uninitialized | SessionPhase::Ended) => {
                    inner.phase = SessionPhase::Starting;
                    inner.user_id = Some(user_id.clone());
                    Some((previous, self.generation.load(Ordering::Acquire)))
                }
            }
        };
        let Some((previous, generation)) = claim else {
            return self.load_reference().await;
        };

        match self.begin(user_id, reference_id, generation).await {
            Ok(()) => self.load_reference().await,
            Err(err) => {
                self.abandon_start(previous, generation);
                Err(err)
            }
        }
    }

    /// Moves out of `Starting` into `Resumed` or `Created`. Identifiers are
    /// written only if no `end` happened since `generation` was taken.
    async fn begin(
        &self,
        user_id: UserId,
        reference_id: Option<ReferenceId>,
        generation: u64,
    ) -> Result<(), SessionError> {
        if let Some(ids) = self.persisted_ids()? {
            tracing::info!(session = %ids.session_id, reference = %ids.reference_id, "resuming practice session");
            return self.enter(SessionPhase::Resumed, ids, generation, false);
        }

        let reference_id = reference_id
            .filter(|id| !id.is_blank())
            .ok_or_else(|| SessionError::InvalidReference("no reference selected".to_string()))?;

        let session = self
            .data
            .create_session(&CreateSessionRequest {
                user_id,
                reference_id: reference_id.clone(),
            })
            .await?;
        if self.generation.load(Ordering::Acquire) != generation {
            self.end_orphan(&session.id).await;
            return Err(SessionError::Interrupted);
        }
        let thread_id = self.assistant.create_thread(&session.id).await?;

        let ids = SessionIds {
            session_id: session.id,
            thread_id,
            reference_id,
        };
        let orphan = ids.session_id.clone();
        match self.enter(SessionPhase::Created, ids, generation, true) {
            Err(SessionError::Interrupted) => {
                self.end_orphan(&orphan).await;
                Err(SessionError::Interrupted)
            }
            other => other,
        }
    }

    /// Checks the generation and installs the identifiers under one lock, so
    /// an `end` cannot slip between the check and the write.
    fn enter(
        &self,
        phase: SessionPhase,
        ids: SessionIds,
        generation: u64,
        persist: bool,
    ) -> Result<(), SessionError> {
        {
            let mut inner = self.inner.lock();
            if self.generation.load(Ordering::Acquire) != generation {
                return Err(SessionError::Interrupted);
            }
            if persist {
                self.store.set_all(&[
                    (KEY_SESSION_ID, ids.session_id.as_str()),
                    (KEY_THREAD_ID, ids.thread_id.as_str()),
                    (KEY_REFERENCE_ID, ids.reference_id.as_str()),
                ])?;
                tracing::info!(session = %ids.session_id, thread = %ids.thread_id, "created practice session");
            }
            inner.phase = phase;
            inner.ids = Some(ids);
            inner.reference = None;
        }
        self.publish(Event::SessionStateUpdated { phase });
        Ok(())
    }

    fn abandon_start(&self, previous: SessionPhase, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.phase == SessionPhase::Starting
            && self.generation.load(Ordering::Acquire) == generation
        {
            inner.phase = previous;
            inner.user_id = None;
        }
    }

    async fn end_orphan(&self, session_id: &SessionId) {
        tracing::info!(session = %session_id, "session ended while starting, closing it");
        if let Err(err) = self.data.end_session(session_id).await {
            tracing::warn!(session = %session_id, "data service did not acknowledge session end: {}", err);
        }
    }

    /// Fetches the reference for the current session and enters `Active`.
    /// On failure the phase is left untouched so the caller can retry.
    pub async fn load_reference(&self) -> Result<SessionPhase, SessionError> {
        let (reference_id, generation) = {
            let inner = self.inner.lock();
            match inner.phase {
                SessionPhase::Active => return Ok(SessionPhase::Active),
                SessionPhase::Created | SessionPhase::Resumed => {}
                phase => {
                    return Err(SessionError::InvalidTransition {
                        phase,
                        action: "load a reference",
                    })
                }
            }
            let ids = inner.ids.as_ref().ok_or(SessionError::NoSession)?;
            (ids.reference_id.clone(), self.generation.load(Ordering::Acquire))
        };

        let dto = match self.data.reference(&reference_id).await {
            Ok(dto) => dto,
            Err(ServiceError::NotFound(_)) => {
                return Err(SessionError::InvalidReference(format!(
                    "reference {} not found",
                    reference_id
                )))
            }
            Err(err) => return Err(err.into()),
        };
        let reference = ReferenceScore::from_dto(dto)?;

        let mut inner = self.inner.lock();
        if self.generation.load(Ordering::Acquire) != generation {
            return Err(SessionError::Interrupted);
        }
        inner.reference = Some(Arc::new(reference));
        inner.phase = SessionPhase::Active;
        drop(inner);
        tracing::info!(reference = %reference_id, "reference loaded");
        self.publish(Event::SessionStateUpdated {
            phase: SessionPhase::Active,
        });
        Ok(SessionPhase::Active)
    }

    /// Ends the session on explicit user request: clears durable storage and
    /// in-memory state, then tells the data service.
    pub async fn end(&self) -> Result<(), SessionError> {
        let ids = {
            let mut inner = self.inner.lock();
            match inner.phase {
                SessionPhase::Active
                | SessionPhase::Created
                | SessionPhase::Resumed
                | SessionPhase::Starting => {}
                phase => {
                    return Err(SessionError::InvalidTransition {
                        phase,
                        action: "end the session",
                    })
                }
            }
            self.generation.fetch_add(1, Ordering::AcqRel);
            inner.phase = SessionPhase::Ended;
            inner.reference = None;
            inner.user_id = None;
            inner.ids.take()
        };
        self.publish(Event::SessionStateUpdated {
            phase: SessionPhase::Ended,
        });

        let cleared = self.store.remove_all(&PRACTICE_KEYS);

        if let Some(ids) = ids {
            if let Err(err) = self.data.end_session(&ids.session_id).await {
                tracing::warn!(session = %ids.session_id, "data service did not acknowledge session end: {}", err);
            }
        }
        cleared.map_err(SessionError::from)
    }

    /// Scores the recorded attempt against the reference section, stores it with
    /// the data service and asks the assistant for commentary. The sent events
    /// are flushed from the recorder only when the whole exchange succeeds.
    pub async fn send_performance(
        &self,
        engine: &CaptureEngine,
        section: Section,
    ) -> Result<SendOutcome, SessionError> {
        if self
            .sending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SessionError::SendInProgress);
        }
        let _guard = SendGuard(&self.sending);

        let (user_id, ids, reference, generation) = {
            let inner = self.inner.lock();
            match inner.phase {
                SessionPhase::Active | SessionPhase::Created | SessionPhase::Resumed => {}
                _ => return Err(SessionError::NoSession),
            }
            let ids = inner.ids.clone().ok_or(SessionError::NoSession)?;
            let user_id = inner.user_id.clone().ok_or(SessionError::NoSession)?;
            (
                user_id,
                ids,
                inner.reference.clone(),
                self.generation.load(Ordering::Acquire),
            )
        };

        let snapshot = engine.recorder().snapshot();
        let expected = reference.as_ref().map(|r| r.section(section));
        let result = score(&snapshot.events, expected)?;

        let (first, last) = match (snapshot.events.first(), snapshot.events.last()) {
            (Some(first), Some(last)) => (first.timestamp, last.timestamp),
            _ => return Err(ScoreError::InsufficientData.into()),
        };
        let submission = PerformanceSubmission {
            user: user_id,
            session: ids.session_id.clone(),
            section,
            midi_notes: snapshot.events.clone(),
            started_at: engine.wall_clock_at(first),
            ended_at: engine.wall_clock_at(last),
            feedback: Some(PerformanceFeedbackDto {
                score: Some(f64::from(result.overall_score)),
                comments: Some(result.feedback.join(" ")),
                details: serde_json::to_value(&result).ok(),
            }),
        };

        let record = self.data.create_performance(&submission).await?;
        tracing::info!(performance = %record.id, %section, notes = snapshot.len(), "performance stored");

        let analysis = match reference.as_ref() {
            Some(reference) => {
                let request = AnalyzeRequest {
                    performance_id: Some(record.id.clone()),
                    performance: submission,
                    reference: reference.to_dto(),
                };
                match self.assistant.analyze(&request).await {
                    Ok(analysis) => Some(analysis),
                    Err(err) => {
                        tracing::warn!(performance = %record.id, "assistant analysis unavailable: {}", err);
                        None
                    }
                }
            }
            None => None,
        };

        if self.generation.load(Ordering::Acquire) != generation {
            tracing::info!(performance = %record.id, "session ended during send, discarding result");
            return Ok(SendOutcome::Discarded);
        }

        engine.recorder().flush(&snapshot);
        self.publish(Event::PerformanceScored {
            section,
            result: result.clone(),
            analysis: analysis.clone(),
        });

        Ok(SendOutcome::Scored(Box::new(ScoredPerformance {
            section,
            performance_id: record.id,
            notes: snapshot.events,
            result,
            analysis,
        })))
    }

    /// Sends a chat message to the session's assistant thread and normalizes the reply.
    pub async fn send_message(&self, message: &str) -> Result<NormalizedFeedback, SessionError> {
        let (user_id, ids) = self.require_ids()?;
        let reply = self
            .assistant
            .send_message(&ChatMessageRequest {
                thread_id: ids.thread_id,
                message: message.to_string(),
                user_id,
                session_id: ids.session_id,
            })
            .await?;
        Ok(normalize(&reply))
    }

    pub async fn thread_history(&self) -> Result<Vec<ThreadMessage>, SessionError> {
        let (_, ids) = self.require_ids()?;
        let mut messages = self.assistant.thread_messages(&ids.thread_id).await?;
        messages.sort_by_key(|message| message.created_at);
        Ok(messages)
    }

    /// Aggregated statistics for this session. A session without stored
    /// performances reports empty progress.
    pub async fn progress(&self) -> Result<SessionProgressDto, SessionError> {
        let (user_id, ids) = self.require_ids()?;
        match self.data.session_progress(&ids.session_id, &user_id).await {
            Ok(progress) => Ok(progress),
            Err(ServiceError::NotFound(_)) => Ok(SessionProgressDto::default()),
            Err(err) => Err(err.into()),
        }
    }

    fn require_ids(&self) -> Result<(UserId, SessionIds), SessionError> {
        let inner = self.inner.lock();
        match (inner.user_id.clone(), inner.ids.clone()) {
            (Some(user_id), Some(ids)) => Ok((user_id, ids)),
            _ => Err(SessionError::NoSession),
        }
    }

    fn persisted_ids(&self) -> Result<Option<SessionIds>, SessionError> {
        let read = |key: &str| -> Result<Option<String>, StorageError> {
            Ok(self.store.get(key)?.filter(|value| !value.trim().is_empty()))
        };
        let ids = match (read(KEY_SESSION_ID)?, read(KEY_THREAD_ID)?, read(KEY_REFERENCE_ID)?) {
            (Some(session_id), Some(thread_id), Some(reference_id)) => Some(SessionIds {
                session_id: SessionId(session_id),
                thread_id: ThreadId(thread_id),
                reference_id: ReferenceId(reference_id),
            }),
            _ => None,
        };
        Ok(ids)
    }

    fn publish(&self, event: Event) {
        if let Some(bus) = self.bus.as_ref() {
            bus.publish(event);
        }
    }
}
