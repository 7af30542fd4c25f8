#![allow(dead_code)]

use async_trait::async_trait;
use etude_ports::midi::{
    MidiError, MidiInputPort, MidiInputStream, MidiMessage, RawMidiCallback, RawMidiEvent,
};
use etude_ports::services::*;
use etude_ports::storage::{KeyValuePort, SettingsDto, StorageError, StoragePort};
use etude_ports::types::*;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Notify;

pub fn note(pitch: u8, velocity: u8, timestamp: Millis) -> NoteEvent {
    NoteEvent::new(pitch, velocity, timestamp)
}

pub fn note_on(pitch: u8, velocity: u8) -> MidiMessage {
    MidiMessage::triple(0x90, pitch, velocity)
}

pub fn note_off(pitch: u8) -> MidiMessage {
    MidiMessage::triple(0x80, pitch, 0)
}

pub fn scale() -> Vec<NoteEvent> {
    vec![
        note(60, 95, 100),
        note(62, 80, 600),
        note(64, 85, 1100),
        note(65, 70, 1600),
        note(67, 65, 2100),
    ]
}

pub fn reference_dto(id: &str) -> ReferenceDto {
    ReferenceDto {
        id: ReferenceId::new(id),
        name: "C major warmup".to_string(),
        sections: SectionsDto {
            intro: scale(),
            ..SectionsDto::default()
        },
    }
}

#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
    pub fail_writes: std::sync::atomic::AtomicBool,
}

impl MemoryStore {
    pub fn with(entries: &[(&str, &str)]) -> Self {
        let store = Self::default();
        {
            let mut values = store.values.lock();
            for (key, value) in entries {
                values.insert(key.to_string(), value.to_string());
            }
        }
        store
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values.lock().clone()
    }
}

impl KeyValuePort for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set_all(&self, entries: &[(&str, &str)]) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io("disk full".to_string()));
        }
        let mut values = self.values.lock();
        for (key, value) in entries {
            values.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    fn remove_all(&self, keys: &[&str]) -> Result<(), StorageError> {
        let mut values = self.values.lock();
        for key in keys {
            values.remove(*key);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeData {
    pub create_calls: AtomicUsize,
    pub end_calls: AtomicUsize,
    pub reference_calls: AtomicUsize,
    pub performances: Mutex<Vec<PerformanceSubmission>>,
    pub fail_create: Mutex<Option<ServiceError>>,
    pub fail_end: Mutex<Option<ServiceError>>,
    pub fail_reference: Mutex<Option<ServiceError>>,
    pub progress: Mutex<Option<SessionProgressDto>>,
    /// When set, `create_performance` waits for a notification before answering.
    pub hold_performance: Mutex<Option<Arc<Notify>>>,
    pub performance_started: Notify,
    /// When set, `create_session` waits for a notification before answering.
    pub hold_create: Mutex<Option<Arc<Notify>>>,
    pub create_started: Notify,
    /// When set, `reference` waits for a notification before answering.
    pub hold_reference: Mutex<Option<Arc<Notify>>>,
    pub reference_started: Notify,
}

async fn wait_on(started: &Notify, hold: &Mutex<Option<Arc<Notify>>>) {
    started.notify_one();
    let hold = hold.lock().clone();
    if let Some(hold) = hold {
        hold.notified().await;
    }
}

#[async_trait]
impl DataService for FakeData {
    async fn create_session(&self, req: &CreateSessionRequest) -> Result<SessionDto, ServiceError> {
        let n = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;
        wait_on(&self.create_started, &self.hold_create).await;
        if let Some(err) = self.fail_create.lock().clone() {
            return Err(err);
        }
        Ok(SessionDto {
            id: SessionId::new(format!("session-{}", n)),
            user_id: Some(req.user_id.clone()),
            reference_id: Some(req.reference_id.clone()),
            started_at: None,
            ended_at: None,
        })
    }

    async fn end_session(&self, _session_id: &SessionId) -> Result<(), ServiceError> {
        self.end_calls.fetch_add(1, Ordering::SeqCst);
        match self.fail_end.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn reference(&self, reference_id: &ReferenceId) -> Result<ReferenceDto, ServiceError> {
        self.reference_calls.fetch_add(1, Ordering::SeqCst);
        wait_on(&self.reference_started, &self.hold_reference).await;
        if let Some(err) = self.fail_reference.lock().clone() {
            return Err(err);
        }
        Ok(reference_dto(reference_id.as_str()))
    }

    async fn create_performance(
        &self,
        submission: &PerformanceSubmission,
    ) -> Result<PerformanceRecordDto, ServiceError> {
        wait_on(&self.performance_started, &self.hold_performance).await;
        let mut performances = self.performances.lock();
        performances.push(submission.clone());
        Ok(PerformanceRecordDto {
            id: format!("perf-{}", performances.len()),
        })
    }

    async fn session_progress(
        &self,
        _session_id: &SessionId,
        _user_id: &UserId,
    ) -> Result<SessionProgressDto, ServiceError> {
        self.progress
            .lock()
            .clone()
            .ok_or_else(|| ServiceError::NotFound("no performances".to_string()))
    }
}

#[derive(Default)]
pub struct FakeAssistant {
    pub thread_calls: AtomicUsize,
    pub analyze_calls: AtomicUsize,
    pub fail_thread: Mutex<Option<ServiceError>>,
    pub fail_analyze: Mutex<Option<ServiceError>>,
    pub reply: Mutex<String>,
    pub history: Mutex<Vec<ThreadMessage>>,
    pub sent: Mutex<Vec<ChatMessageRequest>>,
}

#[async_trait]
impl AssistantService for FakeAssistant {
    async fn analyze(&self, _req: &AnalyzeRequest) -> Result<AnalysisDto, ServiceError> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.fail_analyze.lock().clone() {
            return Err(err);
        }
        Ok(AnalysisDto {
            score: Some(88.0),
            feedback: vec!["Nice phrasing".to_string()],
        })
    }

    async fn create_thread(&self, session_id: &SessionId) -> Result<ThreadId, ServiceError> {
        self.thread_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.fail_thread.lock().clone() {
            return Err(err);
        }
        Ok(ThreadId::new(format!("thread-for-{}", session_id)))
    }

    async fn send_message(&self, req: &ChatMessageRequest) -> Result<String, ServiceError> {
        self.sent.lock().push(req.clone());
        Ok(self.reply.lock().clone())
    }

    async fn thread_messages(&self, _thread_id: &ThreadId) -> Result<Vec<ThreadMessage>, ServiceError> {
        Ok(self.history.lock().clone())
    }
}

/// In-memory MIDI backend. Devices can be plugged and unplugged at runtime and
/// messages injected into any open port.
#[derive(Clone, Default)]
pub struct FakeMidi {
    pub devices: Arc<Mutex<Vec<MidiInputDevice>>>,
    pub callbacks: Arc<Mutex<HashMap<DeviceId, RawMidiCallback>>>,
    pub unsupported: Arc<std::sync::atomic::AtomicBool>,
}

impl FakeMidi {
    pub fn plug(&self, id: &str) {
        self.devices.lock().push(MidiInputDevice {
            id: DeviceId::new(id),
            name: format!("Keyboard {}", id),
            is_available: true,
        });
    }

    pub fn unplug(&self, id: &str) {
        self.devices.lock().retain(|device| device.id.as_str() != id);
        self.callbacks.lock().remove(&DeviceId::new(id));
    }

    pub fn send(&self, id: &str, message: MidiMessage, at: Instant) -> bool {
        let cb = self.callbacks.lock().get(&DeviceId::new(id)).cloned();
        match cb {
            Some(cb) => {
                cb(RawMidiEvent { at, message });
                true
            }
            None => false,
        }
    }

    pub fn open_count(&self) -> usize {
        self.callbacks.lock().len()
    }
}

struct FakeStream {
    id: DeviceId,
    callbacks: Arc<Mutex<HashMap<DeviceId, RawMidiCallback>>>,
}

impl MidiInputStream for FakeStream {
    fn close(self: Box<Self>) {
        self.callbacks.lock().remove(&self.id);
    }
}

impl MidiInputPort for FakeMidi {
    fn list_inputs(&self) -> Result<Vec<MidiInputDevice>, MidiError> {
        if self.unsupported.load(Ordering::SeqCst) {
            return Err(MidiError::Unsupported("no midi subsystem".to_string()));
        }
        Ok(self.devices.lock().clone())
    }

    fn open_input(
        &self,
        device_id: &DeviceId,
        cb: RawMidiCallback,
    ) -> Result<Box<dyn MidiInputStream>, MidiError> {
        if !self.devices.lock().iter().any(|device| &device.id == device_id) {
            return Err(MidiError::DeviceNotFound(device_id.to_string()));
        }
        self.callbacks.lock().insert(device_id.clone(), cb);
        Ok(Box::new(FakeStream {
            id: device_id.clone(),
            callbacks: self.callbacks.clone(),
        }))
    }
}

#[derive(Default)]
pub struct MemorySettings {
    pub saved: Mutex<Option<SettingsDto>>,
}

impl StoragePort for MemorySettings {
    fn load_settings(&self) -> Result<SettingsDto, StorageError> {
        Ok(self.saved.lock().clone().unwrap_or_default())
    }

    fn save_settings(&self, s: &SettingsDto) -> Result<(), StorageError> {
        *self.saved.lock() = Some(s.clone());
        Ok(())
    }
}

/// Lets a test keep a handle on settings saved by a core that owns its storage.
pub struct SharedSettings(pub Arc<MemorySettings>);

impl StoragePort for SharedSettings {
    fn load_settings(&self) -> Result<SettingsDto, StorageError> {
        self.0.load_settings()
    }

    fn save_settings(&self, s: &SettingsDto) -> Result<(), StorageError> {
        self.0.save_settings(s)
    }
}
