use crate::types::*;
use serde::{Deserialize, Serialize};

pub const KEY_SESSION_ID: &str = "practiceSessionId";
pub const KEY_THREAD_ID: &str = "practiceThreadId";
pub const KEY_REFERENCE_ID: &str = "practiceReferenceId";

/// Every key owned by the continuity manager; they are written and cleared together.
pub const PRACTICE_KEYS: [&str; 3] = [KEY_SESSION_ID, KEY_THREAD_ID, KEY_REFERENCE_ID];

fn default_debounce_ms() -> u64 {
    50
}

fn default_log_capacity() -> usize {
    100
}

fn default_data_service_url() -> String {
    "http://localhost:5002/api".to_string()
}

fn default_assistant_service_url() -> String {
    "http://localhost:5005/api".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serde(String),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsDto {
    pub selected_midi_in: Option<DeviceId>,
    pub notation: NotationSystem,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_log_capacity")]
    pub performance_log_capacity: usize,
    #[serde(default = "default_data_service_url")]
    pub data_service_url: String,
    #[serde(default = "default_assistant_service_url")]
    pub assistant_service_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    pub default_reference_id: Option<ReferenceId>,
    pub default_section: Section,
    pub user_id: Option<UserId>,
}

impl Default for SettingsDto {
    fn default() -> Self {
        Self {
            selected_midi_in: None,
            notation: NotationSystem::Letter,
            debounce_ms: default_debounce_ms(),
            performance_log_capacity: default_log_capacity(),
            data_service_url: default_data_service_url(),
            assistant_service_url: default_assistant_service_url(),
            request_timeout_ms: default_request_timeout_ms(),
            default_reference_id: None,
            default_section: Section::Intro,
            user_id: None,
        }
    }
}

pub trait StoragePort: Send + Sync {
    fn load_settings(&self) -> Result<SettingsDto, StorageError>;
    fn save_settings(&self, s: &SettingsDto) -> Result<(), StorageError>;
}

/// Durable string key-value storage. `set_all` and `remove_all` must be atomic:
/// a reader never observes a partially applied batch.
pub trait KeyValuePort: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_all(&self, entries: &[(&str, &str)]) -> Result<(), StorageError>;
    fn remove_all(&self, keys: &[&str]) -> Result<(), StorageError>;
}
