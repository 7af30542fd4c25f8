use crate::continuity::{SessionIds, SessionPhase};
use etude_ports::storage::{SettingsDto, StorageError};
use etude_ports::types::{MidiInputDevice, NoteEvent};
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Serialize)]
struct AppVersion {
    name: String,
    version: String,
}

#[derive(Serialize)]
struct PlatformInfo {
    os: String,
    arch: String,
}

#[derive(Serialize)]
struct CaptureSnapshot<'a> {
    capture_available: bool,
    midi_inputs: &'a [MidiInputDevice],
    active_notes: &'a [u8],
}

#[derive(Serialize)]
struct SessionSnapshot<'a> {
    phase: Option<SessionPhase>,
    ids: Option<&'a SessionIds>,
}

/// Everything written into a diagnostics bundle.
pub struct DiagnosticsReport<'a> {
    pub settings: &'a SettingsDto,
    pub capture_available: bool,
    pub midi_inputs: &'a [MidiInputDevice],
    pub active_notes: &'a [u8],
    pub performance_log: &'a [NoteEvent],
    pub session_phase: Option<SessionPhase>,
    pub session_ids: Option<&'a SessionIds>,
}

/// Writes the bundle as a directory of JSON files under `dir`.
pub fn export_diagnostics(dir: &Path, report: &DiagnosticsReport<'_>) -> Result<(), StorageError> {
    fs::create_dir_all(dir).map_err(|e| StorageError::Io(e.to_string()))?;

    let app_version = AppVersion {
        name: "Etude".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let platform = PlatformInfo {
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
    };

    write_json(&dir.join("app_version.json"), &app_version)?;
    write_json(&dir.join("platform.json"), &platform)?;
    write_json(&dir.join("settings.json"), report.settings)?;
    write_json(
        &dir.join("capture.json"),
        &CaptureSnapshot {
            capture_available: report.capture_available,
            midi_inputs: report.midi_inputs,
            active_notes: report.active_notes,
        },
    )?;
    write_json(&dir.join("performance_log.json"), &report.performance_log)?;
    write_json(
        &dir.join("session.json"),
        &SessionSnapshot {
            phase: report.session_phase,
            ids: report.session_ids,
        },
    )?;

    tracing::info!(dir = %dir.display(), notes = report.performance_log.len(), "diagnostics exported");
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StorageError> {
    let data = serde_json::to_vec_pretty(value).map_err(|e| StorageError::Serde(e.to_string()))?;
    fs::write(path, data).map_err(|e| StorageError::Io(e.to_string()))
}
