use crate::Notation;
use anyhow::{Context, Result};
use etude_domain_eval::score;
use etude_domain_score::{is_black_key, resolve_name};
use etude_infra_midi_midir::MidirMidiInputPort;
use etude_ports::midi::{MidiError, MidiInputPort};
use etude_ports::types::{NotationSystem, NoteEvent};
use std::path::Path;

pub fn devices() -> Result<()> {
    match MidirMidiInputPort::default().list_inputs() {
        Ok(devices) if devices.is_empty() => println!("no MIDI inputs connected"),
        Ok(devices) => {
            for device in devices {
                println!("{}\t{}", device.id, device.name);
            }
        }
        Err(MidiError::Unsupported(reason)) => {
            println!("MIDI input is not available here ({})", reason)
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

pub fn score_file(performed: &Path, reference: Option<&Path>) -> Result<()> {
    let performed = read_notes(performed)?;
    let reference = reference.map(read_notes).transpose()?;

    let result = score(&performed, reference.as_deref())?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

pub fn name(pitch: u8, notation: Notation) -> Result<()> {
    let system = match notation {
        Notation::Letter => NotationSystem::Letter,
        Notation::Solfege => NotationSystem::Solfege,
    };
    let name = resolve_name(pitch, system)?;
    let key = if is_black_key(pitch) { "black" } else { "white" };
    println!("{} ({} key)", name, key);
    Ok(())
}

fn read_notes(path: &Path) -> Result<Vec<NoteEvent>> {
    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&data).with_context(|| format!("parsing {}", path.display()))
}
