use etude_ports::types::{NotationSystem, MIDI_DATA_MAX};

const LETTER_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

const SOLFEGE_NAMES: [&str; 12] = [
    "Do", "Do#", "Re", "Re#", "Mi", "Fa", "Fa#", "Sol", "Sol#", "La", "La#", "Si",
];

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteNameError {
    #[error("pitch out of midi range: {0}")]
    OutOfRange(u8),
}

/// Display name such as `C4` or `Do4`. Octave numbering puts middle C (60) in octave 4.
pub fn resolve_name(pitch: u8, system: NotationSystem) -> Result<String, NoteNameError> {
    if pitch > MIDI_DATA_MAX {
        return Err(NoteNameError::OutOfRange(pitch));
    }
    let octave = i32::from(pitch / 12) - 1;
    let table = match system {
        NotationSystem::Letter => &LETTER_NAMES,
        NotationSystem::Solfege => &SOLFEGE_NAMES,
    };
    Ok(format!("{}{}", table[usize::from(pitch % 12)], octave))
}

pub fn is_black_key(pitch: u8) -> bool {
    matches!(pitch % 12, 1 | 3 | 6 | 8 | 10)
}
