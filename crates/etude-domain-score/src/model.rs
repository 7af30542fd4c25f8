use etude_ports::services::{ReferenceDto, SectionsDto};
use etude_ports::types::{NoteEvent, ReferenceId, Section};
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("reference id is missing")]
    MissingId,
    #[error("reference {id} has an out-of-range note in {section} at index {index}")]
    InvalidNote {
        id: ReferenceId,
        section: Section,
        index: usize,
    },
}

/// Canonical note sequences for one piece, one sequence per section,
/// each kept in chronological order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceScore {
    pub id: ReferenceId,
    pub name: String,
    sections: [Vec<NoteEvent>; 5],
}

impl ReferenceScore {
    pub fn from_dto(dto: ReferenceDto) -> Result<Self, ReferenceError> {
        if dto.id.is_blank() {
            return Err(ReferenceError::MissingId);
        }

        let mut sections: [Vec<NoteEvent>; 5] = Default::default();
        for (slot, section) in Section::ALL.iter().copied().enumerate() {
            let notes = dto.sections.get(section);
            if let Some(index) = notes.iter().position(|note| !note.is_in_range()) {
                return Err(ReferenceError::InvalidNote {
                    id: dto.id.clone(),
                    section,
                    index,
                });
            }
            let mut sorted = notes.to_vec();
            sorted.sort_by_key(|note| note.timestamp);
            sections[slot] = sorted;
        }

        Ok(Self {
            id: dto.id,
            name: dto.name,
            sections,
        })
    }

    pub fn section(&self, section: Section) -> &[NoteEvent] {
        &self.sections[section_slot(section)]
    }

    pub fn has_notes(&self, section: Section) -> bool {
        !self.section(section).is_empty()
    }

    pub fn to_dto(&self) -> ReferenceDto {
        ReferenceDto {
            id: self.id.clone(),
            name: self.name.clone(),
            sections: SectionsDto {
                intro: self.section(Section::Intro).to_vec(),
                verse: self.section(Section::Verse).to_vec(),
                chorus: self.section(Section::Chorus).to_vec(),
                bridge: self.section(Section::Bridge).to_vec(),
                outro: self.section(Section::Outro).to_vec(),
            },
        }
    }
}

fn section_slot(section: Section) -> usize {
    match section {
        Section::Intro => 0,
        Section::Verse => 1,
        Section::Chorus => 2,
        Section::Bridge => 3,
        Section::Outro => 4,
    }
}
