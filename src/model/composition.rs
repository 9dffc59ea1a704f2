use serde::{Deserialize, Serialize};

/// A single note, timed in beats from the start of the whole piece.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Note {
    /// MIDI note number. A note without a pitch is dropped by the encoder.
    #[serde(default)]
    pub pitch: Option<u8>,
    pub start_time: f64,
    pub duration: f64,
    pub velocity: u8,
}

impl Note {
    pub fn new(pitch: u8, start_time: f64, duration: f64, velocity: u8) -> Self {
        Self {
            pitch: Some(pitch),
            start_time,
            duration,
            velocity,
        }
    }

    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Track {
    /// Free-text label, also half of the instrument key.
    pub instrument: String,
    pub midi_program: u8,
    pub notes: Vec<Note>,
}

impl Track {
    pub fn key(&self) -> InstrumentKey {
        InstrumentKey {
            name: self.instrument.clone(),
            program: self.midi_program,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Section {
    pub name: String,
    pub bars: u32,
    pub tracks: Vec<Track>,
}

/// The sole input to the encoder.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CompositionDescription {
    pub title: String,
    /// Beats per minute.
    pub tempo: u32,
    pub time_signature: String,
    pub key: String,
    pub scale: String,
    pub length_bars: u32,
    pub sections: Vec<Section>,
}

impl CompositionDescription {
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.sections.iter().flat_map(|section| section.tracks.iter())
    }

    /// Number of notes that carry a pitch and a non-zero velocity, i.e. the notes that end up
    /// in an artifact.
    pub fn sounding_note_count(&self) -> usize {
        self.tracks()
            .flat_map(|track| track.notes.iter())
            .filter(|note| note.pitch.is_some() && note.velocity > 0)
            .count()
    }
}

/// Request envelope, `{"composition": {...}}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CompositionRequest {
    pub composition: CompositionDescription,
}

impl CompositionRequest {
    /// Accepts either the request envelope or a bare description.
    pub fn from_json(input: &str) -> serde_json::Result<Self> {
        let value: serde_json::Value = serde_json::from_str(input)?;

        if value.get("composition").is_some() {
            serde_json::from_value(value)
        } else {
            Ok(Self {
                composition: serde_json::from_value(value)?,
            })
        }
    }
}

/// Tracks sharing an instrument key are merged into one output instrument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrumentKey {
    pub name: String,
    pub program: u8,
}

#[cfg(test)]
mod test {
    use super::*;

    const SAMPLE: &str = include_str!("../../resources/compositions/sample.json");

    #[test]
    fn parse_request_envelope() {
        let request = CompositionRequest::from_json(SAMPLE).unwrap();
        let composition = &request.composition;

        assert_eq!(composition.title, "Test Composition");
        assert_eq!(composition.tempo, 120);
        assert_eq!(composition.sections.len(), 1);
        assert_eq!(composition.sections[0].tracks[0].notes.len(), 4);
        assert_eq!(composition.sounding_note_count(), 4);
    }

    #[test]
    fn parse_bare_description() {
        let bare = serde_json::to_string(&CompositionRequest::from_json(SAMPLE).unwrap().composition).unwrap();
        let request = CompositionRequest::from_json(&bare).unwrap();
        assert_eq!(request.composition.title, "Test Composition");
    }

    #[test]
    fn missing_pitch_deserializes_as_none() {
        let note: Note =
            serde_json::from_str(r#"{"start_time": 0.0, "duration": 1.0, "velocity": 80}"#).unwrap();
        assert_eq!(note.pitch, None);

        let note: Note = serde_json::from_str(
            r#"{"pitch": null, "start_time": 0.0, "duration": 1.0, "velocity": 80}"#,
        )
        .unwrap();
        assert_eq!(note.pitch, None);
        assert!(note.end_time() > note.start_time);
    }

    #[test]
    fn out_of_byte_range_is_rejected_by_parser() {
        let note = serde_json::from_str::<Note>(
            r#"{"pitch": 300, "start_time": 0.0, "duration": 1.0, "velocity": 80}"#,
        );
        assert!(note.is_err());
    }

    #[test]
    fn instrument_key_from_track() {
        let track = Track {
            instrument: "piano".into(),
            midi_program: 0,
            notes: vec![],
        };

        assert_eq!(
            track.key(),
            InstrumentKey {
                name: "piano".into(),
                program: 0
            }
        );
    }
}
