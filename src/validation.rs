//! Field-range checks applied to a composition description before it reaches the encoder.
//!
//! Every problem is collected rather than stopping at the first one, so a caller can report
//! the whole list back at once.

use crate::error::{ValidationError, ValidationErrors};
use crate::model::composition::CompositionDescription;

const MIDI_MAX: u8 = 127;

pub fn validate(description: &CompositionDescription) -> Result<(), ValidationErrors> {
    let mut errors: Vec<ValidationError> = Vec::new();

    if description.tempo == 0 {
        errors.push(ValidationError::new("tempo", "must be greater than 0"));
    }
    if description.length_bars == 0 {
        errors.push(ValidationError::new("length_bars", "must be greater than 0"));
    }

    for (s, section) in description.sections.iter().enumerate() {
        if section.bars == 0 {
            errors.push(ValidationError::new(
                format!("sections[{}].bars", s),
                "must be greater than 0",
            ));
        }

        for (t, track) in section.tracks.iter().enumerate() {
            let track_path = format!("sections[{}].tracks[{}]", s, t);

            if track.midi_program > MIDI_MAX {
                errors.push(out_of_range(format!("{}.midi_program", track_path), track.midi_program));
            }

            for (n, note) in track.notes.iter().enumerate() {
                let note_path = format!("{}.notes[{}]", track_path, n);

                match note.pitch {
                    None => errors.push(ValidationError::new(
                        format!("{}.pitch", note_path),
                        "field required",
                    )),
                    Some(pitch) if pitch > MIDI_MAX => {
                        errors.push(out_of_range(format!("{}.pitch", note_path), pitch))
                    }
                    Some(_) => {}
                }

                if note.velocity > MIDI_MAX {
                    errors.push(out_of_range(format!("{}.velocity", note_path), note.velocity));
                }
                if !note.start_time.is_finite() {
                    errors.push(ValidationError::new(
                        format!("{}.start_time", note_path),
                        "must be a finite number",
                    ));
                }
                if !note.duration.is_finite() {
                    errors.push(ValidationError::new(
                        format!("{}.duration", note_path),
                        "must be a finite number",
                    ));
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(errors))
    }
}

fn out_of_range(field: String, value: u8) -> ValidationError {
    ValidationError::new(field, format!("{} is outside of 0..=127", value))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::composition::{CompositionRequest, Note};

    const SAMPLE: &str = include_str!("../resources/compositions/sample.json");

    fn sample() -> CompositionDescription {
        CompositionRequest::from_json(SAMPLE).unwrap().composition
    }

    #[test]
    fn sample_is_valid() {
        assert!(validate(&sample()).is_ok());
    }

    #[test]
    fn empty_tracks_are_valid() {
        let mut description = sample();
        description.sections[0].tracks[0].notes.clear();
        assert!(validate(&description).is_ok());
    }

    #[test]
    fn collects_every_problem() {
        let mut description = sample();
        description.tempo = 0;
        description.sections[0].bars = 0;
        description.sections[0].tracks[0].midi_program = 128;
        description.sections[0].tracks[0].notes[1].pitch = Some(200);
        description.sections[0].tracks[0].notes[2].velocity = 130;

        let errs = validate(&description).unwrap_err();
        let fields: Vec<&str> = errs.iter().map(|e| e.field.as_str()).collect();

        assert_eq!(
            fields,
            vec![
                "tempo",
                "sections[0].bars",
                "sections[0].tracks[0].midi_program",
                "sections[0].tracks[0].notes[1].pitch",
                "sections[0].tracks[0].notes[2].velocity",
            ]
        );
    }

    #[test]
    fn missing_pitch_is_required() {
        let mut description = sample();
        description.sections[0].tracks[0].notes.push(Note {
            pitch: None,
            start_time: 4.0,
            duration: 1.0,
            velocity: 80,
        });

        let errs = validate(&description).unwrap_err();
        assert_eq!(errs.0.len(), 1);
        assert_eq!(errs.0[0].field, "sections[0].tracks[0].notes[4].pitch");
        assert_eq!(errs.0[0].message, "field required");
    }

    #[test]
    fn overlapping_and_zero_length_notes_pass() {
        let mut description = sample();
        let notes = &mut description.sections[0].tracks[0].notes;
        notes.push(Note::new(60, 0.5, 2.0, 80));
        notes.push(Note::new(61, 1.0, 0.0, 80));
        notes.push(Note::new(62, 1.0, -0.5, 80));

        assert!(validate(&description).is_ok());
    }

    #[test]
    fn extreme_values_pass() {
        let mut description = sample();
        description.tempo = 300;
        let notes = &mut description.sections[0].tracks[0].notes;
        notes[0].pitch = Some(0);
        notes[0].velocity = 0;
        notes[1].pitch = Some(127);
        notes[1].velocity = 127;

        assert!(validate(&description).is_ok());
    }
}
