use crate::error::EncodingError;
use crate::model::composition::{CompositionDescription, InstrumentKey};
use crate::model::record::CompositionRecord;
use crate::util::{bpm_to_mpqn, file_stamp, iso_timestamp, write_atomic};
use chrono::Utc;
use log::{debug, info, warn};
use midly::num::{u4, u7, u15, u24, u28};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const TICKS_PER_QUARTER: u16 = 480;

const PERCUSSION_CHANNEL: u8 = 9;
const MELODIC_CHANNELS: usize = 15;
const MAX_DELTA: u32 = 0x0FFF_FFFF;
const MAX_MPQN: u32 = 0x00FF_FFFF;

/// A note as it will be written, timed in beats. `end` may be at or before `start`.
#[derive(Debug, Clone, PartialEq)]
pub struct MidiNote {
    pub pitch: u8,
    pub velocity: u8,
    pub start: f64,
    pub end: f64,
}

/// Every note gathered under one instrument key, across all sections.
#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    pub key: InstrumentKey,
    pub notes: Vec<MidiNote>,
}

#[derive(Debug, Clone)]
pub struct EncodedComposition {
    /// Exactly the bytes written to `record.file_path`.
    pub bytes: Vec<u8>,
    pub record: CompositionRecord,
}

/// Turns composition descriptions into MIDI artifacts under a single output directory.
#[derive(Debug, Clone)]
pub struct Encoder {
    output_dir: PathBuf,
}

/// Events sharing a tick are written in rank order: releases, then attacks, then the
/// releases of notes that start on that same tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Rank {
    Release = 0,
    Attack = 1,
    ZeroLengthRelease = 2,
}

impl Encoder {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    /// Encodes `description`, writes the artifact and returns it together with its record.
    ///
    /// The artifact is written to a temporary file in the output directory and renamed into
    /// place, so a failure never leaves a partial `.mid` behind.
    pub fn encode(&self, description: &CompositionDescription) -> Result<EncodedComposition, EncodingError> {
        let bytes = Self::to_bytes(description)?;

        let created = Utc::now();
        let id = Uuid::new_v4().to_string();
        let file_path = self
            .output_dir
            .join(format!("{}_{}.mid", id, file_stamp(created)));

        write_atomic(&file_path, &bytes).map_err(|source| EncodingError::Write {
            path: file_path.clone(),
            source,
        })?;

        info!(
            "Wrote '{}' ({} bytes) to {}..!",
            description.title,
            bytes.len(),
            file_path.display()
        );

        Ok(EncodedComposition {
            bytes,
            record: CompositionRecord {
                id,
                title: description.title.clone(),
                file_path: file_path.to_string_lossy().into_owned(),
                created_at: iso_timestamp(created),
            },
        })
    }

    /// Serializes `description` into Standard MIDI File bytes without touching the disk.
    pub fn to_bytes(description: &CompositionDescription) -> Result<Vec<u8>, EncodingError> {
        let instruments = Self::build_instruments(description);
        let smf = to_smf(&description.title, description.tempo, &instruments);

        let mut bytes = Vec::new();
        smf.write_std(&mut bytes).map_err(EncodingError::Serialize)?;

        Ok(bytes)
    }

    /// Merges every track into instruments keyed by (instrument name, program), in first-seen
    /// order. Note times are taken literally, with no offset for the section a note sits in.
    /// Instruments that end up without notes are dropped.
    pub fn build_instruments(description: &CompositionDescription) -> Vec<Instrument> {
        let mut instruments: Vec<Instrument> = Vec::new();
        let mut index: HashMap<InstrumentKey, usize> = HashMap::new();

        for section in description.sections.iter() {
            for track in section.tracks.iter() {
                let key = track.key();
                let slot = match index.get(&key) {
                    Some(&slot) => slot,
                    None => {
                        instruments.push(Instrument {
                            key: key.clone(),
                            notes: Vec::new(),
                        });
                        index.insert(key, instruments.len() - 1);
                        instruments.len() - 1
                    }
                };

                for note in track.notes.iter() {
                    let Some(pitch) = note.pitch else {
                        debug!(
                            "Skipping note without a pitch at beat {} in '{}' ({})..!",
                            note.start_time, track.instrument, section.name
                        );
                        continue;
                    };

                    // a note-on with velocity 0 reads back as a note-off
                    if note.velocity == 0 {
                        debug!(
                            "Skipping silent note {} at beat {} in '{}' ({})..!",
                            pitch, note.start_time, track.instrument, section.name
                        );
                        continue;
                    }

                    instruments[slot].notes.push(MidiNote {
                        pitch,
                        velocity: note.velocity,
                        start: note.start_time,
                        end: note.end_time(),
                    });
                }
            }
        }

        instruments.retain(|instrument| {
            if instrument.notes.is_empty() {
                debug!(
                    "Dropping instrument '{}' (program {}) as it has no notes..!",
                    instrument.key.name, instrument.key.program
                );
                false
            } else {
                true
            }
        });

        instruments
    }
}

/// Channel for the n-th instrument, skipping the General MIDI percussion channel.
pub fn channel_for(index: usize) -> u8 {
    let channel = (index % MELODIC_CHANNELS) as u8;
    if channel >= PERCUSSION_CHANNEL {
        channel + 1
    } else {
        channel
    }
}

pub fn beats_to_ticks(beats: f64) -> u64 {
    (beats * TICKS_PER_QUARTER as f64).round().max(0.0) as u64
}

/// Builds a format 1 SMF: a conductor track carrying the title and the single tempo, then
/// one track per instrument.
fn to_smf<'a>(title: &'a str, tempo: u32, instruments: &'a [Instrument]) -> Smf<'a> {
    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
    ));

    let mpqn = bpm_to_mpqn(tempo);
    if mpqn > MAX_MPQN {
        warn!("Tempo of {} bpm is too slow to encode, clamping..!", tempo);
    }

    let conductor: Track<'a> = vec![
        meta(MetaMessage::Tempo(u24::new(mpqn.min(MAX_MPQN)))),
        meta(MetaMessage::TrackName(title.as_bytes())),
        meta(MetaMessage::EndOfTrack),
    ];
    smf.tracks.push(conductor);

    for (i, instrument) in instruments.iter().enumerate() {
        let channel = u4::new(channel_for(i));
        let mut track: Track<'a> = vec![
            meta(MetaMessage::TrackName(instrument.key.name.as_bytes())),
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::ProgramChange {
                        program: u7::new(instrument.key.program),
                    },
                },
            },
        ];

        let mut last_tick: u64 = 0;
        for (tick, message) in note_events(instrument) {
            let delta = tick - last_tick;
            last_tick = tick;

            let delta = if delta > MAX_DELTA as u64 {
                warn!(
                    "Delta of {} ticks in '{}' exceeds the MIDI limit, clamping..!",
                    delta, instrument.key.name
                );
                MAX_DELTA
            } else {
                delta as u32
            };

            track.push(TrackEvent {
                delta: u28::new(delta),
                kind: TrackEventKind::Midi { channel, message },
            });
        }

        track.push(meta(MetaMessage::EndOfTrack));
        smf.tracks.push(track);
    }

    smf
}

fn meta(message: MetaMessage<'_>) -> TrackEvent<'_> {
    TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(message),
    }
}

/// Note-on/note-off pairs at absolute ticks, in the order they must be written.
///
/// A note-off is never placed before its own note-on: an end at or before the start is
/// written at the start tick, after the attack.
fn note_events(instrument: &Instrument) -> Vec<(u64, MidiMessage)> {
    let mut events: Vec<(u64, Rank, MidiMessage)> = Vec::with_capacity(instrument.notes.len() * 2);

    for note in instrument.notes.iter() {
        let key = u7::new(note.pitch);
        let on_tick = beats_to_ticks(note.start);
        let off_tick = beats_to_ticks(note.end).max(on_tick);

        events.push((
            on_tick,
            Rank::Attack,
            MidiMessage::NoteOn {
                key,
                vel: u7::new(note.velocity),
            },
        ));
        events.push((
            off_tick,
            if off_tick == on_tick {
                Rank::ZeroLengthRelease
            } else {
                Rank::Release
            },
            MidiMessage::NoteOff { key, vel: u7::new(0) },
        ));
    }

    // stable, so equal (tick, rank) keep insertion order
    events.sort_by_key(|(tick, rank, _)| (*tick, *rank));

    events
        .into_iter()
        .map(|(tick, _, message)| (tick, message))
        .collect()
}
