use crate::util::mpqn_to_bpm;
use anyhow::{Result, anyhow};
use log::{debug, warn};
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct NoteSummary {
    pub pitch: u8,
    pub velocity: u8,
    pub start_tick: u64,
    pub end_tick: u64,
}

/// A track that selects a program.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct InstrumentSummary {
    pub name: String,
    pub program: u8,
    pub channel: u8,
    pub notes: Vec<NoteSummary>,
}

/// What a MIDI reader sees in an artifact: its tempo and its instruments.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ArtifactSummary {
    pub title: Option<String>,
    pub tempo_bpm: Option<f64>,
    pub ticks_per_quarter: u16,
    pub instruments: Vec<InstrumentSummary>,
}

impl ArtifactSummary {
    pub fn note_count(&self) -> usize {
        self.instruments.iter().map(|i| i.notes.len()).sum()
    }

    pub fn pitches(&self) -> BTreeSet<u8> {
        self.instruments
            .iter()
            .flat_map(|i| i.notes.iter().map(|n| n.pitch))
            .collect()
    }
}

pub fn read_midi_file<P: AsRef<Path>>(path: P) -> Result<ArtifactSummary> {
    let bytes = fs::read(path.as_ref()).map_err(|e| {
        anyhow!(
            "Failed to read MIDI file {}: {}",
            path.as_ref().display(),
            e
        )
    })?;

    read_midi_bytes(&bytes)
}

pub fn read_midi_bytes(bytes: &[u8]) -> Result<ArtifactSummary> {
    let smf = Smf::parse(bytes).map_err(|e| anyhow!("Failed to parse MIDI: {:?}", e))?;

    let ticks_per_quarter = match smf.header.timing {
        Timing::Metrical(t) => t.as_int(),
        Timing::Timecode(_fps, _subframe) => {
            return Err(anyhow!(
                "SMPTE timecode midi timing is not currently supported..!"
            ));
        }
    };

    debug!(
        "MIDI format: {:?}, tracks: {}, ticks per quarter: {}",
        smf.header.format,
        smf.tracks.len(),
        ticks_per_quarter
    );

    let mut title: Option<String> = None;
    let mut tempo_bpm: Option<f64> = None;
    let mut instruments: Vec<InstrumentSummary> = Vec::new();

    for (track_idx, track) in smf.tracks.iter().enumerate() {
        let mut abs_tick: u64 = 0;
        let mut track_name: Option<String> = None;
        let mut program: Option<(u8, u8)> = None;
        let mut notes: Vec<NoteSummary> = Vec::new();
        let mut open_notes: HashMap<(u8, u8), Vec<(u64, u8)>> = HashMap::new();

        for event in track.iter() {
            abs_tick = abs_tick.saturating_add(event.delta.as_int() as u64);

            match &event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(micro)) => {
                    if tempo_bpm.is_none() {
                        tempo_bpm = Some(mpqn_to_bpm(micro.as_int()));
                    } else {
                        debug!("Ignoring tempo change at tick {} (track {})", abs_tick, track_idx);
                    }
                }
                TrackEventKind::Meta(MetaMessage::TrackName(bytes)) => {
                    if track_name.is_none() {
                        track_name = Some(String::from_utf8_lossy(bytes).into_owned());
                    }
                }
                TrackEventKind::Midi { channel, message } => {
                    let ch: u8 = channel.as_int();

                    match message {
                        MidiMessage::ProgramChange { program: p } => {
                            if program.is_none() {
                                program = Some((p.as_int(), ch));
                            }
                        }
                        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            open_notes
                                .entry((ch, key.as_int()))
                                .or_default()
                                .push((abs_tick, vel.as_int()));
                        }
                        MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                            close_note(&mut open_notes, &mut notes, ch, key.as_int(), abs_tick);
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
        }

        for ((ch, key), stack) in open_notes.into_iter() {
            for (start_tick, velocity) in stack {
                warn!(
                    "Unclosed NoteOn for {}, channel: {} at tick: {} auto-closing at: {}..!",
                    key, ch, start_tick, abs_tick
                );
                notes.push(NoteSummary {
                    pitch: key,
                    velocity,
                    start_tick,
                    end_tick: abs_tick.max(start_tick),
                });
            }
        }

        notes.sort_by_key(|n| (n.start_tick, n.pitch));

        match program {
            Some((program, channel)) => instruments.push(InstrumentSummary {
                name: track_name.unwrap_or_default(),
                program,
                channel,
                notes,
            }),
            None if notes.is_empty() => {
                if title.is_none() {
                    title = track_name;
                }
            }
            None => {
                // notes without a program change play on the default program
                instruments.push(InstrumentSummary {
                    name: track_name.unwrap_or_default(),
                    program: 0,
                    channel: 0,
                    notes,
                })
            }
        }
    }

    Ok(ArtifactSummary {
        title,
        tempo_bpm,
        ticks_per_quarter,
        instruments,
    })
}

fn close_note(
    open_notes: &mut HashMap<(u8, u8), Vec<(u64, u8)>>,
    notes: &mut Vec<NoteSummary>,
    ch: u8,
    midi_num: u8,
    abs_tick: u64,
) {
    if let Some((start_tick, velocity)) = open_notes
        .get_mut(&(ch, midi_num))
        .and_then(|stack| stack.pop())
    {
        notes.push(NoteSummary {
            pitch: midi_num,
            velocity,
            start_tick,
            end_tick: abs_tick,
        });
    } else {
        debug!(
            "Orphaned NoteOff for {} ch{} at tick {}..!",
            midi_num, ch, abs_tick
        );
    }
}
