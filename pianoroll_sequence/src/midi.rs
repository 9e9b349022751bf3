// MIDI output for note sequences.
//
// Converts a NoteSequence into a Standard MIDI File (SMF) for download. Track
// 0 carries the tempo map; track 1 carries every note on channel 0 with an
// acoustic piano program. Seconds map to ticks through the sequence's tempo
// events, so a tempo change mid-sequence keeps later notes at the right
// wall-clock time.
//
// Uses the `midly` crate for MIDI writing. Output is SMF Format 1 (multi-track).
//
// The `MidiEncoder` trait is the seam the generation invoker writes through;
// `SmfEncoder` is the only production implementation.

use crate::error::{Result, SequenceError};
use crate::sequence::{DEFAULT_QPM, NoteSequence, STANDARD_PPQ};
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use std::path::Path;
use tracing::debug;

/// Largest value a MIDI delta time can hold (28 bits).
const MAX_DELTA: u64 = 0x0FFF_FFFF;

/// Largest microseconds-per-quarter a tempo meta event can hold (24 bits).
const MAX_TEMPO_MICROS: f64 = 16_777_215.0;

const PIANO_CHANNEL: u8 = 0;

/// Writes a note sequence to a file on disk.
pub trait MidiEncoder: Send + Sync {
    fn write(&self, sequence: &NoteSequence, path: &Path) -> Result<()>;
}

/// Standard MIDI File encoder backed by `midly`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmfEncoder;

impl MidiEncoder for SmfEncoder {
    fn write(&self, sequence: &NoteSequence, path: &Path) -> Result<()> {
        let buf = encode(sequence)?;
        std::fs::write(path, &buf)?;
        debug!(
            path = %path.display(),
            notes = sequence.notes.len(),
            bytes = buf.len(),
            "wrote MIDI file"
        );
        Ok(())
    }
}

/// Encode a sequence as SMF bytes.
pub fn encode(sequence: &NoteSequence) -> Result<Vec<u8>> {
    let smf = sequence_to_smf(sequence)?;
    let mut buf = Vec::new();
    smf.write_std(&mut buf)?;
    Ok(buf)
}

/// Convert a sequence to an in-memory SMF.
pub fn sequence_to_smf(sequence: &NoteSequence) -> Result<Smf<'static>> {
    let ticks_per_quarter = match sequence.ticks_per_quarter {
        0 => STANDARD_PPQ,
        tpq => tpq,
    };
    let resolution = u16::try_from(ticks_per_quarter)
        .ok()
        .filter(|&tpq| tpq <= 0x7FFF)
        .unwrap_or(STANDARD_PPQ as u16);
    let tempo_map = TempoMap::new(sequence, f64::from(resolution))?;

    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(resolution)),
    ));

    // Track 0: tempo track
    let mut tempo_events: Vec<(u64, TrackEventKind<'static>)> = Vec::new();
    for segment in &tempo_map.segments {
        tempo_events.push((
            segment.start_ticks.round() as u64,
            TrackEventKind::Meta(MetaMessage::Tempo(u24::new(segment.micros_per_quarter))),
        ));
    }
    smf.tracks.push(to_track(tempo_events)?);

    // Track 1: notes
    let channel = u4::new(PIANO_CHANNEL);
    let mut note_events: Vec<(u64, u8, TrackEventKind<'static>)> = Vec::new();
    note_events.push((
        0,
        0,
        TrackEventKind::Meta(MetaMessage::TrackName(b"Piano")),
    ));
    note_events.push((
        0,
        0,
        TrackEventKind::Midi {
            channel,
            message: MidiMessage::ProgramChange { program: u7::new(0) },
        },
    ));

    for note in &sequence.notes {
        let key = midi_value(note.pitch)
            .ok_or(SequenceError::PitchOutOfRange { pitch: note.pitch })?;
        let vel = midi_value(note.velocity).ok_or(SequenceError::VelocityOutOfRange {
            velocity: note.velocity,
        })?;
        if note.end_time <= note.start_time {
            return Err(SequenceError::InvertedNote {
                start_time: note.start_time,
                end_time: note.end_time,
            });
        }

        let on_tick = tempo_map.ticks_at(note.start_time);
        let off_tick = tempo_map.ticks_at(note.end_time).max(on_tick + 1);
        // Note-offs sort before note-ons on the same tick so a repeated pitch
        // is released before it is struck again.
        note_events.push((
            on_tick,
            2,
            TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOn {
                    key: u7::new(key),
                    vel: u7::new(vel),
                },
            },
        ));
        note_events.push((
            off_tick,
            1,
            TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOff {
                    key: u7::new(key),
                    vel: u7::new(0),
                },
            },
        ));
    }

    note_events.sort_by_key(|(tick, order, _)| (*tick, *order));
    smf.tracks.push(to_track(
        note_events
            .into_iter()
            .map(|(tick, _, kind)| (tick, kind))
            .collect(),
    )?);

    Ok(smf)
}

/// Turn absolute-tick events (already in order) into a delta-timed track
/// terminated by EndOfTrack.
fn to_track(events: Vec<(u64, TrackEventKind<'static>)>) -> Result<Track<'static>> {
    let mut track: Track<'static> = Vec::with_capacity(events.len() + 1);
    let mut last_tick = 0u64;
    for (tick, kind) in events {
        let delta = tick.saturating_sub(last_tick);
        if delta > MAX_DELTA {
            return Err(SequenceError::TooLong { ticks: tick });
        }
        track.push(TrackEvent {
            delta: u28::new(delta as u32),
            kind,
        });
        last_tick = last_tick.max(tick);
    }
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    Ok(track)
}

fn midi_value(value: i32) -> Option<u8> {
    u8::try_from(value).ok().filter(|&v| v <= 127)
}

/// One constant-tempo stretch of the sequence.
struct TempoSegment {
    start_seconds: f64,
    start_ticks: f64,
    ticks_per_second: f64,
    micros_per_quarter: u32,
}

/// Piecewise-linear mapping from seconds to ticks.
struct TempoMap {
    segments: Vec<TempoSegment>,
}

impl TempoMap {
    fn new(sequence: &NoteSequence, ticks_per_quarter: f64) -> Result<Self> {
        let mut tempos = sequence.tempos.clone();
        tempos.sort_by(|a, b| a.time.total_cmp(&b.time));
        if tempos.first().is_none_or(|t| t.time > 0.0) {
            tempos.insert(
                0,
                crate::sequence::Tempo {
                    time: 0.0,
                    qpm: DEFAULT_QPM,
                },
            );
        }

        let mut segments: Vec<TempoSegment> = Vec::with_capacity(tempos.len());
        for tempo in tempos {
            let micros = 60_000_000.0 / tempo.qpm;
            if !tempo.qpm.is_finite() || tempo.qpm <= 0.0 || micros > MAX_TEMPO_MICROS {
                return Err(SequenceError::InvalidTempo { qpm: tempo.qpm });
            }
            let start_seconds = tempo.time.max(0.0);
            let start_ticks = match segments.last() {
                Some(prev) => {
                    prev.start_ticks + (start_seconds - prev.start_seconds) * prev.ticks_per_second
                }
                None => 0.0,
            };
            // A later event at the same instant replaces the earlier one.
            if segments
                .last()
                .is_some_and(|prev| prev.start_seconds == start_seconds)
            {
                segments.pop();
            }
            segments.push(TempoSegment {
                start_seconds,
                start_ticks,
                ticks_per_second: tempo.qpm / 60.0 * ticks_per_quarter,
                micros_per_quarter: micros.round() as u32,
            });
        }
        Ok(TempoMap { segments })
    }

    fn ticks_at(&self, seconds: f64) -> u64 {
        let seconds = seconds.max(0.0);
        let segment = self
            .segments
            .iter()
            .rev()
            .find(|s| s.start_seconds <= seconds)
            .unwrap_or(&self.segments[0]);
        let ticks = segment.start_ticks + (seconds - segment.start_seconds) * segment.ticks_per_second;
        ticks.round() as u64
    }
}
