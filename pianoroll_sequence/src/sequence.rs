// The note sequence: an ordered list of timed notes plus tempo metadata.
//
// Times are absolute seconds from the start of the sequence. `total_time` is
// stored rather than derived because the primer builder sets it explicitly
// from the last appended note; generators call `recompute_total_time` after
// appending their own notes.
//
// Pitch and velocity are plain integers here. Range checking happens at the
// MIDI boundary (`midi.rs`), so a sequence can carry whatever a client sent.

use serde::{Deserialize, Serialize};

/// Ticks per quarter note recorded on freshly built sequences.
pub const STANDARD_PPQ: u32 = 220;

/// Tempo assumed when a sequence carries no tempo events.
pub const DEFAULT_QPM: f64 = 120.0;

/// A single sounding note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub pitch: i32,
    pub start_time: f64,
    pub end_time: f64,
    pub velocity: i32,
}

impl NoteEvent {
    /// True if the note is held at `time` (start inclusive, end exclusive).
    pub fn sounds_at(&self, time: f64) -> bool {
        self.start_time <= time && time < self.end_time
    }
}

/// A tempo change, in quarter notes per minute, taking effect at `time`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tempo {
    pub time: f64,
    pub qpm: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NoteSequence {
    pub ticks_per_quarter: u32,
    pub tempos: Vec<Tempo>,
    pub notes: Vec<NoteEvent>,
    pub total_time: f64,
}

impl NoteSequence {
    /// An empty sequence with a single tempo event at time zero.
    pub fn new(ticks_per_quarter: u32, qpm: f64) -> Self {
        NoteSequence {
            ticks_per_quarter,
            tempos: vec![Tempo { time: 0.0, qpm }],
            notes: Vec::new(),
            total_time: 0.0,
        }
    }

    /// Tempo of the first tempo event, or `DEFAULT_QPM` if there is none.
    pub fn qpm(&self) -> f64 {
        self.tempos.first().map_or(DEFAULT_QPM, |t| t.qpm)
    }

    /// Set `total_time` to the latest note end (0 for an empty sequence).
    pub fn recompute_total_time(&mut self) {
        self.total_time = self.notes.iter().map(|n| n.end_time).fold(0.0, f64::max);
    }

    /// Pitches of every note held at `time`, in ascending order, deduplicated.
    pub fn pitches_sounding_at(&self, time: f64) -> Vec<i32> {
        let mut pitches: Vec<i32> = self
            .notes
            .iter()
            .filter(|n| n.sounds_at(time))
            .map(|n| n.pitch)
            .collect();
        pitches.sort_unstable();
        pitches.dedup();
        pitches
    }
}
