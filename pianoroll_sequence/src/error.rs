// Errors raised while turning a NoteSequence into a MIDI file.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pitch {pitch} is outside the MIDI range 0..=127")]
    PitchOutOfRange { pitch: i32 },

    #[error("velocity {velocity} is outside the MIDI range 0..=127")]
    VelocityOutOfRange { velocity: i32 },

    #[error("tempo of {qpm} qpm cannot be encoded")]
    InvalidTempo { qpm: f64 },

    #[error("note ends at {end_time}s but starts at {start_time}s")]
    InvertedNote { start_time: f64, end_time: f64 },

    #[error("event at tick {ticks} does not fit in a MIDI delta time")]
    TooLong { ticks: u64 },
}

pub type Result<T> = std::result::Result<T, SequenceError>;
