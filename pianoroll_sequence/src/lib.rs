// pianoroll_sequence: note sequences and MIDI output for the pianoroll
// generation service.
//
// A `NoteSequence` is the interchange value of the whole service: the primer
// builder produces one, the generator extends one, and the MIDI encoder
// serializes one. Times are in seconds; tempo is carried alongside so the
// encoder can map seconds to ticks.
//
// Module overview:
// - `sequence.rs`: `NoteEvent`, `Tempo`, `NoteSequence`, and the
//                  `STANDARD_PPQ` resolution constant.
// - `midi.rs`:     The `MidiEncoder` seam and `SmfEncoder`, which writes
//                  SMF Format 1 via the `midly` crate.
// - `error.rs`:    `SequenceError` for encoding failures.
//
// No dependency on the model or the HTTP layer.

pub mod error;
pub mod midi;
pub mod sequence;

pub use error::{Result, SequenceError};
pub use midi::{MidiEncoder, SmfEncoder};
pub use sequence::{DEFAULT_QPM, NoteEvent, NoteSequence, STANDARD_PPQ, Tempo};
