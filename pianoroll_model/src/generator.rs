// The generator seam.
//
// Request handling depends only on this trait. A generator is built once at
// startup and shared by every worker thread, so implementations must be
// `Send + Sync` and keep any mutable state (e.g. an RNG) behind their own
// synchronization.

use crate::bundle::GeneratorDetails;
use crate::error::Result;
use crate::options::GeneratorOptions;
use pianoroll_sequence::NoteSequence;

pub trait SequenceGenerator: Send + Sync {
    fn details(&self) -> &GeneratorDetails;

    /// Model time resolution, in steps per quarter note.
    fn steps_per_quarter(&self) -> u32;

    /// Extend `primer` over the span named in `options`. The returned sequence
    /// includes the primer's notes.
    fn generate(&self, primer: &NoteSequence, options: &GeneratorOptions) -> Result<NoteSequence>;
}
