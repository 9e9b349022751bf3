// Test doubles for the generator and encoder seams.

use pianoroll_model::{GeneratorDetails, GeneratorOptions, ModelError, SequenceGenerator};
use pianoroll_sequence::{MidiEncoder, NoteEvent, NoteSequence};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Fresh, empty directory under the system temp dir, unique per test name.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "pianoroll_service_{name}_{}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Appends one note spanning the requested section and records its calls.
pub struct StubGenerator {
    details: GeneratorDetails,
    calls: AtomicUsize,
    last_options: Mutex<Option<GeneratorOptions>>,
}

impl StubGenerator {
    pub fn new() -> Self {
        StubGenerator {
            details: GeneratorDetails {
                id: "stub".into(),
                description: String::new(),
            },
            calls: AtomicUsize::new(0),
            last_options: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_options(&self) -> Option<GeneratorOptions> {
        self.last_options.lock().unwrap().clone()
    }
}

impl Default for StubGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceGenerator for StubGenerator {
    fn details(&self) -> &GeneratorDetails {
        &self.details
    }

    fn steps_per_quarter(&self) -> u32 {
        4
    }

    fn generate(
        &self,
        primer: &NoteSequence,
        options: &GeneratorOptions,
    ) -> pianoroll_model::Result<NoteSequence> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock().unwrap() = Some(options.clone());
        let section = options.generate_sections[0];
        let mut out = primer.clone();
        out.notes.push(NoteEvent {
            pitch: 72,
            start_time: section.start_time,
            end_time: section.end_time,
            velocity: 100,
        });
        out.recompute_total_time();
        Ok(out)
    }
}

pub struct FailingGenerator;

impl SequenceGenerator for FailingGenerator {
    fn details(&self) -> &GeneratorDetails {
        unimplemented!("not used by tests")
    }

    fn steps_per_quarter(&self) -> u32 {
        4
    }

    fn generate(
        &self,
        _primer: &NoteSequence,
        _options: &GeneratorOptions,
    ) -> pianoroll_model::Result<NoteSequence> {
        Err(ModelError::InvalidOptions("generator exploded".into()))
    }
}

/// Writes a placeholder file and remembers every path it was asked to write.
#[derive(Default)]
pub struct RecordingEncoder {
    paths: Mutex<Vec<PathBuf>>,
    delay: Duration,
}

impl RecordingEncoder {
    /// Sleeps for `delay` after each write before returning.
    pub fn with_delay(delay: Duration) -> Self {
        RecordingEncoder {
            delay,
            ..Default::default()
        }
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.paths.lock().unwrap().clone()
    }
}

impl MidiEncoder for RecordingEncoder {
    fn write(&self, sequence: &NoteSequence, path: &Path) -> pianoroll_sequence::Result<()> {
        std::fs::write(path, format!("{} notes", sequence.notes.len()))?;
        self.paths.lock().unwrap().push(path.to_path_buf());
        std::thread::sleep(self.delay);
        Ok(())
    }
}
