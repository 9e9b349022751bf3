// Generation invoker: run the generator and write MIDI files.
//
// One `GeneratorOptions` is built per request and reused for every output.
// Files are named `{timestamp}_{index}.mid` with the index zero-padded to the
// width of `num_outputs`, so a batch sorts in generation order. Only the last
// file written is returned, together with its bytes.
//
// Names have one-second resolution, so concurrent requests can target the
// same path. Each write, and the read-back of the final file, happens under
// the shared output lock; the bytes returned are always the ones this
// request wrote, even if a later request overwrites the file on disk.
// Generation itself runs outside the lock.
//
// No retries: a generator or encoder failure aborts the batch, leaving any
// files already written in place.

use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError};
use crate::window::GenerationWindow;
use pianoroll_model::{GeneratorOptions, SequenceGenerator};
use pianoroll_sequence::{MidiEncoder, NoteSequence};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{info, warn};

/// Timestamp format shared by every file in one batch.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H%M%S";

#[derive(Debug, Clone, PartialEq)]
pub struct InvokeSettings {
    pub beam_size: u32,
    pub branch_factor: u32,
    pub num_outputs: u32,
    pub output_dir: PathBuf,
}

impl InvokeSettings {
    pub fn from_config(config: &ServiceConfig) -> Self {
        InvokeSettings {
            beam_size: config.beam_size,
            branch_factor: config.branch_factor,
            num_outputs: config.num_outputs,
            output_dir: config.resolved_output_dir(),
        }
    }
}

/// The last file of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    /// Bytes read back right after writing, or `None` if that read failed.
    pub contents: Option<Vec<u8>>,
}

/// Options for one request: the window as the single generate section, plus
/// the search-width arguments.
pub fn build_options(window: GenerationWindow, beam_size: u32, branch_factor: u32) -> GeneratorOptions {
    let mut options = GeneratorOptions::new();
    options.add_generate_section(window.start_time, window.end_time);
    options.set_int_arg("beam_size", i64::from(beam_size));
    options.set_int_arg("branch_factor", i64::from(branch_factor));
    options
}

/// Local wall-clock time formatted for output file names.
pub fn timestamp_now() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// File name for output `index` (1-based) of a batch of `num_outputs`.
pub fn output_filename(timestamp: &str, index: u32, num_outputs: u32) -> String {
    let digits = num_outputs.to_string().len();
    format!("{timestamp}_{index:0digits$}.mid")
}

/// Generate `settings.num_outputs` continuations of `primer` over `window`
/// and write each to `settings.output_dir`. Returns the last file written,
/// or `None` if `num_outputs` is zero.
pub fn invoke(
    generator: &dyn SequenceGenerator,
    encoder: &dyn MidiEncoder,
    primer: &NoteSequence,
    window: GenerationWindow,
    settings: &InvokeSettings,
    timestamp: &str,
    output_lock: &Mutex<()>,
) -> Result<Option<GeneratedFile>> {
    std::fs::create_dir_all(&settings.output_dir).map_err(|source| ServiceError::OutputDir {
        path: settings.output_dir.clone(),
        source,
    })?;

    let options = build_options(window, settings.beam_size, settings.branch_factor);

    let mut last = None;
    for i in 1..=settings.num_outputs {
        let generated = generator.generate(primer, &options)?;
        let path = settings
            .output_dir
            .join(output_filename(timestamp, i, settings.num_outputs));

        let _guard = output_lock.lock().unwrap_or_else(PoisonError::into_inner);
        encoder.write(&generated, &path)?;
        info!(
            path = %path.display(),
            notes = generated.notes.len(),
            "wrote generated sequence"
        );
        if i == settings.num_outputs {
            last = Some(GeneratedFile {
                contents: read_output(&path),
                path,
            });
        }
    }
    Ok(last)
}

/// Read a written file back. Any failure is logged and yields `None`.
pub fn read_output(path: &Path) -> Option<Vec<u8>> {
    if !path.is_file() {
        warn!(path = %path.display(), "generated file is missing");
        return None;
    }
    match std::fs::read(path) {
        Ok(body) => Some(body),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read generated file");
            None
        }
    }
}
