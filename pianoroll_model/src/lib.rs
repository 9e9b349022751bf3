// pianoroll_model: everything between a bundle file on disk and a generated
// NoteSequence.
//
// Module overview:
// - `bundle.rs`:    Bundle manifest loading (`generator_details.id`, optional
//                   checkpoint tables).
// - `hparams.rs`:   Typed hyperparameter table with `name=value` overrides.
// - `config.rs`:    Default model configurations keyed by generator id, and
//                   the batch-size clamp applied at startup.
// - `options.rs`:   `GeneratorOptions`: the generate section plus numeric
//                   search arguments passed to a generator per request.
// - `generator.rs`: The `SequenceGenerator` seam the service depends on.
// - `pianoroll.rs`: `PianorollGenerator`, a weighted pianoroll sampler with
//                   beam search that satisfies the seam.
// - `error.rs`:     `ModelError` and `HParamsError`.
//
// The service crate only sees `SequenceGenerator`; the concrete backend can be
// swapped without touching request handling.

pub mod bundle;
pub mod config;
pub mod error;
pub mod generator;
pub mod hparams;
pub mod options;
pub mod pianoroll;

pub use bundle::{Bundle, BundleDetails, GeneratorDetails, expand_home};
pub use config::{ModelConfig, config_for_bundle, default_configs};
pub use error::{HParamsError, ModelError, Result};
pub use generator::SequenceGenerator;
pub use hparams::{HParamValue, HParams};
pub use options::{GenerateSection, GeneratorArg, GeneratorOptions};
pub use pianoroll::{PianorollCheckpoint, PianorollGenerator};
