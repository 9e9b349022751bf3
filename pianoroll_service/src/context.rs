// Shared request context and the per-request generation pipeline.
//
// `ServiceContext` is assembled once at startup and cloned into every worker
// thread. The config is immutable, the generator and encoder are
// `Send + Sync` trait objects behind `Arc`, and one output lock is shared by
// every clone so concurrent requests never read back each other's files.
//
// Pipeline for one request:
//   primer text -> build_primer -> compute_window -> invoke -> Option<file>
// A window that would be empty is logged and yields `Ok(None)`; the endpoint
// turns that into its "File not found" response.

use crate::config::ServiceConfig;
use crate::error::Result;
use crate::invoke::{GeneratedFile, InvokeSettings, invoke, timestamp_now};
use crate::primer::build_primer;
use crate::window::compute_window;
use pianoroll_model::{Bundle, PianorollGenerator, SequenceGenerator, config_for_bundle};
use pianoroll_sequence::{MidiEncoder, SmfEncoder};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info};

#[derive(Clone)]
pub struct ServiceContext {
    config: Arc<ServiceConfig>,
    generator: Arc<dyn SequenceGenerator>,
    encoder: Arc<dyn MidiEncoder>,
    output_lock: Arc<Mutex<()>>,
}

impl ServiceContext {
    pub fn new(
        config: ServiceConfig,
        generator: Arc<dyn SequenceGenerator>,
        encoder: Arc<dyn MidiEncoder>,
    ) -> Self {
        ServiceContext {
            config: Arc::new(config),
            generator,
            encoder,
            output_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Validate `config`, load its bundle, and build the production generator
    /// and encoder.
    pub fn from_config(config: ServiceConfig) -> Result<Self> {
        config.validate()?;
        let bundle = Bundle::load(&config.bundle_file)?;
        let model_config = config_for_bundle(
            &bundle,
            &config.hparams,
            config.beam_size,
            config.branch_factor,
        )?;
        let generator = PianorollGenerator::new(&model_config, &bundle, config.seed)?;
        info!(
            generator_id = %generator.details().id,
            steps_per_quarter = generator.steps_per_quarter(),
            num_steps = config.num_steps,
            qpm = config.effective_qpm(),
            "generator ready"
        );
        Ok(Self::new(config, Arc::new(generator), Arc::new(SmfEncoder)))
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Run the full pipeline for one request. Returns the last file written,
    /// or `None` if the primer leaves nothing to generate.
    pub fn generate_from_primer(&self, primer_pitches: Option<&str>) -> Result<Option<GeneratedFile>> {
        let qpm = self.config.effective_qpm();
        let primer = build_primer(primer_pitches, qpm)?;

        let window = match compute_window(
            &primer,
            qpm,
            self.generator.steps_per_quarter(),
            self.config.num_steps,
        ) {
            Ok(window) => window,
            Err(err) => {
                error!(
                    primer_length = err.start_time,
                    requested_length = err.end_time,
                    "{err}"
                );
                return Ok(None);
            }
        };

        debug!(
            start_time = window.start_time,
            end_time = window.end_time,
            duration = window.duration(),
            "generation window"
        );

        let settings = InvokeSettings::from_config(&self.config);
        invoke(
            self.generator.as_ref(),
            self.encoder.as_ref(),
            &primer,
            window,
            &settings,
            &timestamp_now(),
            &self.output_lock,
        )
    }
}
