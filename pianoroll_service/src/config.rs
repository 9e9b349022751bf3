// Service configuration.
//
// Everything that was process-global in earlier deployments lives here:
// bundle location, output directory, search width, tempo, and step count,
// plus the listener settings. The struct is built once in `main.rs`
// (defaults, then an optional JSON file, then CLI flags), validated, and then
// shared read-only through `ServiceContext`.
//
// Every field has a default so a config file only needs the keys it changes.

use crate::error::{Result, ServiceError};
use crate::logging::log_directive;
use crate::primer::resolve_qpm;
use pianoroll_model::expand_home;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Model bundle to load at startup.
    pub bundle_file: PathBuf,
    /// Directory generated MIDI files are written to. Created on demand.
    pub output_dir: PathBuf,
    /// Generator runs per request. Only the last file is returned.
    pub num_outputs: u32,
    /// Total length of the result, in model steps, counted from time zero.
    pub num_steps: u32,
    /// Primer tempo. Unset (or zero) means 60 qpm.
    pub qpm: Option<f64>,
    pub beam_size: u32,
    pub branch_factor: u32,
    /// Log verbosity: DEBUG, INFO, WARN, ERROR, or FATAL.
    pub log: String,
    /// Comma-separated `name=value` hyperparameter overrides.
    pub hparams: String,
    pub host: String,
    pub port: u16,
    /// Requests handled concurrently, one generation per thread.
    pub worker_threads: usize,
    /// Seed for the generator's RNG. Unset draws from the OS.
    pub seed: Option<u64>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            bundle_file: PathBuf::from("pretrained/pianoroll_rnn_nade.mag"),
            output_dir: PathBuf::from("/tmp/pianoroll_rnn_nade/generated"),
            num_outputs: 1,
            num_steps: 128,
            qpm: None,
            beam_size: 1,
            branch_factor: 1,
            log: "INFO".into(),
            hparams: String::new(),
            host: "0.0.0.0".into(),
            port: 5000,
            worker_threads: 4,
            seed: None,
        }
    }
}

impl ServiceConfig {
    /// Read a JSON config file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|source| ServiceError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ServiceError::ConfigFormat {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_outputs == 0 {
            return Err(ServiceError::Config("num_outputs must be at least 1".into()));
        }
        if self.beam_size == 0 {
            return Err(ServiceError::Config("beam_size must be at least 1".into()));
        }
        if self.branch_factor == 0 {
            return Err(ServiceError::Config("branch_factor must be at least 1".into()));
        }
        if let Some(qpm) = self.qpm.filter(|q| !q.is_finite() || *q < 0.0) {
            return Err(ServiceError::Config(format!(
                "qpm must be zero (unset) or a positive finite number, got {qpm}"
            )));
        }
        if self.worker_threads == 0 {
            return Err(ServiceError::Config(
                "worker_threads must be at least 1".into(),
            ));
        }
        if log_directive(&self.log).is_none() {
            return Err(ServiceError::Config(format!(
                "unknown log level '{}'",
                self.log
            )));
        }
        Ok(())
    }

    /// Primer tempo with the 60 qpm fallback applied.
    pub fn effective_qpm(&self) -> f64 {
        resolve_qpm(self.qpm)
    }

    /// `output_dir` with a leading `~` expanded.
    pub fn resolved_output_dir(&self) -> PathBuf {
        expand_home(&self.output_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_stock_deployment() {
        let config = ServiceConfig::default();
        assert_eq!(config.num_outputs, 1);
        assert_eq!(config.num_steps, 128);
        assert_eq!(config.qpm, None);
        assert_eq!(config.effective_qpm(), 60.0);
        assert_eq!((config.beam_size, config.branch_factor), (1, 1));
        assert_eq!(config.log, "INFO");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_qpm_falls_back_to_sixty() {
        let config = ServiceConfig {
            qpm: Some(0.0),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.effective_qpm(), 60.0);

        let config = ServiceConfig {
            qpm: Some(90.0),
            ..Default::default()
        };
        assert_eq!(config.effective_qpm(), 90.0);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: ServiceConfig =
            serde_json::from_str(r#"{"num_steps": 64, "qpm": 120.0, "port": 8080}"#).unwrap();
        assert_eq!(config.num_steps, 64);
        assert_eq!(config.qpm, Some(120.0));
        assert_eq!(config.port, 8080);
        assert_eq!(config.beam_size, 1);
        assert_eq!(
            config.bundle_file,
            PathBuf::from("pretrained/pianoroll_rnn_nade.mag")
        );
    }

    #[test]
    fn load_reports_missing_and_malformed_files() {
        assert!(matches!(
            ServiceConfig::load(Path::new("/nonexistent/service.json")),
            Err(ServiceError::ConfigIo { .. })
        ));

        let path = std::env::temp_dir().join(format!(
            "pianoroll_service_config_{}.json",
            std::process::id()
        ));
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            ServiceConfig::load(&path),
            Err(ServiceError::ConfigFormat { .. })
        ));
        std::fs::write(&path, r#"{"beam_size": 3}"#).unwrap();
        assert_eq!(ServiceConfig::load(&path).unwrap().beam_size, 3);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn validate_rejects_bad_values() {
        let bad = [
            ServiceConfig {
                num_outputs: 0,
                ..Default::default()
            },
            ServiceConfig {
                beam_size: 0,
                ..Default::default()
            },
            ServiceConfig {
                branch_factor: 0,
                ..Default::default()
            },
            ServiceConfig {
                qpm: Some(-1.0),
                ..Default::default()
            },
            ServiceConfig {
                qpm: Some(f64::NAN),
                ..Default::default()
            },
            ServiceConfig {
                worker_threads: 0,
                ..Default::default()
            },
            ServiceConfig {
                log: "CHATTY".into(),
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(
                matches!(config.validate(), Err(ServiceError::Config(_))),
                "{config:?} should be rejected"
            );
        }
    }

    #[test]
    fn bad_qpm_message_mentions_zero_as_unset() {
        let config = ServiceConfig {
            qpm: Some(-4.0),
            ..Default::default()
        };
        let message = config.validate().unwrap_err().to_string();
        assert!(
            message.contains("qpm must be zero (unset) or a positive finite number"),
            "{message}"
        );
    }
}
