// Model configurations keyed by generator id.
//
// A bundle names the configuration it was trained with; the service looks
// that id up here, applies the operator's hparam overrides, and clamps the
// batch size to the search width actually used per request.

use crate::bundle::{Bundle, GeneratorDetails};
use crate::error::{ModelError, Result};
use crate::hparams::{HParamValue, HParams};
use std::collections::BTreeMap;
use tracing::info;

/// Model resolution shared by the built-in configurations.
pub const DEFAULT_STEPS_PER_QUARTER: u32 = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub details: GeneratorDetails,
    pub hparams: HParams,
    pub steps_per_quarter: u32,
}

fn base_hparams() -> HParams {
    HParams::new()
        .with("batch_size", HParamValue::Int(64))
        .with("rnn_layer_sizes", HParamValue::IntList(vec![128, 128, 128]))
        .with("nade_hidden_units", HParamValue::Int(128))
        .with("dropout_keep_prob", HParamValue::Float(0.5))
        .with("clip_norm", HParamValue::Float(5.0))
        .with("learning_rate", HParamValue::Float(0.001))
}

/// The built-in configurations, keyed by generator id.
pub fn default_configs() -> BTreeMap<String, ModelConfig> {
    let mut configs = BTreeMap::new();
    configs.insert(
        "rnn-nade".to_string(),
        ModelConfig {
            details: GeneratorDetails {
                id: "rnn-nade".into(),
                description: "RNN-NADE".into(),
            },
            hparams: base_hparams(),
            steps_per_quarter: DEFAULT_STEPS_PER_QUARTER,
        },
    );
    configs.insert(
        "rnn-nade_attn".to_string(),
        ModelConfig {
            details: GeneratorDetails {
                id: "rnn-nade_attn".into(),
                description: "RNN-NADE with attention.".into(),
            },
            hparams: base_hparams().with("attn_length", HParamValue::Int(32)),
            steps_per_quarter: DEFAULT_STEPS_PER_QUARTER,
        },
    );
    configs
}

/// Resolve the configuration for `bundle`, apply `hparam_overrides`, and clamp
/// `batch_size` to `beam_size * branch_factor`.
pub fn config_for_bundle(
    bundle: &Bundle,
    hparam_overrides: &str,
    beam_size: u32,
    branch_factor: u32,
) -> Result<ModelConfig> {
    let id = &bundle.generator_details.id;
    let mut config = default_configs()
        .remove(id)
        .ok_or_else(|| ModelError::UnknownGeneratorId(id.clone()))?;

    config.hparams.parse(hparam_overrides)?;

    let search_width = i64::from(beam_size) * i64::from(branch_factor);
    if let Some(batch_size) = config.hparams.get_int("batch_size") {
        config
            .hparams
            .set_int("batch_size", batch_size.min(search_width));
    }

    let hparams: Vec<String> = config
        .hparams
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect();
    info!(
        generator_id = %id,
        steps_per_quarter = config.steps_per_quarter,
        hparams = %hparams.join(","),
        "resolved model configuration"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(id: &str) -> Bundle {
        Bundle {
            generator_details: GeneratorDetails {
                id: id.into(),
                description: String::new(),
            },
            bundle_details: None,
            checkpoint: None,
        }
    }

    #[test]
    fn default_configs_cover_both_ids() {
        let configs = default_configs();
        assert_eq!(configs.len(), 2);
        for config in configs.values() {
            assert_eq!(config.steps_per_quarter, 4);
            assert_eq!(config.hparams.get_int("batch_size"), Some(64));
        }
        assert_eq!(
            configs["rnn-nade_attn"].hparams.get_int("attn_length"),
            Some(32)
        );
        assert!(configs["rnn-nade"].hparams.get("attn_length").is_none());
    }

    #[test]
    fn batch_size_clamped_to_search_width() {
        let config = config_for_bundle(&bundle("rnn-nade"), "", 1, 1).unwrap();
        assert_eq!(config.hparams.get_int("batch_size"), Some(1));

        let config = config_for_bundle(&bundle("rnn-nade"), "", 4, 8).unwrap();
        assert_eq!(config.hparams.get_int("batch_size"), Some(32));

        let config = config_for_bundle(&bundle("rnn-nade"), "", 16, 16).unwrap();
        assert_eq!(config.hparams.get_int("batch_size"), Some(64));
    }

    #[test]
    fn overrides_apply_before_clamp() {
        let config = config_for_bundle(&bundle("rnn-nade"), "batch_size=3", 2, 2).unwrap();
        assert_eq!(config.hparams.get_int("batch_size"), Some(3));
    }

    #[test]
    fn unknown_id_is_rejected() {
        let err = config_for_bundle(&bundle("melody_rnn"), "", 1, 1).unwrap_err();
        assert!(matches!(err, ModelError::UnknownGeneratorId(id) if id == "melody_rnn"));
    }

    #[test]
    fn bad_override_is_rejected() {
        let err = config_for_bundle(&bundle("rnn-nade"), "attn_length=8", 1, 1).unwrap_err();
        assert!(matches!(err, ModelError::HParams(_)));
    }
}
