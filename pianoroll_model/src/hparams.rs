// Hyperparameter table with textual overrides.
//
// Every model configuration starts from a fixed set of named, typed values.
// Operators override them at startup with a string like
// `batch_size=32,rnn_layer_sizes=[64,64]`. Overrides may only touch names
// that already exist, and the new value must parse as the existing type, so
// a typo fails loudly at startup rather than silently adding a dead key.

use crate::error::HParamsError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    IntList(Vec<i64>),
    Str(String),
}

impl HParamValue {
    fn type_name(&self) -> &'static str {
        match self {
            HParamValue::Bool(_) => "bool",
            HParamValue::Int(_) => "int",
            HParamValue::Float(_) => "float",
            HParamValue::IntList(_) => "int list",
            HParamValue::Str(_) => "string",
        }
    }

    /// Parse `text` as a value of the same type as `self`.
    fn parse_like(&self, text: &str) -> Option<HParamValue> {
        match self {
            HParamValue::Bool(_) => match text {
                "true" | "True" | "1" => Some(HParamValue::Bool(true)),
                "false" | "False" | "0" => Some(HParamValue::Bool(false)),
                _ => None,
            },
            HParamValue::Int(_) => text.parse().ok().map(HParamValue::Int),
            HParamValue::Float(_) => text.parse().ok().map(HParamValue::Float),
            HParamValue::IntList(_) => {
                let inner = text.strip_prefix('[')?.strip_suffix(']')?.trim();
                if inner.is_empty() {
                    return Some(HParamValue::IntList(Vec::new()));
                }
                inner
                    .split(',')
                    .map(|item| item.trim().parse::<i64>().ok())
                    .collect::<Option<Vec<_>>>()
                    .map(HParamValue::IntList)
            }
            HParamValue::Str(_) => Some(HParamValue::Str(text.to_string())),
        }
    }
}

impl fmt::Display for HParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HParamValue::Bool(b) => write!(f, "{b}"),
            HParamValue::Int(i) => write!(f, "{i}"),
            HParamValue::Float(x) => write!(f, "{x}"),
            HParamValue::IntList(items) => {
                let items: Vec<String> = items.iter().map(|i| i.to_string()).collect();
                write!(f, "[{}]", items.join(","))
            }
            HParamValue::Str(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HParams {
    values: BTreeMap<String, HParamValue>,
}

impl HParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, used when declaring a configuration's defaults.
    pub fn with(mut self, name: &str, value: HParamValue) -> Self {
        self.values.insert(name.to_string(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&HParamValue> {
        self.values.get(name)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(HParamValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    /// Overwrite an existing integer hparam. Returns false if `name` is not an
    /// integer hparam.
    pub fn set_int(&mut self, name: &str, value: i64) -> bool {
        match self.values.get_mut(name) {
            Some(HParamValue::Int(i)) => {
                *i = value;
                true
            }
            _ => false,
        }
    }

    /// Apply comma-separated `name=value` overrides. Commas inside brackets
    /// belong to list values. Empty input is a no-op. On error, overrides
    /// preceding the bad entry have already been applied.
    pub fn parse(&mut self, text: &str) -> Result<(), HParamsError> {
        for entry in split_top_level(text) {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let (name, value) = entry
                .split_once('=')
                .ok_or_else(|| HParamsError::Malformed(entry.to_string()))?;
            let (name, value) = (name.trim(), value.trim());
            if name.is_empty() {
                return Err(HParamsError::Malformed(entry.to_string()));
            }

            let current = self
                .values
                .get(name)
                .ok_or_else(|| HParamsError::UnknownName(name.to_string()))?;
            let parsed = current
                .parse_like(value)
                .ok_or_else(|| HParamsError::TypeMismatch {
                    name: name.to_string(),
                    value: value.to_string(),
                    expected: current.type_name(),
                })?;
            self.values.insert(name.to_string(), parsed);
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Split on commas that are not nested inside `[...]`.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}
