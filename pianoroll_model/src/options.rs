// Per-request generator options.
//
// Mirrors what a generator needs to know beyond the primer: which stretch of
// time to fill (`generate_sections`) and loosely-typed search arguments
// (`args`, e.g. `beam_size`). Built fresh for each request and handed to the
// generator by reference.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Absolute time span, in seconds, that the generator should fill.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerateSection {
    pub start_time: f64,
    pub end_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GeneratorArg {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GeneratorOptions {
    pub generate_sections: Vec<GenerateSection>,
    pub args: BTreeMap<String, GeneratorArg>,
}

impl GeneratorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_generate_section(&mut self, start_time: f64, end_time: f64) -> GenerateSection {
        let section = GenerateSection {
            start_time,
            end_time,
        };
        self.generate_sections.push(section);
        section
    }

    pub fn set_int_arg(&mut self, name: &str, value: i64) {
        self.args.insert(name.to_string(), GeneratorArg::Int(value));
    }

    /// Integer argument by name. `None` if absent or not an integer.
    pub fn int_arg(&self, name: &str) -> Option<i64> {
        match self.args.get(name) {
            Some(GeneratorArg::Int(i)) => Some(*i),
            _ => None,
        }
    }
}
