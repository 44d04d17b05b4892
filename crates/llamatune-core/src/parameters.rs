use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{LlamaTuneError, Result};

/// Generation options keyed by their Ollama option name.
///
/// Values are passed through to the model untouched; nothing here checks
/// ranges or names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationParameters(BTreeMap<String, Value>);

impl GenerationParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.0.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Apply a `name=value` override. Numbers and booleans are parsed as
    /// JSON, anything else is kept as a string.
    pub fn apply_override(&mut self, assignment: &str) -> Result<()> {
        let Some((name, raw)) = assignment.split_once('=') else {
            return Err(LlamaTuneError::Config(format!(
                "Expected name=value, got '{}'",
                assignment
            )));
        };

        let name = name.trim();
        if name.is_empty() {
            return Err(LlamaTuneError::Config(format!(
                "Missing parameter name in '{}'",
                assignment
            )));
        }

        let raw = raw.trim();
        let value = serde_json::from_str::<Value>(raw)
            .ok()
            .filter(|v| v.is_number() || v.is_boolean())
            .unwrap_or_else(|| Value::String(raw.to_string()));

        self.set(name, value);
        Ok(())
    }

    /// Parameters in `other` whose value differs from ours or that we lack.
    pub fn diff<'a>(&self, other: &'a GenerationParameters) -> Vec<ParameterChange<'a>> {
        other
            .iter()
            .filter(|(name, value)| self.get(name) != Some(*value))
            .map(|(name, value)| ParameterChange {
                name,
                primary: self.get(name).cloned(),
                comparison: value,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterChange<'a> {
    pub name: &'a str,
    pub primary: Option<Value>,
    pub comparison: &'a Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Preset {
    Default,
    Creative,
    Precise,
    Fast,
    Balanced,
    Deterministic,
}

impl Preset {
    pub fn all() -> &'static [Preset] {
        &[
            Preset::Default,
            Preset::Creative,
            Preset::Precise,
            Preset::Fast,
            Preset::Balanced,
            Preset::Deterministic,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Preset::Default => "Default",
            Preset::Creative => "Creative",
            Preset::Precise => "Precise",
            Preset::Fast => "Fast",
            Preset::Balanced => "Balanced",
            Preset::Deterministic => "Deterministic",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|p| p.label().eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| LlamaTuneError::UnknownPreset(name.to_string()))
    }

    pub fn parameters(&self) -> GenerationParameters {
        // (temperature, top_p, num_predict, frequency_penalty, presence_penalty)
        let (temperature, top_p, num_predict, frequency, presence) = match self {
            Preset::Default => (0.7, 0.9, 2048, 0.0, 0.0),
            Preset::Creative => (1.0, 0.95, 4096, 0.0, 0.0),
            Preset::Precise => (0.3, 0.7, 2048, 0.5, 0.0),
            Preset::Fast => (0.7, 0.9, 1024, 0.0, 0.0),
            Preset::Balanced => (0.6, 0.85, 2048, 0.3, 0.3),
            Preset::Deterministic => (0.0, 0.5, 2048, 0.0, 0.0),
        };

        GenerationParameters::new()
            .with("temperature", temperature)
            .with("top_p", top_p)
            .with("num_predict", num_predict)
            .with("frequency_penalty", frequency)
            .with("presence_penalty", presence)
    }
}
