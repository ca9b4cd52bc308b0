//! Configuration answers for a provisioning run
//!
//! This module contains:
//! - [`ConfigStore`] - the decisions collected at the start of a run
//! - [`prompt`] - how interactive answers are obtained
//! - [`answers`] - `--answers` YAML files that preseed suggested defaults
//!
//! A store is populated in one linear pass before anything is installed and
//! only read afterwards.

pub mod answers;
pub mod prompt;

use std::fmt;

use indexmap::IndexMap;

use crate::error::Result;

pub use answers::AnswersFile;
pub use prompt::{InquirePrompter, NoPrompter, Prompter};

/// A single resolved decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    Bool(bool),
    Text(String),
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(true) => f.write_str("true"),
            ConfigValue::Bool(false) => f.write_str("false"),
            ConfigValue::Text(text) => f.write_str(text),
        }
    }
}

/// How `add_*` calls obtain their answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerMode {
    /// Ask the operator, suggesting the default
    Interactive,
    /// Take every default without asking (`--assume-yes`)
    AssumeYes,
}

/// Ordered mapping from option key to resolved value
pub struct ConfigStore {
    values: IndexMap<String, ConfigValue>,
    mode: AnswerMode,
    prompter: Box<dyn Prompter>,
}

impl ConfigStore {
    /// Create an empty store answering through `prompter` in interactive mode
    pub fn new(mode: AnswerMode, prompter: Box<dyn Prompter>) -> Self {
        Self {
            values: IndexMap::new(),
            mode,
            prompter,
        }
    }

    /// Create an empty store that never prompts
    pub fn assume_yes() -> Self {
        Self::new(AnswerMode::AssumeYes, Box::new(NoPrompter))
    }

    /// Ask a yes/no question and store the answer under `key`
    ///
    /// Calling this twice for the same key asks again and overwrites.
    /// A missing answer (no terminal, skipped prompt) resolves to `default`;
    /// an interrupted prompt is returned as an error and nothing is stored.
    pub fn add_bool(&mut self, key: &str, prompt: &str, default: bool) -> Result<bool> {
        let answer = match self.mode {
            AnswerMode::AssumeYes => default,
            AnswerMode::Interactive => self.prompter.confirm(prompt, default)?.unwrap_or(default),
        };
        self.set_bool(key, answer);
        Ok(answer)
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.values.insert(key.to_string(), ConfigValue::Bool(value));
    }

    /// True only if `key` was set to true
    pub fn bool(&self, key: &str) -> bool {
        matches!(self.values.get(key), Some(ConfigValue::Bool(true)))
    }

    /// Ask for free text and store it under `key`
    ///
    /// Empty input falls back to `default`, which is then what gets stored.
    pub fn add_value(&mut self, key: &str, prompt: &str, default: &str) -> Result<String> {
        let answer = match self.mode {
            AnswerMode::AssumeYes => default.to_string(),
            AnswerMode::Interactive => self
                .prompter
                .text(prompt, default)?
                .filter(|text| !text.trim().is_empty())
                .unwrap_or_else(|| default.to_string()),
        };
        self.set_value(key, &answer);
        Ok(answer)
    }

    pub fn set_value(&mut self, key: &str, value: &str) {
        self.values
            .insert(key.to_string(), ConfigValue::Text(value.to_string()));
    }

    /// Text stored under `key`, or an empty string if unset
    ///
    /// Boolean entries render as their canonical `"true"`/`"false"` encoding.
    pub fn value(&self, key: &str) -> String {
        self.values
            .get(key)
            .map(ToString::to_string)
            .unwrap_or_default()
    }

    /// Resolved decisions in the order they were made
    pub fn entries(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// One `key: value` line per resolved decision, in the order made
    pub fn summary(&self) -> Vec<String> {
        self.entries()
            .map(|(key, value)| format!("{key}: {value}"))
            .collect()
    }
}

impl fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigStore")
            .field("values", &self.values)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}
