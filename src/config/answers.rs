//! Preseeded answers loaded from `--answers <FILE>`
//!
//! The file is a flat YAML mapping:
//!
//! ```yaml
//! ufw: true
//! cloudflareDNS: false
//! ```
//!
//! A preseeded answer replaces the built-in default of a decision. It is still
//! only a suggestion in interactive mode; with `--assume-yes` it is applied as is.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::error::{HostprepError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum AnswerValue {
    Bool(bool),
    Text(String),
}

/// Answers keyed by decision key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswersFile {
    answers: BTreeMap<String, AnswerValue>,
}

impl AnswersFile {
    /// Load answers from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| HostprepError::FileReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Self::from_yaml(&content).map_err(|reason| HostprepError::AnswersParseFailed {
            path: path.display().to_string(),
            reason,
        })
    }

    pub(crate) fn from_yaml(content: &str) -> std::result::Result<Self, String> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let answers: BTreeMap<String, AnswerValue> =
            serde_yaml::from_str(content).map_err(|e| e.to_string())?;
        Ok(Self { answers })
    }

    /// Suggested default for a yes/no decision
    pub fn bool_default(&self, key: &str, fallback: bool) -> bool {
        match self.answers.get(key) {
            Some(AnswerValue::Bool(value)) => *value,
            Some(AnswerValue::Text(text)) => {
                warn!("answer for '{key}' is not a boolean ({text:?}), using {fallback}");
                fallback
            }
            None => fallback,
        }
    }

    /// Suggested default for a free-text decision
    pub fn text_default(&self, key: &str, fallback: &str) -> String {
        match self.answers.get(key) {
            Some(AnswerValue::Text(text)) => text.clone(),
            Some(AnswerValue::Bool(value)) => value.to_string(),
            None => fallback.to_string(),
        }
    }
}
