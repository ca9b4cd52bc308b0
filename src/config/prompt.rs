//! Operator prompts for configuration decisions

use inquire::{Confirm, InquireError, Text};
use tracing::debug;

use crate::error::Result;

/// Source of interactive answers
///
/// `Ok(None)` means no answer could be obtained (no terminal, or the operator
/// skipped the question with ESC); callers fall back to their default. An
/// interrupt (Ctrl-C) or a broken terminal is an error and aborts the run.
pub trait Prompter {
    fn confirm(&self, prompt: &str, default: bool) -> Result<Option<bool>>;

    fn text(&self, prompt: &str, default: &str) -> Result<Option<String>>;
}

/// Terminal prompts using inquire
#[derive(Debug, Default, Clone, Copy)]
pub struct InquirePrompter;

impl Prompter for InquirePrompter {
    fn confirm(&self, prompt: &str, default: bool) -> Result<Option<bool>> {
        skippable(Confirm::new(prompt).with_default(default).prompt_skippable())
    }

    fn text(&self, prompt: &str, default: &str) -> Result<Option<String>> {
        let mut question = Text::new(prompt);
        if !default.is_empty() {
            question = question.with_placeholder(default);
        }
        skippable(question.prompt_skippable())
    }
}

/// Map a prompt outcome to an answer, no answer, or an abort
fn skippable<T>(outcome: std::result::Result<Option<T>, InquireError>) -> Result<Option<T>> {
    match outcome {
        Ok(answer) => Ok(answer),
        Err(InquireError::NotTTY | InquireError::OperationCanceled) => {
            debug!("prompt unavailable, using default");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Prompter that never has an answer
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrompter;

impl Prompter for NoPrompter {
    fn confirm(&self, _prompt: &str, _default: bool) -> Result<Option<bool>> {
        Ok(None)
    }

    fn text(&self, _prompt: &str, _default: &str) -> Result<Option<String>> {
        Ok(None)
    }
}
