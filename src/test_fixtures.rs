//! Test doubles shared by unit tests across modules.
//!
//! ```ignore
//! use crate::test_fixtures::{RecordingRunner, test_context};
//!
//! let runner = RecordingRunner::failing(&["ping"]);
//! let ctx = test_context(PackageManager::Dnf, root);
//! ```

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::rc::Rc;

use inquire::InquireError;

use crate::config::Prompter;
use crate::context::{HostProbe, PackageManager, RunContext};
use crate::error::Result;
use crate::runner::{CommandOutput, CommandRunner, CommandSpec};

/// Host probe with a fixed set of programs and environment
#[derive(Debug, Clone)]
pub struct FakeProbe {
    pub programs: HashSet<String>,
    pub env: HashMap<String, String>,
    pub root: bool,
}

impl FakeProbe {
    pub fn with_programs(programs: &[&str]) -> Self {
        Self {
            programs: programs.iter().map(ToString::to_string).collect(),
            env: HashMap::new(),
            root: true,
        }
    }
}

impl HostProbe for FakeProbe {
    fn has_program(&self, program: &str) -> bool {
        self.programs.contains(program)
    }

    fn env_var(&self, key: &str) -> Option<String> {
        self.env.get(key).cloned()
    }

    fn is_root(&self) -> bool {
        self.root
    }
}

/// Runner that records commands instead of running them
///
/// Programs listed as failing always exit non-zero. Queued outputs for a
/// program are returned in order; once drained, commands succeed.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    commands: RefCell<Vec<CommandSpec>>,
    failing: HashSet<String>,
    queued: RefCell<HashMap<String, VecDeque<CommandOutput>>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(programs: &[&str]) -> Self {
        Self {
            failing: programs.iter().map(ToString::to_string).collect(),
            ..Self::default()
        }
    }

    /// Queue the outputs the next runs of `program` return
    pub fn queue(&self, program: &str, outputs: Vec<CommandOutput>) {
        self.queued
            .borrow_mut()
            .entry(program.to_string())
            .or_default()
            .extend(outputs);
    }

    /// Every command run so far, rendered as a command line
    pub fn lines(&self) -> Vec<String> {
        self.commands.borrow().iter().map(ToString::to_string).collect()
    }

    /// Whether any command line starts with `prefix`
    pub fn ran(&self, prefix: &str) -> bool {
        self.lines().iter().any(|line| line.starts_with(prefix))
    }

    /// Index of the first command line starting with `prefix`
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.lines().iter().position(|line| line.starts_with(prefix))
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, cmd: &CommandSpec) -> Result<CommandOutput> {
        self.commands.borrow_mut().push(cmd.clone());

        if let Some(output) = self
            .queued
            .borrow_mut()
            .get_mut(&cmd.program)
            .and_then(VecDeque::pop_front)
        {
            return Ok(output);
        }

        if self.failing.contains(&cmd.program) {
            Ok(CommandOutput::failed("exit status: 1"))
        } else {
            Ok(CommandOutput::ok("ok\n"))
        }
    }
}

/// Prompter that replays scripted answers and records every prompt shown
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrompter {
    pub confirms: Rc<RefCell<VecDeque<Option<bool>>>>,
    pub texts: Rc<RefCell<VecDeque<Option<String>>>>,
    pub asked: Rc<RefCell<Vec<String>>>,
    /// Index of the prompt answered with Ctrl-C, counting from zero
    pub interrupt_at: Option<usize>,
}

impl ScriptedPrompter {
    pub fn with_confirms(answers: &[Option<bool>]) -> Self {
        let prompter = Self::default();
        prompter.confirms.borrow_mut().extend(answers.iter().copied());
        prompter
    }

    pub fn with_texts(answers: &[Option<&str>]) -> Self {
        let prompter = Self::default();
        prompter
            .texts
            .borrow_mut()
            .extend(answers.iter().map(|a| a.map(str::to_string)));
        prompter
    }

    pub fn interrupting_at(mut self, index: usize) -> Self {
        self.interrupt_at = Some(index);
        self
    }

    fn ask(&self, prompt: &str) -> Result<()> {
        let mut asked = self.asked.borrow_mut();
        let index = asked.len();
        asked.push(prompt.to_string());
        if self.interrupt_at == Some(index) {
            return Err(InquireError::OperationInterrupted.into());
        }
        Ok(())
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, prompt: &str, _default: bool) -> Result<Option<bool>> {
        self.ask(prompt)?;
        Ok(self.confirms.borrow_mut().pop_front().flatten())
    }

    fn text(&self, prompt: &str, _default: &str) -> Result<Option<String>> {
        self.ask(prompt)?;
        Ok(self.texts.borrow_mut().pop_front().flatten())
    }
}

/// Context for a local, non-dry run rooted at `root`
pub fn test_context(package_manager: PackageManager, root: &Path) -> RunContext {
    RunContext {
        package_manager,
        has_nala: false,
        remote_session: false,
        assume_yes: true,
        dry_run: false,
        root: root.to_path_buf(),
    }
}
