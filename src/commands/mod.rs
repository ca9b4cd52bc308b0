//! Task implementations for hostprep

pub mod install;
pub mod menu;
pub mod pending;

use std::fmt;

use crate::assets::AssetSource;
use crate::config::AnswersFile;
use crate::context::RunContext;
use crate::deploy::TargetFs;
use crate::error::Result;
use crate::runner::CommandRunner;

/// Something the operator can ask hostprep to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Core,
    Apps,
    Theme,
    Kernel,
}

impl Task {
    /// Every task, in the order "run all" performs them
    pub const ALL: [Task; 4] = [Task::Core, Task::Apps, Task::Theme, Task::Kernel];

    pub fn label(self) -> &'static str {
        match self {
            Task::Core => "Install Core",
            Task::Apps => "Install Apps",
            Task::Theme => "Install Theme",
            Task::Kernel => "Update Linux Kernel",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Everything resolved at startup that tasks run against
pub struct Session {
    pub ctx: RunContext,
    pub answers: AnswersFile,
    pub assets: Box<dyn AssetSource>,
    pub target: Box<dyn TargetFs>,
    pub runner: Box<dyn CommandRunner>,
}

impl Session {
    pub fn run_task(&self, task: Task) -> Result<()> {
        match task {
            Task::Core => install::run(self).map(|_| ()),
            other => pending::run(other),
        }
    }

    pub fn run_tasks(&self, tasks: &[Task]) -> Result<()> {
        for task in tasks {
            self.run_task(*task)?;
        }
        Ok(())
    }
}
