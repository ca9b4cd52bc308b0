//! Interactive task menu, shown when no task flag is given

use std::fmt;

use inquire::Select;
use tracing::debug;

use super::{Session, Task};
use crate::error::Result;

/// One entry of the menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Exit,
    Run(Task),
    RunAll,
}

impl MenuChoice {
    pub const ALL: [MenuChoice; 6] = [
        MenuChoice::Exit,
        MenuChoice::Run(Task::Core),
        MenuChoice::Run(Task::Apps),
        MenuChoice::Run(Task::Theme),
        MenuChoice::Run(Task::Kernel),
        MenuChoice::RunAll,
    ];
}

impl fmt::Display for MenuChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MenuChoice::Exit => f.write_str("Exit"),
            MenuChoice::Run(task) => f.write_str(task.label()),
            MenuChoice::RunAll => f.write_str("Run All"),
        }
    }
}

/// Ask what to do next; anything but a selection means exit
fn choose() -> MenuChoice {
    match Select::new("What would you like to do?", MenuChoice::ALL.to_vec())
        .with_starting_cursor(0)
        .without_filtering()
        .with_help_message("↑↓ to move, ENTER to select, ESC to exit")
        .prompt_skippable()
    {
        Ok(Some(choice)) => choice,
        Ok(None) => MenuChoice::Exit,
        Err(e) => {
            debug!("menu unavailable: {e}");
            MenuChoice::Exit
        }
    }
}

/// Show the menu until the operator exits
pub fn run(session: &Session) -> Result<()> {
    run_with(session, choose)
}

fn run_with(session: &Session, mut next: impl FnMut() -> MenuChoice) -> Result<()> {
    loop {
        match next() {
            MenuChoice::Exit => {
                println!("Exiting...");
                return Ok(());
            }
            MenuChoice::Run(task) => session.run_task(task)?,
            MenuChoice::RunAll => session.run_tasks(&Task::ALL)?,
        }
    }
}
