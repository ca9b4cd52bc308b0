//! Tasks that are listed but do nothing yet

use console::Style;

use super::Task;
use crate::error::Result;

pub fn run(task: Task) -> Result<()> {
    println!();
    println!(
        "{}: not available yet",
        Style::new().yellow().apply_to(task.label())
    );
    Ok(())
}
