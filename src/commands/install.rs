//! Core install: configuration, asset deployment and the fixed steps

use console::Style;

use super::Session;
use crate::config::{AnswerMode, ConfigStore, InquirePrompter};
use crate::error::Result;
use crate::progress::ProgressTracker;
use crate::provision::{Provisioner, RunReport};

/// Run a core install and print its report
///
/// Step failures end up in the report; the run itself only fails before
/// provisioning starts, when a precondition fails or a question is interrupted.
pub fn run(session: &Session) -> Result<RunReport> {
    let ctx = &session.ctx;
    let mut store = if ctx.assume_yes {
        ConfigStore::assume_yes()
    } else {
        ConfigStore::new(AnswerMode::Interactive, Box::new(InquirePrompter))
    };

    let mut provisioner = Provisioner::new(
        ctx,
        session.assets.as_ref(),
        session.target.as_ref(),
        session.runner.as_ref(),
    );
    let steps = provisioner.configure(&mut store, &session.answers)?;

    println!();
    println!("{}", Style::new().bold().apply_to("Installing Core..."));

    // dry runs print every command, which would tear a visible bar
    let mut tracker = if ctx.dry_run {
        ProgressTracker::hidden()
    } else {
        ProgressTracker::new("Installing")
    };
    let report = provisioner.run_steps(&steps, &store, &mut tracker);

    report.print();
    Ok(report)
}
