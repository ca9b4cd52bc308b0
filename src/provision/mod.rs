//! Core provisioning run
//!
//! A run moves forward through [`Phase`]s and never back:
//!
//! 1. every configuration decision is resolved ([`Provisioner::configure`])
//! 2. the progress total is sized from the step list plus the asset file count
//! 3. the steps run in order, the first one deploying the asset tree
//!
//! Failures after configuration do not stop the run unless the failing step is
//! marked fatal. They are logged and collected into a [`RunReport`].

pub mod decisions;
pub mod dns;
pub mod steps;

use console::Style;
use tracing::debug;

use crate::assets::AssetSource;
use crate::config::{AnswersFile, ConfigStore};
use crate::context::RunContext;
use crate::deploy::{DeployFailure, Deployer, TargetFs};
use crate::error::Result;
use crate::progress::ProgressTracker;
use crate::runner::CommandRunner;

pub use decisions::collect_decisions;
pub use steps::{Step, StepAction, StepEnv, core_steps};

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    CollectingConfig,
    Deploying,
    /// Running the fixed steps; holds the number of steps finished so far
    RunningFixedSteps(usize),
    Done,
}

/// A step that did not complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    pub id: &'static str,
    pub label: &'static str,
    pub reason: String,
}

/// Everything that went wrong during a run that still finished
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub steps_run: usize,
    pub files_written: usize,
    pub step_failures: Vec<StepFailure>,
    pub deploy_failures: Vec<DeployFailure>,
    /// Id of the fatal step that ended the run early
    pub aborted_at: Option<&'static str>,
}

impl RunReport {
    pub fn is_clean(&self) -> bool {
        self.step_failures.is_empty() && self.deploy_failures.is_empty()
    }

    pub fn warning_count(&self) -> usize {
        self.step_failures.len() + self.deploy_failures.len()
    }

    /// Print the outcome for the operator
    pub fn print(&self) {
        let heading = Style::new().bold();
        let warning = Style::new().yellow();

        if self.is_clean() {
            println!(
                "{} {} steps, {} files installed",
                Style::new().bold().green().apply_to("Done:"),
                self.steps_run,
                self.files_written
            );
            return;
        }

        println!(
            "{} {} steps, {} files installed, {} warnings",
            heading.apply_to("Finished with warnings:"),
            self.steps_run,
            self.files_written,
            self.warning_count()
        );
        for failure in &self.deploy_failures {
            println!("  {} {}: {}", warning.apply_to("file"), failure.path, failure.reason);
        }
        for failure in &self.step_failures {
            println!("  {} {}: {}", warning.apply_to("step"), failure.label, failure.reason);
        }
        if let Some(id) = self.aborted_at {
            println!("  {} stopped after fatal step '{id}'", warning.apply_to("run"));
        }
    }
}

/// Drives a core install on one host
pub struct Provisioner<'a> {
    ctx: &'a RunContext,
    assets: &'a dyn AssetSource,
    target: &'a dyn TargetFs,
    runner: &'a dyn CommandRunner,
    phase: Phase,
}

impl<'a> Provisioner<'a> {
    pub fn new(
        ctx: &'a RunContext,
        assets: &'a dyn AssetSource,
        target: &'a dyn TargetFs,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        Self {
            ctx,
            assets,
            target,
            runner,
            phase: Phase::CollectingConfig,
        }
    }

    #[cfg(test)]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn enter(&mut self, next: Phase) {
        debug_assert!(next >= self.phase, "phase moved back from {:?} to {next:?}", self.phase);
        debug!("phase: {next:?}");
        self.phase = next;
    }

    /// Resolve every decision and build the step list it implies
    ///
    /// The decision summary is printed before anything changes on the host.
    /// An interrupted prompt is returned before any step exists to run.
    pub fn configure(
        &mut self,
        store: &mut ConfigStore,
        answers: &AnswersFile,
    ) -> Result<Vec<Step>> {
        self.enter(Phase::CollectingConfig);
        collect_decisions(store, self.ctx, answers)?;
        print_summary(store);
        Ok(core_steps(self.ctx, store))
    }

    /// Size the tracker and run `steps` in order
    pub fn run_steps(
        &mut self,
        steps: &[Step],
        store: &ConfigStore,
        tracker: &mut ProgressTracker,
    ) -> RunReport {
        self.enter(Phase::Deploying);
        let deployer = Deployer::new(self.assets);
        tracker.set_size(steps.len() as u64);
        deployer.count_files(tracker);

        let env = StepEnv::new(self.ctx, store, self.runner, self.target);
        let mut report = RunReport::default();

        for step in steps {
            tracker.msg(step.label);
            let outcome = match step.action {
                StepAction::DeployAssets => {
                    let deployed = deployer.install(self.target, tracker);
                    report.files_written += deployed.written;
                    report.deploy_failures.extend(deployed.failures);
                    Ok(())
                }
                StepAction::Run(action) => action(&env),
            };
            tracker.step();
            report.steps_run += 1;
            self.enter(Phase::RunningFixedSteps(report.steps_run));

            if let Err(e) = outcome {
                debug!("step {} failed: {e}", step.id);
                tracker.println(&format!(
                    "{} {}: {e}",
                    Style::new().yellow().apply_to("warning:"),
                    step.label
                ));
                report.step_failures.push(StepFailure {
                    id: step.id,
                    label: step.label,
                    reason: e.to_string(),
                });

                if step.fatal {
                    report.aborted_at = Some(step.id);
                    break;
                }
            }
        }

        tracker.stop();
        self.enter(Phase::Done);
        report
    }
}

fn print_summary(store: &ConfigStore) {
    println!("{}", Style::new().bold().apply_to("Configuration:"));
    for line in store.summary() {
        println!("  {line}");
    }
}
