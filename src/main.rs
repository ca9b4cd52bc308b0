//! hostprep - Linux host provisioner
//!
//! Prepares a fresh apt or dnf based host in one pass: configuration questions
//! first, then a bundled file tree and a fixed sequence of package and service
//! operations.

use clap::Parser;
use console::Style;
use tracing_subscriber::EnvFilter;

mod assets;
mod cli;
mod commands;
mod config;
mod context;
mod deploy;
mod error;
mod packages;
mod patch;
mod progress;
mod provision;
mod runner;

#[cfg(test)]
mod test_fixtures;

use assets::{AssetSource, DirAssets};
use cli::Cli;
use commands::Session;
use config::AnswersFile;
use context::{RunContext, SystemProbe};
use deploy::{DryRunFs, LiveFs, TargetFs};
use error::{EXIT_OK, Result};
use runner::{CommandRunner, DryRunRunner, SystemRunner};

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("hostprep=debug,warn")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_banner() {
    println!(
        "{} {}",
        Style::new().bold().green().apply_to("hostprep"),
        env!("CARGO_PKG_VERSION")
    );
}

/// Wire up the collaborators a run needs
fn build_session(cli: &Cli, ctx: RunContext) -> Result<Session> {
    let answers = match &cli.answers {
        Some(path) => AnswersFile::load(path)?,
        None => AnswersFile::default(),
    };

    let assets: Box<dyn AssetSource> = match &cli.assets {
        Some(dir) => Box::new(DirAssets::new(dir)),
        None => Box::new(assets::embedded()),
    };

    let (target, runner): (Box<dyn TargetFs>, Box<dyn CommandRunner>) = if ctx.dry_run {
        (Box::new(DryRunFs::new(&ctx.root)), Box::new(DryRunRunner))
    } else {
        (Box::new(LiveFs::new(&ctx.root)), Box::new(SystemRunner))
    };

    Ok(Session {
        ctx,
        answers,
        assets,
        target,
        runner,
    })
}

fn run(cli: &Cli) -> Result<()> {
    let ctx = RunContext::detect(&cli.run_options(), &SystemProbe)?;
    let session = build_session(cli, ctx)?;

    let tasks = cli.tasks();
    if tasks.is_empty() {
        commands::menu::run(&session)
    } else {
        session.run_tasks(&tasks)
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    print_banner();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
    std::process::exit(EXIT_OK);
}
