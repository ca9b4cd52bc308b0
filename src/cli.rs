//! CLI definitions using clap derive API

use clap::Parser;
use clap::builder::{Styles, styling::AnsiColor};
use std::path::PathBuf;

use crate::commands::Task;
use crate::context::{PackageManager, RunOptions};

/// hostprep - Linux host provisioner
///
/// Prepares a fresh apt or dnf based host: security tooling, DNS hardening,
/// language toolchains and a bundled set of configuration files.
#[derive(Parser, Debug)]
#[command(
    name = "hostprep",
    author,
    version,
    color = clap::ColorChoice::Auto,
    styles = Styles::styled()
        .header(AnsiColor::Green.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default().bold())
        .placeholder(AnsiColor::Cyan.on_default()),
    about = "Provision a fresh Linux host",
    long_about = "hostprep provisions a fresh Debian-family (apt) or Fedora-family (dnf) host. \
                  It asks a few questions up front, then installs packages, hardens services \
                  and DNS, and deploys a bundled tree of configuration files. \
                  Without a task flag an interactive menu is shown.",
    after_help = "\x1b[1m\x1b[32mExamples:\x1b[0m\n    \
                  sudo hostprep\n    \
                  sudo hostprep --core\n    \
                  sudo hostprep --core -y --answers answers.yaml\n    \
                  hostprep --core -y --dry-run --package-manager dnf"
)]
pub struct Cli {
    /// Take every default without asking
    #[arg(long, short = 'y')]
    pub assume_yes: bool,

    /// Install the core system setup
    #[arg(long, short = 'c')]
    pub core: bool,

    /// Install applications
    #[arg(long, short = 'a')]
    pub apps: bool,

    /// Install the desktop theme
    #[arg(long, short = 't')]
    pub theme: bool,

    /// Update the Linux kernel
    #[arg(long, short = 'k', visible_alias = "kernel")]
    pub update_kernel: bool,

    /// Run every task
    #[arg(long, short = 'i', visible_alias = "install")]
    pub all: bool,

    /// Print commands and file writes instead of performing them
    #[arg(long)]
    pub dry_run: bool,

    /// Root directory files are deployed and patched under
    #[arg(long, env = "HOSTPREP_ROOT", value_name = "DIR", default_value = "/")]
    pub root: PathBuf,

    /// Use this package manager instead of detecting one
    #[arg(long, env = "HOSTPREP_PACKAGE_MANAGER", value_enum)]
    pub package_manager: Option<PackageManager>,

    /// YAML file with preseeded answers to the configuration questions
    #[arg(long, env = "HOSTPREP_ANSWERS", value_name = "FILE")]
    pub answers: Option<PathBuf>,

    /// Deploy files from this directory instead of the bundled ones
    #[arg(long, value_name = "DIR")]
    pub assets: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl Cli {
    /// Tasks selected by flags, in the order they run
    ///
    /// Empty when the menu should be shown.
    pub fn tasks(&self) -> Vec<Task> {
        if self.all {
            return Task::ALL.to_vec();
        }

        [
            (self.core, Task::Core),
            (self.apps, Task::Apps),
            (self.theme, Task::Theme),
            (self.update_kernel, Task::Kernel),
        ]
        .into_iter()
        .filter_map(|(selected, task)| selected.then_some(task))
        .collect()
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            assume_yes: self.assume_yes,
            dry_run: self.dry_run,
            root: self.root.clone(),
            package_manager: self.package_manager,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing_no_flags_shows_menu() {
        let cli = Cli::try_parse_from(["hostprep"]).unwrap();
        assert!(cli.tasks().is_empty());
        assert!(!cli.assume_yes);
        assert_eq!(cli.root, PathBuf::from("/"));
    }

    #[test]
    fn test_cli_parsing_short_flags() {
        let cli = Cli::try_parse_from(["hostprep", "-y", "-c", "-k"]).unwrap();
        assert!(cli.assume_yes);
        assert_eq!(cli.tasks(), [Task::Core, Task::Kernel]);
    }

    #[test]
    fn test_cli_parsing_aliases() {
        let cli = Cli::try_parse_from(["hostprep", "--kernel"]).unwrap();
        assert_eq!(cli.tasks(), [Task::Kernel]);

        let cli = Cli::try_parse_from(["hostprep", "--install"]).unwrap();
        assert_eq!(cli.tasks(), Task::ALL);

        let cli = Cli::try_parse_from(["hostprep", "-i", "--apps"]).unwrap();
        assert_eq!(cli.tasks(), Task::ALL);
    }

    #[test]
    fn test_cli_parsing_run_options() {
        let cli = Cli::try_parse_from([
            "hostprep",
            "--core",
            "--dry-run",
            "--root",
            "/mnt/target",
            "--package-manager",
            "dnf",
        ])
        .unwrap();
        let options = cli.run_options();
        assert!(options.dry_run);
        assert_eq!(options.root, PathBuf::from("/mnt/target"));
        assert_eq!(options.package_manager, Some(PackageManager::Dnf));
    }

    #[test]
    fn test_cli_rejects_unknown_package_manager() {
        assert!(Cli::try_parse_from(["hostprep", "--package-manager", "pacman"]).is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
