//! Package-manager operations for apt (optionally through nala) and dnf

use crate::context::{PackageManager, RunContext};
use crate::error::Result;
use crate::runner::{Attempts, CommandRunner, CommandSpec};

/// Package operations bound to a run's package manager
pub struct Packages<'a> {
    ctx: &'a RunContext,
    runner: &'a dyn CommandRunner,
}

impl<'a> Packages<'a> {
    pub fn new(ctx: &'a RunContext, runner: &'a dyn CommandRunner) -> Self {
        Self { ctx, runner }
    }

    /// Refresh and upgrade, optionally followed by a cleanup pass
    ///
    /// Every command is attempted; the first failure is returned at the end.
    pub fn update(&self, cleanup: bool) -> Result<()> {
        let mut commands = Vec::new();

        match self.ctx.package_manager {
            PackageManager::Apt => {
                commands.push(CommandSpec::new("apt", ["-y", "update"]));
                commands.push(CommandSpec::new("apt", ["-y", "upgrade"]));

                if cleanup {
                    commands.push(CommandSpec::new("dpkg", ["--configure", "-a"]));
                    commands.push(CommandSpec::new("apt", ["-y", "-f", "install"]));
                    commands.push(CommandSpec::new("apt", ["-y", "autoremove", "--purge"]));
                    commands.push(CommandSpec::new("apt", ["-y", "autoclean"]));
                    commands.push(CommandSpec::new("apt", ["-y", "clean"]));

                    if self.ctx.has_nala {
                        commands.push(CommandSpec::new("nala", ["update"]));
                        commands.push(CommandSpec::new("nala", ["upgrade", "-y"]));
                        commands.push(CommandSpec::new("nala", ["install", "-y"]));
                        commands.push(CommandSpec::new("nala", ["autoremove", "-y"]));
                        commands.push(CommandSpec::new("nala", ["clean"]));
                    }
                }
            }
            PackageManager::Dnf => {
                commands.push(CommandSpec::new("dnf", ["-y", "update"]));

                if cleanup {
                    commands.extend(self.dnf_cleanup_commands());
                }
            }
        }

        run_all(self.runner, &commands)
    }

    /// `dnf clean all`, `autoremove` and `distro-sync`
    pub fn dnf_cleanup(&self) -> Result<()> {
        run_all(self.runner, &self.dnf_cleanup_commands())
    }

    fn dnf_cleanup_commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("dnf", ["clean", "all"]),
            CommandSpec::new("dnf", ["-y", "autoremove"]),
            CommandSpec::new("dnf", ["-y", "distro-sync"]),
        ]
    }

    pub fn install(&self, packages: &[&str]) -> Result<()> {
        let cmd = self.package_command(
            &["install"],
            &["install", "-y"],
            &["-y", "install"],
            packages,
        );
        self.runner.check(&cmd).map(|_| ())
    }

    /// Remove whichever of `packages` are installed
    ///
    /// apt refuses to remove unknown packages, so absent ones are filtered out
    /// first. Nothing is run when none are installed.
    pub fn remove_installed(&self, packages: &[&str]) -> Result<()> {
        let present: Vec<&str> = packages
            .iter()
            .copied()
            .filter(|name| self.is_installed(&[*name]))
            .collect();

        if present.is_empty() {
            return Ok(());
        }
        self.remove(&present)
    }

    pub fn remove(&self, packages: &[&str]) -> Result<()> {
        let cmd = self.package_command(
            &["remove"],
            &["remove", "-y"],
            &["-y", "remove"],
            packages,
        );
        self.runner.check(&cmd).map(|_| ())
    }

    /// Whether every package in `packages` is installed
    pub fn is_installed(&self, packages: &[&str]) -> bool {
        packages.iter().all(|&name| {
            let cmd = match self.ctx.package_manager {
                PackageManager::Apt => {
                    CommandSpec::new("dpkg-query", ["-W", "--showformat=${Status}", name])
                }
                PackageManager::Dnf => CommandSpec::new("rpm", ["-q", name]),
            };

            match self.runner.run(&cmd) {
                Ok(output) if output.success => match self.ctx.package_manager {
                    PackageManager::Apt => output.stdout.contains("install ok installed"),
                    PackageManager::Dnf => !output.stdout.trim().is_empty(),
                },
                _ => false,
            }
        })
    }

    fn package_command(
        &self,
        apt_args: &[&str],
        nala_args: &[&str],
        dnf_args: &[&str],
        packages: &[&str],
    ) -> CommandSpec {
        let (program, verb): (&str, Vec<&str>) = match self.ctx.package_manager {
            PackageManager::Apt if self.ctx.has_nala => ("nala", nala_args.to_vec()),
            PackageManager::Apt => ("apt", [&["-y"][..], apt_args].concat()),
            PackageManager::Dnf => ("dnf", dnf_args.to_vec()),
        };

        CommandSpec::new(program, verb.into_iter().chain(packages.iter().copied()))
    }
}

/// Run every command, returning the first failure after all have been tried
pub fn run_all(runner: &dyn CommandRunner, commands: &[CommandSpec]) -> Result<()> {
    let mut attempts = Attempts::new();
    for cmd in commands {
        attempts.check(runner, cmd);
    }
    attempts.finish()
}
