//! Run context: facts about the host and the invocation, resolved once
//!
//! Everything that used to be process-wide state (package manager, remote
//! session, assume-yes) lives in an immutable [`RunContext`] that is passed by
//! reference to every component.

use std::path::PathBuf;

use clap::ValueEnum;
use tracing::debug;

use crate::error::{HostprepError, Result};

/// Supported package managers
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PackageManager {
    Apt,
    Dnf,
}

impl PackageManager {
    pub fn as_str(self) -> &'static str {
        match self {
            PackageManager::Apt => "apt",
            PackageManager::Dnf => "dnf",
        }
    }
}

/// What the operator asked for, before looking at the host
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub assume_yes: bool,
    pub dry_run: bool,
    pub root: PathBuf,
    pub package_manager: Option<PackageManager>,
}

/// Host facts consulted while building a [`RunContext`]
pub trait HostProbe {
    /// Whether `program` is on the PATH
    fn has_program(&self, program: &str) -> bool;

    fn env_var(&self, key: &str) -> Option<String>;

    fn is_root(&self) -> bool;
}

/// Probes the machine this process runs on
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

impl HostProbe for SystemProbe {
    fn has_program(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }

    fn env_var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn is_root(&self) -> bool {
        match std::fs::read_to_string("/proc/self/status") {
            Ok(status) => effective_uid(&status) == Some(0),
            Err(e) => {
                debug!("cannot read process status, assuming unprivileged: {e}");
                false
            }
        }
    }
}

/// Effective uid from the `Uid:` line of `/proc/<pid>/status`
///
/// The line lists the real, effective, saved and filesystem uids in that order.
fn effective_uid(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("Uid:"))
        .and_then(|ids| ids.split_whitespace().nth(1))
        .and_then(|euid| euid.parse().ok())
}

/// Immutable facts shared by every part of a provisioning run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub package_manager: PackageManager,
    /// `nala` is layered over apt and used for installs when present
    pub has_nala: bool,
    /// Running over SSH; SSH is then never offered for disabling
    pub remote_session: bool,
    pub assume_yes: bool,
    pub dry_run: bool,
    /// Destination root for deployed files and patched config files
    pub root: PathBuf,
}

impl RunContext {
    /// Resolve the context and check the preconditions
    ///
    /// Fails with [`HostprepError::UnsupportedDistribution`] when neither apt
    /// nor dnf is available, then with [`HostprepError::InsufficientPrivilege`]
    /// when not root. Dry runs skip the privilege check.
    pub fn detect(options: &RunOptions, probe: &dyn HostProbe) -> Result<Self> {
        let package_manager = match options.package_manager {
            Some(pm) => pm,
            None => detect_package_manager(probe).ok_or(HostprepError::UnsupportedDistribution)?,
        };

        if !options.dry_run && !probe.is_root() {
            return Err(HostprepError::InsufficientPrivilege);
        }

        let has_nala = package_manager == PackageManager::Apt && probe.has_program("nala");
        let remote_session = is_remote_session(probe);
        debug!(
            "package manager: {}, nala: {has_nala}, remote session: {remote_session}",
            package_manager.as_str()
        );

        Ok(Self {
            package_manager,
            has_nala,
            remote_session,
            assume_yes: options.assume_yes,
            dry_run: options.dry_run,
            root: if options.root.as_os_str().is_empty() {
                PathBuf::from("/")
            } else {
                options.root.clone()
            },
        })
    }

    pub fn is_dnf(&self) -> bool {
        self.package_manager == PackageManager::Dnf
    }

    pub fn is_apt(&self) -> bool {
        self.package_manager == PackageManager::Apt
    }
}

/// apt wins when both package managers are present
pub fn detect_package_manager(probe: &dyn HostProbe) -> Option<PackageManager> {
    if probe.has_program("apt") {
        Some(PackageManager::Apt)
    } else if probe.has_program("dnf") {
        Some(PackageManager::Dnf)
    } else {
        None
    }
}

fn is_remote_session(probe: &dyn HostProbe) -> bool {
    ["SSH_CLIENT", "SSH_TTY"]
        .iter()
        .any(|key| probe.env_var(key).is_some_and(|v| !v.is_empty()))
}
