//! Error types and handling for hostprep
//!
//! Uses `thiserror` for error definitions and `miette` for pretty diagnostics.
//!
//! Only the two precondition failures stop a run. Everything that goes wrong
//! after provisioning has started is downgraded to a warning by the caller and
//! collected into a [`crate::provision::RunReport`].

use miette::Diagnostic;
use thiserror::Error;

/// Process exit code for a successful run
pub const EXIT_OK: i32 = 0;
/// Process exit code when no supported package manager was found
pub const EXIT_UNSUPPORTED: i32 = 1;
/// Process exit code when not running as root
pub const EXIT_PRIVILEGE: i32 = 2;

/// Main error type for hostprep operations
#[derive(Error, Diagnostic, Debug)]
pub enum HostprepError {
    // Precondition errors
    #[error("Unsupported Linux distribution: neither apt nor dnf was found")]
    #[diagnostic(
        code(hostprep::precondition::unsupported_distribution),
        help("hostprep supports Debian-family (apt) and Fedora-family (dnf) hosts")
    )]
    UnsupportedDistribution,

    #[error("This program must be run as root")]
    #[diagnostic(
        code(hostprep::precondition::insufficient_privilege),
        help("Re-run with sudo, or pass --dry-run to preview the changes")
    )]
    InsufficientPrivilege,

    // External command errors
    #[error("Failed to start '{program}': {reason}")]
    #[diagnostic(code(hostprep::command::spawn_failed))]
    CommandSpawnFailed { program: String, reason: String },

    #[error("Command '{command}' exited with {status}")]
    #[diagnostic(code(hostprep::command::failed))]
    CommandFailed { command: String, status: String },

    // File system errors
    #[error("Failed to read file: {path}: {reason}")]
    #[diagnostic(code(hostprep::fs::read_failed))]
    FileReadFailed { path: String, reason: String },

    #[error("Failed to write file: {path}: {reason}")]
    #[diagnostic(code(hostprep::fs::write_failed))]
    FileWriteFailed { path: String, reason: String },

    #[error("Invalid line pattern '{pattern}': {reason}")]
    #[diagnostic(code(hostprep::patch::invalid_pattern))]
    InvalidPattern { pattern: String, reason: String },

    // Configuration errors
    #[error("Failed to parse answers file: {path}")]
    #[diagnostic(
        code(hostprep::config::answers_parse_failed),
        help("The answers file is a flat YAML mapping, e.g. `cloudflareDNS: false`")
    )]
    AnswersParseFailed { path: String, reason: String },

    #[error("Prompt failed: {message}")]
    #[diagnostic(
        code(hostprep::config::prompt_failed),
        help("Configuration is collected before any change, so the host was left as it was")
    )]
    PromptFailed { message: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(hostprep::fs::io_error))]
    IoError { message: String },
}

impl HostprepError {
    /// Exit code the process should terminate with for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            HostprepError::InsufficientPrivilege => EXIT_PRIVILEGE,
            _ => EXIT_UNSUPPORTED,
        }
    }
}

impl From<std::io::Error> for HostprepError {
    fn from(err: std::io::Error) -> Self {
        HostprepError::IoError {
            message: err.to_string(),
        }
    }
}

impl From<inquire::InquireError> for HostprepError {
    fn from(err: inquire::InquireError) -> Self {
        HostprepError::PromptFailed {
            message: err.to_string(),
        }
    }
}

/// Result type alias using miette for error handling
pub type Result<T> = miette::Result<T, HostprepError>;
