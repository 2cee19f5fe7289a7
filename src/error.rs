//! Error kinds for a packaging run.
//!
//! Every failure is fatal to the run. The binary translates an [`Error`] into
//! a single `ERROR:` line and a non-zero exit status.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for packaging operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can end a packaging run.
#[derive(Error, Debug)]
pub enum Error {
    /// The run needs root to set ownership on the staging tree.
    #[error("insufficient privilege: running as '{user}', please run p3build as root using sudo")]
    InsufficientPrivilege {
        /// Name (or uid) of the effective user.
        user: String,
    },

    /// The configured owner account does not exist on this host.
    #[error("unknown system account '{name}'")]
    UnknownAccount {
        /// Account name from the configuration.
        name: String,
    },

    /// A required input directory is absent or empty.
    #[error("{}: {reason}", path.display())]
    MissingRequiredInput {
        /// Directory that was expected.
        path: PathBuf,
        /// What is wrong with it.
        reason: String,
    },

    /// The control manifest file was not found.
    #[error("{} required file not found", path.display())]
    MissingManifest {
        /// Where the manifest was expected.
        path: PathBuf,
    },

    /// The control manifest lacks a required field.
    #[error("{} has no '{field}:' entry", path.display())]
    InvalidManifest {
        /// Manifest that was parsed.
        path: PathBuf,
        /// The missing key, `Package` or `Version`.
        field: &'static str,
    },

    /// A filesystem operation failed while building or cleaning the tree.
    #[error("failed to {action} '{}': {source}", path.display())]
    StagingIo {
        /// Short description of the operation, e.g. "copy".
        action: &'static str,
        /// Path the operation was applied to.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// An external tool exited unsuccessfully.
    #[error("{tool} failed with {}{}", exit_label(*exit_code), stderr_suffix(stderr))]
    ExternalTool {
        /// Program name.
        tool: String,
        /// Exit status, `None` when killed by a signal.
        exit_code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },

    /// An external tool could not be started at all.
    #[error("failed to run {tool}: {source}")]
    Spawn {
        /// Program name.
        tool: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Host tools needed for the build are not on `PATH`.
    #[error("missing required host tools: {}", tools.join(", "))]
    MissingTools {
        /// Each entry reads `<tool> (install: <package>)`.
        tools: Vec<String>,
    },

    /// The interpreter did not report a usable install directory.
    #[error("could not determine install directory from {interpreter}: got '{output}'")]
    InstallDir {
        /// Interpreter that was queried.
        interpreter: String,
        /// What it printed.
        output: String,
    },

    /// The package builder reported success but produced no artifact.
    #[error("package builder finished but {} is missing", path.display())]
    MissingArtifact {
        /// Expected artifact path.
        path: PathBuf,
    },

    /// The configuration file could not be read or parsed.
    #[error("invalid configuration '{}': {message}", path.display())]
    Config {
        /// Configuration file path.
        path: PathBuf,
        /// Parser or validation message.
        message: String,
    },
}

impl Error {
    /// Wrap an I/O error raised while touching `path`.
    pub fn staging(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::StagingIo {
            action,
            path: path.into(),
            source,
        }
    }
}

fn exit_label(exit_code: Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("exit status {code}"),
        None => "termination by signal".to_string(),
    }
}

/// Captured stderr folded onto the error's single line.
fn stderr_suffix(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        String::new()
    } else {
        format!(": {}", lines.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_tool_message_includes_stderr() {
        let err = Error::ExternalTool {
            tool: "dpkg-deb".into(),
            exit_code: Some(2),
            stderr: "  bad control file\n".into(),
        };
        assert_eq!(
            err.to_string(),
            "dpkg-deb failed with exit status 2: bad control file"
        );
    }

    #[test]
    fn test_external_tool_multiline_stderr_stays_on_one_line() {
        let err = Error::ExternalTool {
            tool: "dpkg-deb".into(),
            exit_code: Some(2),
            stderr: "dpkg-deb: error: parsing file\n\n  missing Maintainer\n".into(),
        };
        assert_eq!(
            err.to_string(),
            "dpkg-deb failed with exit status 2: dpkg-deb: error: parsing file; missing Maintainer"
        );
    }

    #[test]
    fn test_external_tool_message_for_signal() {
        let err = Error::ExternalTool {
            tool: "alien".into(),
            exit_code: None,
            stderr: String::new(),
        };
        assert_eq!(err.to_string(), "alien failed with termination by signal");
    }

    #[test]
    fn test_manifest_messages() {
        let err = Error::InvalidManifest {
            path: PathBuf::from("debian/control"),
            field: "Version",
        };
        assert_eq!(err.to_string(), "debian/control has no 'Version:' entry");

        let err = Error::MissingManifest {
            path: PathBuf::from("debian/control"),
        };
        assert_eq!(err.to_string(), "debian/control required file not found");
    }
}
