//! External command invocation.
//!
//! Commands are built as an argument vector and never passed through a shell.
//! A [`ToolRunner`] executes them; [`SystemRunner`] is the real one, tests
//! substitute their own.
//!
//! ```rust,ignore
//! use p3build::process::{Cmd, SystemRunner};
//!
//! Cmd::new("dpkg-deb")
//!     .args(["-Zgzip", "-b"])
//!     .arg_path(build_dir)
//!     .arg_path(&deb)
//!     .run_on(&SystemRunner)?;
//! ```

use crate::error::{Error, Result};
use log::{debug, info};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

/// A command line to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmd {
    program: String,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
}

/// Outcome of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CmdResult {
    /// Exit status, `None` when terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CmdResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn arg_path(self, path: &Path) -> Self {
        self.arg(path.as_os_str())
    }

    /// Run the command from `dir` instead of the process working directory.
    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.current_dir = Some(dir.to_path_buf());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    pub fn get_current_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    /// Printable form of the command line, for logging only.
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }

    /// Run with `runner`, failing on a non-zero exit status.
    pub fn run_on(&self, runner: &dyn ToolRunner) -> Result<CmdResult> {
        info!("Running: {}", self.display());
        let result = runner.execute(self)?;

        if !result.stdout.trim().is_empty() {
            debug!("{} stdout: {}", self.program, result.stdout.trim());
        }
        if !result.stderr.trim().is_empty() {
            debug!("{} stderr: {}", self.program, result.stderr.trim());
        }

        if !result.success() {
            return Err(Error::ExternalTool {
                tool: self.program.clone(),
                exit_code: result.exit_code,
                stderr: result.stderr,
            });
        }

        Ok(result)
    }
}

/// Executes commands and reports how they finished.
///
/// Implementations only fail when the command cannot be started; exit status
/// is interpreted by [`Cmd::run_on`].
pub trait ToolRunner {
    fn execute(&self, cmd: &Cmd) -> Result<CmdResult>;

    /// Whether `program` can be found on `PATH`.
    fn is_available(&self, program: &str) -> bool {
        crate::preflight::command_exists(program)
    }
}

/// Runs commands as child processes, blocking until they exit.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn execute(&self, cmd: &Cmd) -> Result<CmdResult> {
        let mut command = Command::new(&cmd.program);
        command.args(&cmd.args);
        if let Some(dir) = &cmd.current_dir {
            command.current_dir(dir);
        }

        let output = command.output().map_err(|source| Error::Spawn {
            tool: cmd.program.clone(),
            source,
        })?;

        Ok(CmdResult {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
