//! Preflight checks run before anything touches the filesystem.
//!
//! Two things are verified:
//! - the process runs as root, so the staging tree can be handed to the
//!   owner account ([`PrivilegeCheck`])
//! - the host has the package builder and converter on `PATH`
//!   ([`check_required_tools`])
//!
//! # Example
//!
//! ```rust,ignore
//! use p3build::preflight::{command_exists, check_required_tools};
//! use p3build::process::SystemRunner;
//!
//! if !command_exists("dpkg-deb") {
//!     println!("dpkg not installed");
//! }
//!
//! check_required_tools(&SystemRunner, &[("alien", "alien")])?;
//! ```

use crate::error::{Error, Result};
use crate::package::PackageFormat;
use crate::process::ToolRunner;
use std::ffi::{CStr, CString};

/// Check if a command exists on the host system.
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Tools every build needs. Each tuple is (command_name, package_name).
pub const REQUIRED_TOOLS: &[(&str, &str)] = &[("dpkg-deb", "dpkg")];

/// Tool needed for any conversion to another package format.
pub const CONVERTER_TOOL: (&str, &str) = ("alien", "alien");

/// Tools a build with the given conversions needs.
pub fn tools_for(formats: &[PackageFormat]) -> Vec<(&'static str, &'static str)> {
    let mut tools = REQUIRED_TOOLS.to_vec();
    if !formats.is_empty() {
        tools.push(CONVERTER_TOOL);
    }
    tools
}

/// Check that specific tools are available.
///
/// # Returns
///
/// * `Ok(())` if all tools are found
/// * `Err(Error::MissingTools)` listing every missing tool and its package
pub fn check_required_tools(runner: &dyn ToolRunner, tools: &[(&str, &str)]) -> Result<()> {
    let missing: Vec<String> = tools
        .iter()
        .filter(|(tool, _)| !runner.is_available(tool))
        .map(|(tool, package)| format!("{} (install: {})", tool, package))
        .collect();

    if !missing.is_empty() {
        return Err(Error::MissingTools { tools: missing });
    }

    Ok(())
}

/// Who should own the staged files once the tree is complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    /// Hand every staged entry to this account.
    Account { name: String, uid: u32 },
    /// Leave ownership as the files were created.
    Unchanged,
}

/// Verifies the run may proceed and decides staged file ownership.
pub trait PrivilegeCheck {
    /// Fail unless the process may hand files to another account. Runs
    /// before anything is read from the working directory.
    fn ensure_privileged(&self) -> Result<()>;

    /// Resolve the account that will own every staged entry.
    fn owner(&self, account: &str) -> Result<Owner>;
}

/// The real check: effective uid 0, owner resolved through the passwd database.
#[derive(Debug, Clone, Copy, Default)]
pub struct RootUser;

impl PrivilegeCheck for RootUser {
    fn ensure_privileged(&self) -> Result<()> {
        // SAFETY: geteuid has no preconditions and cannot fail.
        let euid = unsafe { libc::geteuid() };
        if euid != 0 {
            return Err(Error::InsufficientPrivilege {
                user: user_name(euid).unwrap_or_else(|| euid.to_string()),
            });
        }
        Ok(())
    }

    fn owner(&self, account: &str) -> Result<Owner> {
        let uid = account_uid(account).ok_or_else(|| Error::UnknownAccount {
            name: account.to_string(),
        })?;
        Ok(Owner::Account {
            name: account.to_string(),
            uid,
        })
    }
}

/// Look up the uid of a named account.
pub fn account_uid(name: &str) -> Option<u32> {
    let c_name = CString::new(name).ok()?;
    // SAFETY: c_name is a valid NUL-terminated string; the returned record is
    // only read before any other passwd call on this thread.
    let entry = unsafe { libc::getpwnam(c_name.as_ptr()) };
    if entry.is_null() {
        return None;
    }
    // SAFETY: entry is non-null and points at libc's static passwd record.
    Some(unsafe { (*entry).pw_uid })
}

fn user_name(uid: u32) -> Option<String> {
    // SAFETY: see account_uid.
    let entry = unsafe { libc::getpwuid(uid) };
    if entry.is_null() {
        return None;
    }
    // SAFETY: pw_name of a non-null record is a valid C string.
    let name = unsafe { CStr::from_ptr((*entry).pw_name) };
    Some(name.to_string_lossy().into_owned())
}
