//! Package a Python program into Debian, RPM and Slackware packages.
//!
//! A working directory holds the inputs:
//!
//! - `python/` - program files and folders (required)
//! - `debian/` - `control` manifest plus install/remove hooks (required)
//! - `init.d/` - startup scripts (optional)
//! - `root_fs/` - files overlaid onto the installed filesystem (optional)
//!
//! A run stages them into `build/`, packs that with `dpkg-deb` into
//! `packages/<name>-<version>-all.deb`, and converts it with `alien` when
//! rpm or tgz output is requested.
//!
//! # Architecture
//!
//! ```text
//! Orchestrator
//!     │
//!     ├── preflight   root check, owner account, host tools
//!     ├── collect     enumerate inputs, derive identity (manifest)
//!     ├── stage       staging tree, launchers, mode/owner pass
//!     └── package     dpkg-deb, then alien per format
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use p3build::orchestrator::load_config;
//! use p3build::{Orchestrator, RootUser, SystemRunner};
//!
//! let config = load_config(".", &RootUser)?;
//! let report = Orchestrator::new(config, &RootUser, &SystemRunner).run()?;
//! for artifact in &report.artifacts {
//!     println!("{}", artifact.path.display());
//! }
//! ```

pub mod collect;
pub mod config;
pub mod error;
pub mod manifest;
pub mod orchestrator;
pub mod package;
pub mod preflight;
pub mod process;
pub mod stage;

pub use config::BuildConfig;
pub use error::{Error, Result};
pub use manifest::PackageIdentity;
pub use orchestrator::{BuildReport, Orchestrator};
pub use package::{Artifact, PackageFormat};
pub use preflight::{Owner, PrivilegeCheck, RootUser};
pub use process::{Cmd, CmdResult, SystemRunner, ToolRunner};
