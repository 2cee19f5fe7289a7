//! One packaging run from start to finish.
//!
//! ```text
//! privilege check ─ load config ─┬─ clean only: remove build + output dirs
//!                                └─ owner ─ collect inputs ─ host tools
//!                                   ─ clean build dir ─ stage ─ build deb
//!                                   ─ convert ─ remove build dir (unless kept)
//! ```
//!
//! The first failure ends the run. Nothing is rolled back; the next run
//! starts by removing the stale build directory.

use crate::collect::Inputs;
use crate::config::BuildConfig;
use crate::error::Result;
use crate::manifest::PackageIdentity;
use crate::package::{Artifact, PackageInvoker};
use crate::preflight::{self, PrivilegeCheck};
use crate::process::ToolRunner;
use crate::stage::files::remove_dir_if_exists;
use crate::stage::{StagedTree, StagingLayout, StagingTreeBuilder};
use log::info;
use std::path::{Path, PathBuf};

/// Check privilege, then read the configuration for `work_dir`.
///
/// An unprivileged caller is turned away before `p3build.toml` or any input
/// folder is read.
pub fn load_config(
    work_dir: impl Into<PathBuf>,
    privilege: &dyn PrivilegeCheck,
) -> Result<BuildConfig> {
    privilege.ensure_privileged()?;
    BuildConfig::load(work_dir)
}

/// What a successful build produced.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub identity: PackageIdentity,
    pub staged: StagedTree,
    /// Primary package first, then converter outputs in conversion order.
    pub artifacts: Vec<Artifact>,
}

/// Sequences the collect, stage and package steps.
pub struct Orchestrator<'a> {
    config: BuildConfig,
    privilege: &'a dyn PrivilegeCheck,
    runner: &'a dyn ToolRunner,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: BuildConfig,
        privilege: &'a dyn PrivilegeCheck,
        runner: &'a dyn ToolRunner,
    ) -> Self {
        Self {
            config,
            privilege,
            runner,
        }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Build the primary package and every requested conversion.
    pub fn run(&self) -> Result<BuildReport> {
        self.privilege.ensure_privileged()?;
        let owner = self.privilege.owner(&self.config.owner)?;

        let inputs = Inputs::collect(&self.config)?;
        let identity = inputs.identity.clone();
        info!("Package: {} version {}", identity.name, identity.version);

        let tools = preflight::tools_for(&self.config.formats);
        preflight::check_required_tools(self.runner, &tools)?;
        let layout = StagingLayout::resolve(&self.config, self.runner)?;

        self.clean(false)?;
        let staged = StagingTreeBuilder::new(&self.config, &layout).build(&inputs, &owner)?;

        let artifacts = PackageInvoker::new(self.runner, &layout, &self.config.compression)
            .build_all(&identity, &self.config.formats)?;

        if self.config.leave_build_path {
            info!("Leaving build path {}", layout.root.display());
        } else {
            remove_logged(&layout.root)?;
        }

        Ok(BuildReport {
            identity,
            staged,
            artifacts,
        })
    }

    /// Remove the build and output directories, then stop.
    pub fn run_clean_only(&self) -> Result<()> {
        self.privilege.ensure_privileged()?;
        self.clean(true)
    }

    /// Remove the build directory, and the output directory too when
    /// `remove_output` is set. Missing directories are not an error.
    pub fn clean(&self, remove_output: bool) -> Result<()> {
        remove_logged(&self.config.build_root())?;
        if remove_output {
            remove_logged(&self.config.output_root())?;
        }
        Ok(())
    }
}

fn remove_logged(path: &Path) -> Result<()> {
    if remove_dir_if_exists(path)? {
        info!("Removed {}", path.display());
    }
    Ok(())
}
