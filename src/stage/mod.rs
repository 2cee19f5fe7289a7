//! Staging tree construction.
//!
//! The staging tree mirrors the installed filesystem. With the default
//! configuration it looks like:
//!
//! ```text
//! build/
//! ├── DEBIAN/                       control file and install/remove hooks
//! ├── usr/lib/python3/dist-packages program files and folders
//! ├── usr/local/bin/                generated launchers
//! ├── etc/init.d/                   startup scripts
//! └── ...                           root_fs overlay, merged in
//! packages/                         output artifacts (outside the tree)
//! ```
//!
//! - [`files`] - copy, write and remove helpers
//! - [`launcher`] - launcher script generation
//! - [`permissions`] - the final mode/ownership pass

pub mod files;
pub mod launcher;
pub mod permissions;

use crate::collect::Inputs;
use crate::config::BuildConfig;
use crate::error::{Error, Result};
use crate::manifest::PackageIdentity;
use crate::preflight::Owner;
use crate::process::{Cmd, ToolRunner};
use launcher::LauncherScript;
use log::info;
use std::path::{Path, PathBuf};

/// Python snippet printing the interpreter's first site-packages directory.
const SITE_PACKAGES_QUERY: &str = "import site; print(site.getsitepackages()[0])";

/// Absolute paths of every role in the staging tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingLayout {
    /// Staging root; maps to `/` on the installed system.
    pub root: PathBuf,
    /// Package metadata (control file and hooks).
    pub metadata_dir: PathBuf,
    /// Program files and folders.
    pub install_dir: PathBuf,
    /// Generated launchers.
    pub launcher_dir: PathBuf,
    /// Startup scripts.
    pub init_dir: PathBuf,
    /// Package artifacts; not part of the staged tree.
    pub output_dir: PathBuf,
}

impl StagingLayout {
    /// Layout for `config`, installing programs under the absolute `install_dir`.
    pub fn new(config: &BuildConfig, install_dir: &Path) -> Self {
        let root = config.build_root();
        let install_rel = install_dir.strip_prefix("/").unwrap_or(install_dir);
        Self {
            metadata_dir: root.join(&config.metadata_staging),
            install_dir: root.join(install_rel),
            launcher_dir: root.join(&config.launcher_staging),
            init_dir: root.join(&config.init_staging),
            output_dir: config.output_root(),
            root,
        }
    }

    /// Layout for `config`, asking the interpreter for its install directory
    /// unless the configuration names one.
    pub fn resolve(config: &BuildConfig, runner: &dyn ToolRunner) -> Result<Self> {
        let install_dir = match &config.install_dir {
            Some(dir) => dir.clone(),
            None => query_install_dir(&config.interpreter, runner)?,
        };
        Ok(Self::new(config, &install_dir))
    }

    /// Directories created before anything is copied.
    pub fn staging_dirs(&self) -> [&Path; 5] {
        [
            &self.metadata_dir,
            &self.install_dir,
            &self.launcher_dir,
            &self.init_dir,
            &self.output_dir,
        ]
    }

    /// Where the artifact for `identity` with `extension` is written.
    pub fn artifact_path(&self, identity: &PackageIdentity, extension: &str) -> PathBuf {
        self.output_dir.join(identity.artifact_name(extension))
    }
}

/// Ask `interpreter` for its platform site-packages directory.
pub fn query_install_dir(interpreter: &str, runner: &dyn ToolRunner) -> Result<PathBuf> {
    let result = Cmd::new(interpreter)
        .args(["-c", SITE_PACKAGES_QUERY])
        .run_on(runner)?;

    let output = result.stdout.trim();
    let path = PathBuf::from(output);
    if output.is_empty() || !path.is_absolute() {
        return Err(Error::InstallDir {
            interpreter: interpreter.to_string(),
            output: output.to_string(),
        });
    }
    Ok(path)
}

/// What a staging pass produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedTree {
    pub launchers: Vec<PathBuf>,
    /// Entries visited by the permission pass.
    pub entries: usize,
}

/// Materializes the staging tree from collected inputs.
pub struct StagingTreeBuilder<'a> {
    config: &'a BuildConfig,
    layout: &'a StagingLayout,
}

impl<'a> StagingTreeBuilder<'a> {
    pub fn new(config: &'a BuildConfig, layout: &'a StagingLayout) -> Self {
        Self { config, layout }
    }

    /// Build the whole tree and hand it to `owner`.
    ///
    /// The staging root is expected to be freshly cleaned; existing
    /// directories are merged into, not replaced.
    pub fn build(&self, inputs: &Inputs, owner: &Owner) -> Result<StagedTree> {
        self.create_dirs()?;
        self.install_programs(inputs)?;
        let launchers = self.write_launchers(inputs)?;
        self.install_init_scripts(inputs)?;
        self.apply_overlay(inputs)?;
        self.install_metadata(inputs)?;

        let entries =
            permissions::normalize_tree(&self.layout.root, permissions::STAGED_MODE, owner)?;
        match owner {
            Owner::Account { name, .. } => info!(
                "Set mode {:o} and owner {} on {} entries under {}",
                permissions::STAGED_MODE,
                name,
                entries,
                self.layout.root.display()
            ),
            Owner::Unchanged => info!(
                "Set mode {:o} on {} entries under {}",
                permissions::STAGED_MODE,
                entries,
                self.layout.root.display()
            ),
        }

        Ok(StagedTree { launchers, entries })
    }

    fn create_dirs(&self) -> Result<()> {
        for dir in self.layout.staging_dirs() {
            if !dir.is_dir() {
                files::create_dir(dir)?;
                info!("Created {}", dir.display());
            }
        }
        Ok(())
    }

    fn install_programs(&self, inputs: &Inputs) -> Result<()> {
        for entry in &inputs.programs {
            files::copy_entry_into(entry, &self.layout.install_dir)?;
        }
        Ok(())
    }

    fn write_launchers(&self, inputs: &Inputs) -> Result<Vec<PathBuf>> {
        inputs
            .programs
            .iter()
            .filter_map(|entry| {
                LauncherScript::for_program(
                    entry,
                    &self.config.script_extension,
                    &self.config.interpreter,
                    &self.config.entry_point,
                )
            })
            .map(|launcher| launcher.install(&self.layout.launcher_dir))
            .collect()
    }

    fn install_init_scripts(&self, inputs: &Inputs) -> Result<()> {
        for entry in &inputs.init_scripts {
            files::copy_entry_into(entry, &self.layout.init_dir)?;
        }
        Ok(())
    }

    fn apply_overlay(&self, inputs: &Inputs) -> Result<()> {
        for entry in &inputs.overlay {
            files::copy_entry_into(entry, &self.layout.root)?;
        }
        Ok(())
    }

    fn install_metadata(&self, inputs: &Inputs) -> Result<()> {
        for entry in &inputs.metadata {
            files::copy_entry_into(entry, &self.layout.metadata_dir)?;
        }
        Ok(())
    }
}
