//! Input discovery.
//!
//! Each source root is listed one level deep. Subdirectories are returned as
//! single entries and copied as whole trees during staging.

use crate::config::BuildConfig;
use crate::error::{Error, Result};
use crate::manifest::{self, PackageIdentity};
use log::debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// One discovered input file or folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub path: PathBuf,
    pub is_dir: bool,
}

impl SourceEntry {
    /// Final path component as UTF-8, for launcher and manifest matching.
    /// Empty when the name is not valid UTF-8; copies use the raw name.
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }
}

/// List the immediate entries of `root`, sorted by name.
///
/// Returns an empty list when `root` does not exist.
pub fn collect_optional(root: &Path) -> Result<Vec<SourceEntry>> {
    match list_entries(root) {
        Ok(entries) => Ok(entries),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(Error::staging("read directory", root, e)),
    }
}

/// List the immediate entries of `root`, which must exist and be non-empty.
pub fn collect_required(root: &Path) -> Result<Vec<SourceEntry>> {
    if !root.is_dir() {
        return Err(Error::MissingRequiredInput {
            path: root.to_path_buf(),
            reason: "required directory not found".into(),
        });
    }

    let entries = list_entries(root).map_err(|e| Error::staging("read directory", root, e))?;
    if entries.is_empty() {
        return Err(Error::MissingRequiredInput {
            path: root.to_path_buf(),
            reason: "required directory is empty".into(),
        });
    }
    Ok(entries)
}

fn list_entries(root: &Path) -> io::Result<Vec<SourceEntry>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        // Follow symlinks so a linked folder is copied as a folder.
        let is_dir = path.is_dir();
        entries.push(SourceEntry { path, is_dir });
    }
    entries.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
    Ok(entries)
}

/// Everything a build consumes, with the package identity already derived.
#[derive(Debug, Clone)]
pub struct Inputs {
    pub identity: PackageIdentity,
    pub programs: Vec<SourceEntry>,
    pub metadata: Vec<SourceEntry>,
    pub init_scripts: Vec<SourceEntry>,
    pub overlay: Vec<SourceEntry>,
}

impl Inputs {
    /// Discover all inputs under the configured working directory.
    ///
    /// The manifest is read and validated here, so a bad manifest stops the
    /// run before any staging directory exists.
    pub fn collect(config: &BuildConfig) -> Result<Self> {
        let manifest_path = config.manifest_path();
        if !manifest_path.is_file() {
            return Err(Error::MissingManifest {
                path: manifest_path,
            });
        }

        let programs = collect_required(&config.program_root()).map_err(|e| match e {
            Error::MissingRequiredInput { path, .. } => Error::MissingRequiredInput {
                path,
                reason: "no program files found to install".into(),
            },
            other => other,
        })?;
        let metadata = collect_required(&config.metadata_root())?;
        let init_scripts = collect_optional(&config.init_root())?;
        let overlay = collect_optional(&config.overlay_root())?;

        let identity = manifest::identity_from_entries(&metadata, &config.manifest_name)?;

        debug!(
            "collected {} program, {} metadata, {} init.d and {} overlay entries",
            programs.len(),
            metadata.len(),
            init_scripts.len(),
            overlay.len()
        );

        Ok(Self {
            identity,
            programs,
            metadata,
            init_scripts,
            overlay,
        })
    }
}
