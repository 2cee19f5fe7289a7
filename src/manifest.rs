//! Package identity from the Debian control manifest.
//!
//! The manifest is read line by line rather than as a structured document:
//! the first `Package:` and first `Version:` lines are taken, everything else
//! is ignored.

use crate::collect::SourceEntry;
use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

const PACKAGE_KEY: &str = "Package: ";
const VERSION_KEY: &str = "Version: ";

/// Name and version of the package being built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageIdentity {
    pub name: String,
    pub version: String,
}

impl PackageIdentity {
    /// `<name>-<version>-all`, the stem of every artifact file name.
    pub fn artifact_stem(&self) -> String {
        format!("{}-{}-all", self.name, self.version)
    }

    /// Artifact file name for the given extension, e.g. `demo-1.0-all.deb`.
    pub fn artifact_name(&self, extension: &str) -> String {
        format!("{}.{}", self.artifact_stem(), extension)
    }
}

/// Find the manifest named `manifest_name` among `entries` and parse it.
pub fn identity_from_entries(
    entries: &[SourceEntry],
    manifest_name: &str,
) -> Result<PackageIdentity> {
    let manifest = entries
        .iter()
        .find(|entry| !entry.is_dir && entry.file_name() == manifest_name)
        .ok_or_else(|| Error::MissingManifest {
            path: entries
                .first()
                .and_then(|entry| entry.path.parent())
                .map(|dir| dir.join(manifest_name))
                .unwrap_or_else(|| manifest_name.into()),
        })?;

    read_identity(&manifest.path)
}

/// Read and parse the manifest at `path`.
pub fn read_identity(path: &Path) -> Result<PackageIdentity> {
    let text = fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::MissingManifest {
            path: path.to_path_buf(),
        },
        _ => Error::staging("read manifest", path, e),
    })?;
    parse_identity(&text, path)
}

/// Parse manifest text; `path` is only used for error reporting.
pub fn parse_identity(text: &str, path: &Path) -> Result<PackageIdentity> {
    let mut name = None;
    let mut version = None;

    for line in text.lines() {
        let line = line.trim();
        if name.is_none() {
            if let Some(value) = line.strip_prefix(PACKAGE_KEY) {
                name = Some(value.trim().to_string());
                continue;
            }
        }
        if version.is_none() {
            if let Some(value) = line.strip_prefix(VERSION_KEY) {
                version = Some(value.trim().to_string());
            }
        }
    }

    let missing = |field| Error::InvalidManifest {
        path: path.to_path_buf(),
        field,
    };
    let name = name.filter(|n| !n.is_empty()).ok_or_else(|| missing("Package"))?;
    let version = version
        .filter(|v| !v.is_empty())
        .ok_or_else(|| missing("Version"))?;

    Ok(PackageIdentity { name, version })
}
