//! Build configuration.
//!
//! [`BuildConfig::default_for`] carries the standard folder layout. A
//! `p3build.toml` in the working directory can override any of it:
//!
//! ```toml
//! [inputs]
//! program_dir = "python"
//!
//! [layout]
//! output_dir = "dist"
//! install_dir = "/usr/lib/python3/dist-packages"
//!
//! [python]
//! interpreter = "python3"
//!
//! [package]
//! compression = "xz"
//! formats = ["rpm"]
//! ```

use crate::error::{Error, Result};
use crate::package::PackageFormat;
use serde::Deserialize;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Configuration file looked up in the working directory.
pub const CONFIG_FILENAME: &str = "p3build.toml";

/// Everything a run needs to know about where files come from and go to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// Directory holding the input folders; all relative paths resolve here.
    pub work_dir: PathBuf,

    /// Program files and folders to install (required).
    pub program_dir: String,
    /// Control manifest and install/removal hooks (required).
    pub metadata_dir: String,
    /// Startup scripts (optional).
    pub init_dir: String,
    /// Files overlaid onto the staging root (optional).
    pub overlay_dir: String,
    /// File name of the control manifest inside `metadata_dir`.
    pub manifest_name: String,

    /// Staging tree, removed after a build unless `leave_build_path`.
    pub build_dir: String,
    /// Where package artifacts are written.
    pub output_dir: String,
    /// Package metadata directory, relative to the staging root.
    pub metadata_staging: PathBuf,
    /// Launcher directory, relative to the staging root.
    pub launcher_staging: PathBuf,
    /// Init-script directory, relative to the staging root.
    pub init_staging: PathBuf,
    /// Absolute install path for program files; queried from the interpreter when unset.
    pub install_dir: Option<PathBuf>,

    pub interpreter: String,
    pub entry_point: String,
    /// Program files with this extension get a launcher.
    pub script_extension: String,

    /// Account that owns every staged file.
    pub owner: String,
    /// `dpkg-deb -Z` compression type.
    pub compression: String,
    /// Conversions to run after the primary package is built.
    pub formats: Vec<PackageFormat>,
    pub leave_build_path: bool,
}

impl BuildConfig {
    /// Standard layout rooted at `work_dir`.
    pub fn default_for(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            program_dir: "python".into(),
            metadata_dir: "debian".into(),
            init_dir: "init.d".into(),
            overlay_dir: "root_fs".into(),
            manifest_name: "control".into(),
            build_dir: "build".into(),
            output_dir: "packages".into(),
            metadata_staging: PathBuf::from("DEBIAN"),
            launcher_staging: PathBuf::from("usr/local/bin"),
            init_staging: PathBuf::from("etc/init.d"),
            install_dir: None,
            interpreter: "python3".into(),
            entry_point: "main".into(),
            script_extension: "py".into(),
            owner: "root".into(),
            compression: "gzip".into(),
            formats: Vec::new(),
            leave_build_path: false,
        }
    }

    /// Standard layout with overrides from `<work_dir>/p3build.toml`, if present.
    pub fn load(work_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut config = Self::default_for(work_dir);
        let path = config.work_dir.join(CONFIG_FILENAME);
        if !path.is_file() {
            return Ok(config);
        }

        let text = fs::read_to_string(&path).map_err(|e| Error::Config {
            path: path.clone(),
            message: e.to_string(),
        })?;
        config.apply_toml(&path, &text)?;
        Ok(config)
    }

    fn apply_toml(&mut self, path: &Path, text: &str) -> Result<()> {
        let parsed: ConfigToml = toml::from_str(text).map_err(|e| parse_error(path, text, &e))?;

        if let Some(inputs) = parsed.inputs {
            set_name(&mut self.program_dir, inputs.program_dir, "inputs.program_dir", path)?;
            set_name(&mut self.metadata_dir, inputs.metadata_dir, "inputs.metadata_dir", path)?;
            set_name(&mut self.init_dir, inputs.init_dir, "inputs.init_dir", path)?;
            set_name(&mut self.overlay_dir, inputs.overlay_dir, "inputs.overlay_dir", path)?;
            set_name(&mut self.manifest_name, inputs.manifest, "inputs.manifest", path)?;
        }

        if let Some(layout) = parsed.layout {
            set_name(&mut self.build_dir, layout.build_dir, "layout.build_dir", path)?;
            set_name(&mut self.output_dir, layout.output_dir, "layout.output_dir", path)?;
            set_relative(
                &mut self.metadata_staging,
                layout.metadata_dir,
                "layout.metadata_dir",
                path,
            )?;
            set_relative(
                &mut self.launcher_staging,
                layout.launcher_dir,
                "layout.launcher_dir",
                path,
            )?;
            set_relative(&mut self.init_staging, layout.init_dir, "layout.init_dir", path)?;
            if let Some(install_dir) = layout.install_dir {
                let install_dir = PathBuf::from(install_dir);
                if !install_dir.is_absolute() {
                    return Err(config_error(
                        path,
                        format!(
                            "layout.install_dir must be absolute, got '{}'",
                            install_dir.display()
                        ),
                    ));
                }
                self.install_dir = Some(install_dir);
            }
        }

        if let Some(python) = parsed.python {
            set_name(&mut self.interpreter, python.interpreter, "python.interpreter", path)?;
            set_name(&mut self.entry_point, python.entry_point, "python.entry_point", path)?;
            if let Some(ext) = python.script_extension {
                let ext = ext.trim_start_matches('.').to_string();
                set_name(&mut self.script_extension, Some(ext), "python.script_extension", path)?;
            }
        }

        if let Some(package) = parsed.package {
            set_name(&mut self.owner, package.owner, "package.owner", path)?;
            set_name(&mut self.compression, package.compression, "package.compression", path)?;
            for format in package.formats.unwrap_or_default() {
                self.request_format(format);
            }
        }

        Ok(())
    }

    /// Add a conversion. Conversions always run rpm first, then tgz.
    pub fn request_format(&mut self, format: PackageFormat) {
        if !self.formats.contains(&format) {
            self.formats.push(format);
            self.formats.sort();
        }
    }

    pub fn program_root(&self) -> PathBuf {
        self.work_dir.join(&self.program_dir)
    }

    pub fn metadata_root(&self) -> PathBuf {
        self.work_dir.join(&self.metadata_dir)
    }

    pub fn init_root(&self) -> PathBuf {
        self.work_dir.join(&self.init_dir)
    }

    pub fn overlay_root(&self) -> PathBuf {
        self.work_dir.join(&self.overlay_dir)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.metadata_root().join(&self.manifest_name)
    }

    pub fn build_root(&self) -> PathBuf {
        self.work_dir.join(&self.build_dir)
    }

    pub fn output_root(&self) -> PathBuf {
        self.work_dir.join(&self.output_dir)
    }
}

fn config_error(path: &Path, message: String) -> Error {
    Error::Config {
        path: path.to_path_buf(),
        message,
    }
}

/// One-line form of a TOML error: `line N: message`.
fn parse_error(path: &Path, text: &str, err: &toml::de::Error) -> Error {
    let message = err.message().split_whitespace().collect::<Vec<_>>().join(" ");
    match err.span() {
        Some(span) => {
            let before = &text.as_bytes()[..span.start.min(text.len())];
            let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
            config_error(path, format!("line {line}: {message}"))
        }
        None => config_error(path, message),
    }
}

fn set_name(slot: &mut String, value: Option<String>, key: &str, path: &Path) -> Result<()> {
    if let Some(value) = value {
        let value = value.trim();
        if value.is_empty() {
            return Err(config_error(path, format!("{key} must not be empty")));
        }
        *slot = value.to_string();
    }
    Ok(())
}

fn set_relative(slot: &mut PathBuf, value: Option<String>, key: &str, path: &Path) -> Result<()> {
    if let Some(value) = value {
        let relative = PathBuf::from(value.trim().trim_start_matches('/'));
        if relative.as_os_str().is_empty() {
            return Err(config_error(path, format!("{key} must not be empty")));
        }
        if relative
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(config_error(
                path,
                format!("{key} must stay inside the staging tree"),
            ));
        }
        *slot = relative;
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigToml {
    inputs: Option<InputsToml>,
    layout: Option<LayoutToml>,
    python: Option<PythonToml>,
    package: Option<PackageToml>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct InputsToml {
    program_dir: Option<String>,
    metadata_dir: Option<String>,
    init_dir: Option<String>,
    overlay_dir: Option<String>,
    manifest: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LayoutToml {
    build_dir: Option<String>,
    output_dir: Option<String>,
    metadata_dir: Option<String>,
    launcher_dir: Option<String>,
    init_dir: Option<String>,
    install_dir: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PythonToml {
    interpreter: Option<String>,
    entry_point: Option<String>,
    script_extension: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PackageToml {
    owner: Option<String>,
    compression: Option<String>,
    formats: Option<Vec<PackageFormat>>,
}
