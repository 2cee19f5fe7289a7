//! Package building and format conversion.
//!
//! `dpkg-deb` turns the staging tree into `<name>-<version>-all.deb`; `alien`
//! converts that file into each requested format. Both are black boxes: a
//! zero exit status is success, anything else ends the run.

use crate::error::{Error, Result};
use crate::manifest::PackageIdentity;
use crate::process::{Cmd, ToolRunner};
use crate::stage::StagingLayout;
use log::{info, warn};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Package builder program.
pub const BUILDER: &str = "dpkg-deb";
/// Format converter program.
pub const CONVERTER: &str = "alien";
/// Extension of the primary artifact.
pub const DEB_EXTENSION: &str = "deb";

/// Formats the primary package can be converted into, in conversion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageFormat {
    Rpm,
    Tgz,
}

impl PackageFormat {
    /// Converter flag selecting this format.
    pub fn converter_flag(self) -> &'static str {
        match self {
            PackageFormat::Rpm => "--to-rpm",
            PackageFormat::Tgz => "--to-tgz",
        }
    }
}

impl fmt::Display for PackageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageFormat::Rpm => write!(f, "rpm"),
            PackageFormat::Tgz => write!(f, "tgz"),
        }
    }
}

/// A package file in the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub sha256: String,
}

impl Artifact {
    /// Describe the file at `path`.
    pub fn inspect(path: &Path) -> Result<Self> {
        let (sha256, size_bytes) = sha256_file(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            size_bytes,
            sha256,
        })
    }

    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }
}

/// Drives the external builder and converters for one staged tree.
pub struct PackageInvoker<'a> {
    runner: &'a dyn ToolRunner,
    layout: &'a StagingLayout,
    compression: &'a str,
}

impl<'a> PackageInvoker<'a> {
    pub fn new(
        runner: &'a dyn ToolRunner,
        layout: &'a StagingLayout,
        compression: &'a str,
    ) -> Self {
        Self {
            runner,
            layout,
            compression,
        }
    }

    /// Build the primary package, then each conversion in order.
    ///
    /// Conversions only start once the primary package exists; the first
    /// failure ends the sequence.
    pub fn build_all(
        &self,
        identity: &PackageIdentity,
        formats: &[PackageFormat],
    ) -> Result<Vec<Artifact>> {
        let deb = self.build_deb(identity)?;
        let mut artifacts = vec![deb.clone()];
        for &format in formats {
            artifacts.extend(self.convert(&deb, format)?);
        }
        Ok(artifacts)
    }

    /// Run the package builder over the staging root.
    pub fn build_deb(&self, identity: &PackageIdentity) -> Result<Artifact> {
        let output = self.layout.artifact_path(identity, DEB_EXTENSION);

        Cmd::new(BUILDER)
            .arg(format!("-Z{}", self.compression))
            .arg("-b")
            .arg_path(&self.layout.root)
            .arg_path(&output)
            .run_on(self.runner)?;

        if !output.is_file() {
            return Err(Error::MissingArtifact { path: output });
        }

        let artifact = Artifact::inspect(&output)?;
        log_artifact(&artifact);
        Ok(artifact)
    }

    /// Convert `deb` into `format`, returning the files the converter wrote.
    pub fn convert(&self, deb: &Artifact, format: PackageFormat) -> Result<Vec<Artifact>> {
        let output_dir = &self.layout.output_dir;
        let before = snapshot(output_dir)?;

        Cmd::new(CONVERTER)
            .args([format.converter_flag(), "--scripts", deb.file_name()])
            .current_dir(output_dir)
            .run_on(self.runner)?;

        let after = snapshot(output_dir)?;
        let produced: Vec<Artifact> = after
            .iter()
            .filter(|(name, modified)| before.get(*name) != Some(*modified))
            .map(|(name, _)| Artifact::inspect(&output_dir.join(name)))
            .collect::<Result<_>>()?;

        if produced.is_empty() {
            warn!("{} reported success but wrote no {} file", CONVERTER, format);
        }
        info!("Created {} file from {}", format, deb.file_name());
        for artifact in &produced {
            log_artifact(artifact);
        }
        Ok(produced)
    }
}

fn log_artifact(artifact: &Artifact) {
    info!(
        "Artifact {} ({} bytes, sha256 {})",
        artifact.path.display(),
        artifact.size_bytes,
        artifact.sha256
    );
}

/// File names in `dir` with their modification times.
fn snapshot(dir: &Path) -> Result<BTreeMap<String, Option<SystemTime>>> {
    let mut files = BTreeMap::new();
    let entries = fs::read_dir(dir).map_err(|e| Error::staging("read directory", dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::staging("read directory", dir, e))?;
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        files.insert(name, metadata.modified().ok());
    }
    Ok(files)
}

fn sha256_file(path: &Path) -> Result<(String, u64)> {
    let f = File::open(path).map_err(|e| Error::staging("open", path, e))?;
    let mut r = BufReader::new(f);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    let mut size = 0u64;
    loop {
        let n = r.read(&mut buf).map_err(|e| Error::staging("read", path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }
    Ok((format!("{:x}", hasher.finalize()), size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use crate::process::CmdResult;
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Pretends to be dpkg-deb and alien: records every command and writes
    /// the files the real tools would.
    struct FakeTools {
        calls: RefCell<Vec<Cmd>>,
        fail: Option<&'static str>,
        produce_deb: bool,
    }

    impl FakeTools {
        fn new() -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                fail: None,
                produce_deb: true,
            }
        }

        fn programs(&self) -> Vec<String> {
            self.calls
                .borrow()
                .iter()
                .map(|c| c.program().to_string())
                .collect()
        }
    }

    impl ToolRunner for FakeTools {
        fn execute(&self, cmd: &Cmd) -> Result<CmdResult> {
            self.calls.borrow_mut().push(cmd.clone());
            let args: Vec<String> = cmd
                .get_args()
                .iter()
                .map(|a| a.to_string_lossy().into_owned())
                .collect();

            if self.fail == Some(cmd.program()) || self.fail == args.first().map(String::as_str) {
                return Ok(CmdResult {
                    exit_code: Some(1),
                    stdout: String::new(),
                    stderr: "boom".into(),
                });
            }

            match cmd.program() {
                BUILDER if self.produce_deb => fs::write(&args[3], b"deb-bytes").unwrap(),
                CONVERTER => {
                    let dir = cmd.get_current_dir().unwrap();
                    let stem = args[2].trim_end_matches(".deb");
                    let name = match args[0].as_str() {
                        "--to-rpm" => format!("{stem}-2.noarch.rpm"),
                        _ => format!("{stem}.tgz"),
                    };
                    fs::write(dir.join(name), b"converted").unwrap();
                }
                _ => {}
            }
            Ok(CmdResult {
                exit_code: Some(0),
                ..Default::default()
            })
        }
    }

    fn setup() -> (TempDir, StagingLayout, PackageIdentity) {
        let temp = TempDir::new().unwrap();
        let config = BuildConfig::default_for(temp.path());
        let layout = StagingLayout::new(&config, Path::new("/usr/lib/python3/dist-packages"));
        fs::create_dir_all(&layout.root).unwrap();
        fs::create_dir_all(&layout.output_dir).unwrap();
        let identity = PackageIdentity {
            name: "demo".into(),
            version: "1.0".into(),
        };
        (temp, layout, identity)
    }

    #[test]
    fn test_build_deb_invokes_builder_with_argument_list() {
        let (_temp, layout, identity) = setup();
        let tools = FakeTools::new();

        let artifact = PackageInvoker::new(&tools, &layout, "gzip")
            .build_deb(&identity)
            .unwrap();

        assert_eq!(artifact.path, layout.output_dir.join("demo-1.0-all.deb"));
        assert_eq!(artifact.size_bytes, 9);
        assert_eq!(artifact.sha256.len(), 64);

        let calls = tools.calls.borrow();
        let args: Vec<_> = calls[0].get_args().iter().map(|a| a.to_os_string()).collect();
        assert_eq!(
            args,
            vec![
                "-Zgzip".into(),
                "-b".into(),
                layout.root.clone().into_os_string(),
                artifact.path.clone().into_os_string(),
            ]
        );
    }

    #[test]
    fn test_builder_failure_skips_conversions() {
        let (_temp, layout, identity) = setup();
        let mut tools = FakeTools::new();
        tools.fail = Some(BUILDER);

        let err = PackageInvoker::new(&tools, &layout, "gzip")
            .build_all(&identity, &[PackageFormat::Rpm, PackageFormat::Tgz])
            .unwrap_err();

        assert!(matches!(
            err,
            Error::ExternalTool { ref tool, exit_code: Some(1), .. } if tool == BUILDER
        ));
        assert_eq!(tools.programs(), vec![BUILDER]);
    }

    #[test]
    fn test_missing_deb_after_success_is_error() {
        let (_temp, layout, identity) = setup();
        let mut tools = FakeTools::new();
        tools.produce_deb = false;

        let err = PackageInvoker::new(&tools, &layout, "gzip")
            .build_deb(&identity)
            .unwrap_err();
        assert!(matches!(err, Error::MissingArtifact { .. }));
    }

    #[test]
    fn test_conversions_run_in_order_and_report_outputs() {
        let (_temp, layout, identity) = setup();
        let tools = FakeTools::new();

        let artifacts = PackageInvoker::new(&tools, &layout, "xz")
            .build_all(&identity, &[PackageFormat::Rpm, PackageFormat::Tgz])
            .unwrap();

        let names: Vec<_> = artifacts.iter().map(|a| a.file_name().to_string()).collect();
        assert_eq!(
            names,
            vec![
                "demo-1.0-all.deb",
                "demo-1.0-all-2.noarch.rpm",
                "demo-1.0-all.tgz"
            ]
        );
        assert_eq!(tools.programs(), vec![BUILDER, CONVERTER, CONVERTER]);

        let calls = tools.calls.borrow();
        assert_eq!(calls[1].get_current_dir(), Some(layout.output_dir.as_path()));
        assert_eq!(
            calls[1].display(),
            "alien --to-rpm --scripts demo-1.0-all.deb"
        );
        assert_eq!(calls[2].display(), "alien --to-tgz --scripts demo-1.0-all.deb");
    }

    #[test]
    fn test_converter_failure_aborts() {
        let (_temp, layout, identity) = setup();
        let mut tools = FakeTools::new();
        tools.fail = Some("--to-rpm");

        let err = PackageInvoker::new(&tools, &layout, "gzip")
            .build_all(&identity, &[PackageFormat::Rpm, PackageFormat::Tgz])
            .unwrap_err();

        assert!(matches!(err, Error::ExternalTool { ref tool, .. } if tool == CONVERTER));
        assert_eq!(tools.programs(), vec![BUILDER, CONVERTER]);
    }

    #[test]
    fn test_sha256_file_known_digest() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("abc");
        fs::write(&path, "abc").unwrap();
        let (sha, size) = sha256_file(&path).unwrap();
        assert_eq!(size, 3);
        assert_eq!(
            sha,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
