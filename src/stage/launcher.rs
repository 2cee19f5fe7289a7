//! Launcher scripts for installed programs.
//!
//! Every plain program file with the script extension gets a command of the
//! same name, without the extension, in the launcher directory:
//!
//! ```text
//! #!/usr/bin/env python3
//! import foo
//! foo.main()
//! ```
//!
//! Entry-point contract: each such program file must define a callable named
//! by the configured entry point (`main` by default) that takes no arguments.
//! Nothing checks this while building; a program without it produces a
//! launcher that fails when it is run.

use super::files::write_file_mode;
use crate::collect::SourceEntry;
use crate::error::Result;
use log::info;
use std::path::{Path, PathBuf};

/// Mode for generated launchers.
pub const LAUNCHER_MODE: u32 = 0o755;

/// A generated command that imports a program module and calls its entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherScript {
    /// Command name, also the module imported.
    pub name: String,
    interpreter: String,
    entry_point: String,
}

impl LauncherScript {
    /// Launcher for `entry`, or `None` when the entry is a directory or lacks
    /// the script extension.
    pub fn for_program(
        entry: &SourceEntry,
        extension: &str,
        interpreter: &str,
        entry_point: &str,
    ) -> Option<Self> {
        if entry.is_dir {
            return None;
        }
        let suffix = format!(".{extension}");
        let name = entry.file_name().strip_suffix(suffix.as_str())?;
        if name.is_empty() {
            return None;
        }

        Some(Self {
            name: name.to_string(),
            interpreter: interpreter.to_string(),
            entry_point: entry_point.to_string(),
        })
    }

    pub fn render(&self) -> String {
        format!(
            "#!/usr/bin/env {}\nimport {}\n{}.{}()\n",
            self.interpreter, self.name, self.name, self.entry_point
        )
    }

    /// Write the launcher into `launcher_dir`, replacing any previous one.
    pub fn install(&self, launcher_dir: &Path) -> Result<PathBuf> {
        let path = launcher_dir.join(&self.name);
        write_file_mode(&path, &self.render(), LAUNCHER_MODE)?;
        info!("Created {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn file(name: &str) -> SourceEntry {
        SourceEntry {
            path: PathBuf::from("/work/python").join(name),
            is_dir: false,
        }
    }

    #[test]
    fn test_launcher_for_script() {
        let launcher = LauncherScript::for_program(&file("foo.py"), "py", "python3", "main")
            .expect("foo.py gets a launcher");
        assert_eq!(launcher.name, "foo");
        assert_eq!(
            launcher.render(),
            "#!/usr/bin/env python3\nimport foo\nfoo.main()\n"
        );
    }

    #[test]
    fn test_no_launcher_for_directory_or_other_files() {
        let dir = SourceEntry {
            path: PathBuf::from("/work/python/libbar"),
            is_dir: true,
        };
        assert!(LauncherScript::for_program(&dir, "py", "python3", "main").is_none());
        assert!(LauncherScript::for_program(&file("README.md"), "py", "python3", "main").is_none());
        assert!(LauncherScript::for_program(&file("foo.pyc"), "py", "python3", "main").is_none());
        assert!(LauncherScript::for_program(&file(".py"), "py", "python3", "main").is_none());
    }

    #[test]
    fn test_only_trailing_extension_is_stripped() {
        let launcher =
            LauncherScript::for_program(&file("py.pyserve.py"), "py", "python3", "main").unwrap();
        assert_eq!(launcher.name, "py.pyserve");
    }

    #[test]
    fn test_install_writes_executable() {
        let temp = TempDir::new().unwrap();
        let launcher =
            LauncherScript::for_program(&file("tool.py"), "py", "python3", "run").unwrap();

        let path = launcher.install(&temp.path().join("usr/local/bin")).unwrap();

        assert_eq!(path, temp.path().join("usr/local/bin/tool"));
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.ends_with("tool.run()\n"));
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, LAUNCHER_MODE);
    }
}
