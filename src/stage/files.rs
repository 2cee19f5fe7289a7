//! File operations for the staging tree.
//!
//! Every I/O failure is reported as [`Error::StagingIo`] naming the path that
//! failed.

use crate::collect::SourceEntry;
use crate::error::{Error, Result};
use log::info;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Create a directory and its parents; existing directories are fine.
pub fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| Error::staging("create directory", path, e))
}

/// Remove a directory tree if present. Returns whether anything was removed.
pub fn remove_dir_if_exists(path: &Path) -> Result<bool> {
    if !path.exists() && !path.is_symlink() {
        return Ok(false);
    }
    if path.is_symlink() || path.is_file() {
        fs::remove_file(path).map_err(|e| Error::staging("remove", path, e))?;
    } else {
        fs::remove_dir_all(path).map_err(|e| Error::staging("remove", path, e))?;
    }
    Ok(true)
}

/// Write a file with specific permissions, creating parent directories.
pub fn write_file_mode(path: &Path, content: &str, mode: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    fs::write(path, content).map_err(|e| Error::staging("write", path, e))?;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| Error::staging("set permissions on", path, e))
}

/// Copy one collected entry into `dst_dir` under its own name.
///
/// Files are copied as-is; directories are copied recursively and merged into
/// whatever already exists at the destination.
pub fn copy_entry_into(entry: &SourceEntry, dst_dir: &Path) -> Result<PathBuf> {
    let name = entry.path.file_name().ok_or_else(|| {
        let source = io::Error::new(io::ErrorKind::InvalidInput, "path has no file name");
        Error::staging("copy", &entry.path, source)
    })?;
    let dst = dst_dir.join(name);
    if entry.is_dir {
        copy_dir_recursive(&entry.path, &dst)?;
    } else {
        copy_file(&entry.path, &dst)?;
    }
    info!("Copied {} to {}", entry.path.display(), dst.display());
    Ok(dst)
}

fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    if dst.is_symlink() {
        fs::remove_file(dst).map_err(|e| Error::staging("replace", dst, e))?;
    }
    fs::copy(src, dst).map_err(|e| Error::staging("copy", src, e))?;
    Ok(())
}

/// Recursively copy a directory, preserving symlinks and merging into `dst`.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    if !dst.is_dir() {
        create_dir(dst)?;
    }

    let entries = fs::read_dir(src).map_err(|e| Error::staging("read directory", src, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::staging("read directory", src, e))?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let file_type = entry
            .file_type()
            .map_err(|e| Error::staging("inspect", &src_path, e))?;

        if file_type.is_symlink() {
            let target =
                fs::read_link(&src_path).map_err(|e| Error::staging("read link", &src_path, e))?;
            if dst_path.exists() || dst_path.is_symlink() {
                remove_dir_if_exists(&dst_path)?;
            }
            std::os::unix::fs::symlink(&target, &dst_path)
                .map_err(|e| Error::staging("create symlink", &dst_path, e))?;
        } else if file_type.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            copy_file(&src_path, &dst_path)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(path: PathBuf) -> SourceEntry {
        let is_dir = path.is_dir();
        SourceEntry { path, is_dir }
    }

    #[test]
    fn test_copy_entry_file() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("foo.py");
        let dst_dir = temp.path().join("dst");
        fs::write(&src, "print('x')\n").unwrap();
        create_dir(&dst_dir).unwrap();

        let copied = copy_entry_into(&entry(src), &dst_dir).unwrap();

        assert_eq!(copied, dst_dir.join("foo.py"));
        assert_eq!(fs::read_to_string(copied).unwrap(), "print('x')\n");
    }

    #[test]
    fn test_copy_entry_keeps_non_utf8_folder_name() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp = TempDir::new().unwrap();
        let name = OsStr::from_bytes(b"pkg\xff");
        let src = temp.path().join("python").join(name);
        let dst_dir = temp.path().join("site");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("inner.py"), "").unwrap();
        create_dir(&dst_dir).unwrap();

        let copied = copy_entry_into(&entry(src), &dst_dir).unwrap();

        assert_eq!(copied, dst_dir.join(name));
        assert!(dst_dir.join(name).join("inner.py").is_file());
        assert!(!dst_dir.join("inner.py").exists());
    }

    #[test]
    fn test_copy_entry_without_file_name_is_error() {
        let temp = TempDir::new().unwrap();
        let root = SourceEntry {
            path: PathBuf::from("/"),
            is_dir: true,
        };
        let err = copy_entry_into(&root, temp.path()).unwrap_err();
        assert!(matches!(err, Error::StagingIo { action: "copy", .. }));
    }

    #[test]
    fn test_copy_dir_recursive_preserves_symlinks() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");

        fs::create_dir_all(src.join("subdir")).unwrap();
        fs::write(src.join("file.txt"), "hello").unwrap();
        fs::write(src.join("subdir/nested.txt"), "world").unwrap();
        std::os::unix::fs::symlink("file.txt", src.join("link")).unwrap();

        copy_dir_recursive(&src, &dst).unwrap();

        assert!(dst.join("file.txt").exists());
        assert_eq!(fs::read_to_string(dst.join("subdir/nested.txt")).unwrap(), "world");
        assert!(dst.join("link").is_symlink());
        assert_eq!(fs::read_link(dst.join("link")).unwrap().to_str().unwrap(), "file.txt");
    }

    #[test]
    fn test_copy_dir_merges_into_existing() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("etc");
        let dst = temp.path().join("staging/etc");

        fs::create_dir_all(src.join("default")).unwrap();
        fs::write(src.join("default/app"), "OPTS=1").unwrap();
        fs::create_dir_all(dst.join("init.d")).unwrap();
        fs::write(dst.join("init.d/app"), "#!/bin/sh").unwrap();

        copy_dir_recursive(&src, &dst).unwrap();

        assert!(dst.join("init.d/app").exists(), "existing content kept");
        assert!(dst.join("default/app").exists(), "new content merged");
    }

    #[test]
    fn test_copy_missing_source_is_staging_error() {
        let temp = TempDir::new().unwrap();
        let missing = SourceEntry {
            path: temp.path().join("gone.py"),
            is_dir: false,
        };
        let err = copy_entry_into(&missing, temp.path()).unwrap_err();
        assert!(matches!(err, Error::StagingIo { action: "copy", .. }));
    }

    #[test]
    fn test_write_file_mode_sets_permissions() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("usr/local/bin/foo");

        write_file_mode(&path, "#!/bin/sh\n", 0o755).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_remove_dir_if_exists_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("build");
        fs::create_dir_all(dir.join("DEBIAN")).unwrap();

        assert!(remove_dir_if_exists(&dir).unwrap());
        assert!(!dir.exists());
        assert!(!remove_dir_if_exists(&dir).unwrap());
    }
}
