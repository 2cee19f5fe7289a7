//! Final permission and ownership pass over the staging tree.

use crate::error::{Error, Result};
use crate::preflight::Owner;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use walkdir::WalkDir;

/// Mode applied to every staged file and directory.
pub const STAGED_MODE: u32 = 0o755;

/// Apply `mode` to every entry under `root` (symlinks excluded) and hand
/// every entry, symlinks included, to `owner`.
///
/// Returns the number of entries visited.
pub fn normalize_tree(root: &Path, mode: u32, owner: &Owner) -> Result<usize> {
    let mut visited = 0;

    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            Error::staging("walk", path, e.into())
        })?;
        let path = entry.path();

        if !entry.path_is_symlink() {
            fs::set_permissions(path, fs::Permissions::from_mode(mode))
                .map_err(|e| Error::staging("set permissions on", path, e))?;
        }

        if let Owner::Account { uid, .. } = owner {
            std::os::unix::fs::lchown(path, Some(*uid), None)
                .map_err(|e| Error::staging("change owner of", path, e))?;
        }

        visited += 1;
    }

    Ok(visited)
}
