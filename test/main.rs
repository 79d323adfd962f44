// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT


use anyhow::Result;
use std::{
    collections::BTreeMap,
    fs::{self, Permissions},
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};
use tempfile::{tempdir, TempDir};
use walkdir::WalkDir;

/// Scratch directory tree for end-to-end scenarios.
pub(crate) struct TreeFixture {
    root: TempDir,
}

impl TreeFixture {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self { root: tempdir()? })
    }

    pub(crate) fn path(&self) -> &Path {
        self.root.path()
    }

    pub(crate) fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.root.path().join(name)
    }

    /// Write file with target mode, creating parent directories as needed.
    pub(crate) fn write(&self, name: impl AsRef<Path>, contents: impl AsRef<[u8]>, mode: u32) -> Result<PathBuf> {
        let path = self.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        fs::set_permissions(&path, Permissions::from_mode(mode))?;

        Ok(path)
    }

    pub(crate) fn mkdir(&self, name: impl AsRef<Path>, mode: u32) -> Result<PathBuf> {
        let path = self.join(name);
        fs::create_dir_all(&path)?;
        fs::set_permissions(&path, Permissions::from_mode(mode))?;

        Ok(path)
    }

    pub(crate) fn mode(&self, name: impl AsRef<Path>) -> Result<u32> {
        Ok(fs::symlink_metadata(self.join(name))?.permissions().mode() & 0o777)
    }

    /// Contents of every regular file keyed by path relative to fixture root.
    pub(crate) fn snapshot(&self) -> Result<BTreeMap<String, String>> {
        let mut result = BTreeMap::new();
        for entry in WalkDir::new(self.path()).min_depth(1) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let name = entry.path().strip_prefix(self.path())?.to_string_lossy().into_owned();
            result.insert(name, fs::read_to_string(entry.path())?);
        }

        Ok(result)
    }
}
